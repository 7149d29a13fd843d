//! CLI argument structs.
//!
//! Every override is optional; only flags given on the command line replace
//! values from the configuration file, environment and defaults.

mod log;
mod node;

pub use log::LogArgs;
pub use node::NodeArgs;

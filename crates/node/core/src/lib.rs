//! Node infrastructure for the range host.
//!
//! - [`args`] - CLI argument structs
//! - [`config`] - Layered configuration loading
//! - [`constants`] - Defaults shared by args and config
//! - [`logging`] - Logging initialization
//! - [`version`] - Version information

pub mod args;
pub mod config;
pub mod constants;
pub mod logging;
pub mod version;

//! Primitive types shared by every range host crate.
//!
//! - [`ClientId`] - identifier of a remote target node, with the reserved
//!   [`ClientId::BROADCAST`] pseudo-address
//! - [`Rgb`] and [`Effect`] - the lighting state a node can be told to show
//! - [`Clock`] - monotonic millisecond time source, with [`ManualClock`] for
//!   simulated time

mod clock;
mod color;
mod id;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use color::{Effect, ParseColorError, Rgb};
pub use id::ClientId;

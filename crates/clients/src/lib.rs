//! Client registry.
//!
//! The [`ClientRegistry`] is the single owner of every known remote node. All
//! access goes through scoped closures under one mutex acquired with a
//! bounded wait: when the lock cannot be taken within the configured
//! timeout the call fails with [`RegistryError::LockTimeout`] and the caller
//! skips the operation for this cycle.

mod client;
mod registry;

pub use client::{Client, ClientSnapshot};
pub use registry::{
    ClientRegistry, DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_CLIENTS, RegistryConfig, RegistryError,
    UpsertResult,
};

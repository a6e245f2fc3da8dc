//! Core logic for the license expiry notifier.
//!
//! Framework-agnostic: the inventory API, the chat transport and the state
//! files sit behind ports (traits) implemented in adapter crates or in
//! this crate's file stores.

pub mod config;
pub mod cursor;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod inventory;
pub mod logging;
pub mod matcher;
pub mod messaging;
pub mod notify;
pub mod registration;
pub mod registry;
pub mod scan;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

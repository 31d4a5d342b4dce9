//! Core of the WhatsApp Cloud API bridge.
//!
//! Framework-agnostic: the room protocol, the cloud HTTP API and session
//! storage live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod convert;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod identity;
pub mod login;
pub mod logging;
pub mod media;
pub mod ports;
pub mod router;
pub mod store;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

//! Core types for regwatch
//!
//! This crate defines the data model shared by the regwatch CLI and the
//! registry query logic:
//! - `Source`: the configured repository, tag selector, credentials and
//!   optional registry mirror
//! - `Version`: an opaque manifest digest
//! - `CheckRequest` / `CheckResponse`: the request/response payloads
//! - `Error`: the error taxonomy for a check invocation

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{BasicCredentials, CheckRequest, CheckResponse, RegistryMirror, Source, Version};

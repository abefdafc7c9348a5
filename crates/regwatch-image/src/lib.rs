//! Registry queries and version discovery for regwatch
//!
//! This crate decides which versions of a container image are "new"
//! relative to a previously known one:
//! - Resolving a tag's current manifest digest over the Docker Registry v2
//!   API, HEAD first with a GET fallback
//! - Consulting a registry mirror before the origin when the repository
//!   lives on the default public registry
//! - Resolving credentials, including the ECR token exchange
//!
//! # Example
//!
//! ```no_run
//! use regwatch_core::CheckRequest;
//! use regwatch_image::{Checker, EcrExchange, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request: CheckRequest = serde_json::from_str(
//!         r#"{"source": {"repository": "busybox"}}"#,
//!     )?;
//!
//!     let transport = HttpTransport::new()?;
//!     let checker = Checker::new(&transport, &EcrExchange);
//!     let response = checker.check(&request).await?;
//!
//!     for version in response {
//!         println!("{}", version.digest);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod check;
pub mod credentials;
pub mod reference;
pub mod resolver;
pub mod transport;

// Re-export main types for convenience
pub use check::Checker;
pub use credentials::{CredentialExchange, EcrExchange};
pub use reference::{Reference, Repository, Target, DEFAULT_REGISTRY};
pub use resolver::resolve_digest;
pub use transport::{HttpTransport, ManifestTransport, Platform, ResolveOpts, TransportError};

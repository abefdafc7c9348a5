//! Manifest digest resolution with HEAD-to-GET fallback.

use crate::reference::Reference;
use crate::transport::{ManifestTransport, ResolveOpts, TransportError};
use tracing::debug;

/// Resolve a reference to its current manifest digest.
///
/// HEAD is attempted first since it avoids transferring the manifest body.
/// A registry-reported not-found on HEAD is authoritative: `Ok(None)`
/// means the reference does not currently exist, which is a legitimate
/// negative result, not an error. Any other HEAD failure falls back to a
/// full GET on the same reference, so a registry that does not implement
/// HEAD (or reports an ambiguous result) still resolves.
pub async fn resolve_digest<T: ManifestTransport + ?Sized>(
    transport: &T,
    reference: &Reference,
    opts: &ResolveOpts,
) -> Result<Option<String>, TransportError> {
    let head_err = match transport.head(reference, opts).await {
        Ok(digest) => return Ok(Some(digest)),
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => e,
    };

    debug!("HEAD {} failed ({}), falling back to GET", reference, head_err);

    match transport.get(reference, opts).await {
        Ok(digest) => Ok(Some(digest)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

//! The check algorithm: decide which versions of an image are new relative
//! to a previously known one.

use crate::credentials::{resolve_credentials, CredentialExchange};
use crate::reference::{Reference, Repository};
use crate::resolver::resolve_digest;
use crate::transport::{ManifestTransport, ResolveOpts, TransportError};
use regwatch_core::{BasicCredentials, CheckRequest, CheckResponse, Error, Version};
use tracing::warn;

/// Runs check invocations against a registry transport and credential
/// exchange. Stateless: every check starts from the request alone.
pub struct Checker<'a> {
    transport: &'a dyn ManifestTransport,
    exchange: &'a dyn CredentialExchange,
}

impl<'a> Checker<'a> {
    pub fn new(transport: &'a dyn ManifestTransport, exchange: &'a dyn CredentialExchange) -> Self {
        Self {
            transport,
            exchange,
        }
    }

    /// Resolve the current digest of the requested tag, preferring the
    /// mirror when eligible, and assemble the ordered version list.
    ///
    /// Mirror failures (errors and not-found alike) are logged and fall
    /// through to the origin; a deletion on the mirror is therefore
    /// indistinguishable from mirror unreachability. That fall-through is
    /// deliberate. Origin failures are fatal and name the origin registry.
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResponse, Error> {
        let source = &request.source;
        let previous = request.version.as_ref();

        let origin_credentials = resolve_credentials(source, self.exchange).await?;
        let repo = Repository::parse(&source.repository)?;

        let mut response = CheckResponse::new();

        // Only consult the mirror when the repository lives on the default
        // public registry. An explicitly-named registry is never redirected.
        if let Some(mirror) = &source.registry_mirror {
            if repo.is_default_registry() {
                let mirror_reference = repo.with_registry(&mirror.host)?.tag(source.tag());

                match self
                    .check_reference(mirror.credentials(), previous, &mirror_reference)
                    .await
                {
                    Ok(mirror_response) if !mirror_response.is_empty() => {
                        response = mirror_response;
                    }
                    Ok(_) => {
                        warn!("checking mirror {} failed: tag not found", mirror.host);
                    }
                    Err(e) => {
                        warn!("checking mirror {} failed: {}", mirror.host, e);
                    }
                }
            }
        }

        if response.is_empty() {
            let origin_reference = repo.tag(source.tag());
            response = self
                .check_reference(origin_credentials, previous, &origin_reference)
                .await
                .map_err(|e| {
                    Error::origin_resolution_failed(repo.registry.clone(), e.to_string())
                })?;
        }

        Ok(response)
    }

    /// Single-endpoint check shared by the mirror and origin attempts.
    ///
    /// An empty response means the tag does not currently exist. When the
    /// tag resolves and the previous digest differs, the previous digest is
    /// re-resolved against the same repository to confirm the registry
    /// still has it; if so it is emitted first. The current digest is
    /// always emitted last, even when unchanged, which keeps "no change"
    /// idempotent for the consumer.
    async fn check_reference(
        &self,
        credentials: BasicCredentials,
        previous: Option<&Version>,
        reference: &Reference,
    ) -> Result<CheckResponse, TransportError> {
        let opts = ResolveOpts::new(credentials);

        let mut response = CheckResponse::new();
        let Some(digest) = resolve_digest(self.transport, reference, &opts).await? else {
            return Ok(response);
        };

        if let Some(previous) = previous {
            if previous.digest != digest {
                let previous_reference = reference.repository.digest(&previous.digest);
                if resolve_digest(self.transport, &previous_reference, &opts)
                    .await?
                    .is_some()
                {
                    response.push(previous.clone());
                }
            }
        }

        response.push(Version::new(digest));

        Ok(response)
    }
}

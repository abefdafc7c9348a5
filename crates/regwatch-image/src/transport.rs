use crate::reference::Reference;
use async_trait::async_trait;
use regwatch_core::BasicCredentials;
use reqwest::header::{ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::Method;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

pub use reqwest::StatusCode;

/// Manifest media types accepted on HEAD/GET, including multi-platform
/// index types.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json,\
application/vnd.docker.distribution.manifest.v2+json,\
application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.list.v2+json";

const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Platform selector sent with manifest requests so that multi-platform
/// manifest lists resolve to a single-platform digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
}

impl Platform {
    /// Platform of the invoking host, using OCI architecture names.
    pub fn host() -> Self {
        let architecture = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };

        Self {
            os: std::env::consts::OS.to_string(),
            architecture: architecture.to_string(),
        }
    }
}

/// Per-request options: auth context and platform selection.
#[derive(Debug, Clone)]
pub struct ResolveOpts {
    pub credentials: BasicCredentials,
    pub platform: Platform,
}

impl ResolveOpts {
    /// Options for the invoking host's platform with the given credentials
    pub fn new(credentials: BasicCredentials) -> Self {
        Self {
            credentials,
            platform: Platform::host(),
        }
    }
}

/// Errors from the registry transport.
///
/// Registry-reported failures keep their HTTP status as a structured field
/// so "not found" can be classified without string matching.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("registry returned {status} for {url}: {body}")]
    Registry {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("token exchange with {realm} failed: {message}")]
    TokenExchange { realm: String, message: String },

    #[error("unexpected manifest response from {url}: {message}")]
    Manifest { url: String, message: String },
}

impl TransportError {
    /// Whether the registry reported a missing manifest/tag. This is the
    /// only condition treated as a legitimate negative result rather than
    /// a hard error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Registry {
                status: StatusCode::NOT_FOUND,
                ..
            }
        )
    }
}

/// Registry transport collaborator: resolve a reference's manifest digest
/// via HEAD or GET.
#[async_trait]
pub trait ManifestTransport: Send + Sync {
    async fn head(
        &self,
        reference: &Reference,
        opts: &ResolveOpts,
    ) -> Result<String, TransportError>;

    async fn get(&self, reference: &Reference, opts: &ResolveOpts)
        -> Result<String, TransportError>;
}

/// Production transport speaking the Docker Registry v2 manifest API.
pub struct HttpTransport {
    client: reqwest::Client,
    /// Bearer tokens obtained from registry auth endpoints, keyed by
    /// registry/repository
    tokens: RwLock<HashMap<String, String>>,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("regwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::BuildClient)?;

        Ok(Self {
            client,
            tokens: RwLock::new(HashMap::new()),
        })
    }

    fn manifest_url(&self, reference: &Reference) -> String {
        let host = api_host(&reference.repository.registry);
        format!(
            "{}://{}/v2/{}/manifests/{}",
            scheme(host),
            host,
            reference.repository.path,
            reference.identifier()
        )
    }

    fn token_key(reference: &Reference) -> String {
        format!(
            "{}/{}",
            reference.repository.registry, reference.repository.path
        )
    }

    /// Fetch a bearer token from the realm advertised in a 401 challenge.
    /// Anonymous requests work for public repositories; credentials are
    /// forwarded when present.
    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        reference: &Reference,
        opts: &ResolveOpts,
    ) -> Result<String, TransportError> {
        let exchange_err = |message: String| TransportError::TokenExchange {
            realm: challenge.realm.clone(),
            message,
        };

        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", reference.repository.path));

        let mut query = vec![("scope", scope.as_str())];
        if let Some(service) = &challenge.service {
            query.push(("service", service));
        }

        debug!("requesting bearer token from {}", challenge.realm);

        let mut request = self.client.get(&challenge.realm).query(&query);
        if opts.credentials.is_present() {
            request = request.basic_auth(&opts.credentials.username, Some(&opts.credentials.password));
        }

        let response = request.send().await.map_err(|e| exchange_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(exchange_err(format!("status {}", response.status())));
        }

        let body: TokenResponse = response.json().await.map_err(|e| exchange_err(e.to_string()))?;
        let token = body
            .token
            .or(body.access_token)
            .ok_or_else(|| exchange_err("no token in response".to_string()))?;

        self.tokens
            .write()
            .unwrap()
            .insert(Self::token_key(reference), token.clone());

        Ok(token)
    }

    async fn send(
        &self,
        method: Method,
        reference: &Reference,
        opts: &ResolveOpts,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.manifest_url(reference);
        let mut token = self
            .tokens
            .read()
            .unwrap()
            .get(&Self::token_key(reference))
            .cloned();
        let mut retried = false;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(ACCEPT, MANIFEST_ACCEPT);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            } else if opts.credentials.is_present() {
                request = request
                    .basic_auth(&opts.credentials.username, Some(&opts.credentials.password));
            }

            let response = request.send().await.map_err(|e| TransportError::Http {
                url: url.clone(),
                source: e,
            })?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                let challenge = response
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|h| h.to_str().ok())
                    .and_then(parse_bearer_challenge);

                if let Some(challenge) = challenge {
                    token = Some(self.fetch_token(&challenge, reference, opts).await?);
                    retried = true;
                    continue;
                }
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Registry { status, url, body });
            }

            return Ok(response);
        }
    }
}

#[async_trait]
impl ManifestTransport for HttpTransport {
    async fn head(
        &self,
        reference: &Reference,
        opts: &ResolveOpts,
    ) -> Result<String, TransportError> {
        let response = self.send(Method::HEAD, reference, opts).await?;

        // A multi-platform index cannot be resolved to a single-platform
        // digest from headers alone. Failing here makes the resolver retry
        // with GET, which selects the platform entry, so the reported
        // digest does not depend on which verb succeeded.
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok());
        if content_type.is_some_and(is_index_media_type) {
            return Err(TransportError::Manifest {
                url: self.manifest_url(reference),
                message: "multi-platform index requires the manifest body".to_string(),
            });
        }

        // HEAD carries no body, so the digest must come from the header.
        // A registry that omits it gets retried via GET by the resolver.
        digest_header(&response).ok_or_else(|| TransportError::Manifest {
            url: self.manifest_url(reference),
            message: format!("missing {DIGEST_HEADER} header"),
        })
    }

    async fn get(
        &self,
        reference: &Reference,
        opts: &ResolveOpts,
    ) -> Result<String, TransportError> {
        let response = self.send(Method::GET, reference, opts).await?;
        let url = self.manifest_url(reference);

        let header_digest = digest_header(&response);
        let body = response.bytes().await.map_err(|e| TransportError::Http {
            url: url.clone(),
            source: e,
        })?;

        // Multi-platform index: pick the entry for the requested platform
        if let Some(index) = parse_index(&body) {
            return select_platform_digest(&index, &opts.platform).ok_or_else(|| {
                TransportError::Manifest {
                    url,
                    message: format!(
                        "no manifest for platform {}/{}",
                        opts.platform.os, opts.platform.architecture
                    ),
                }
            });
        }

        Ok(header_digest
            .unwrap_or_else(|| format!("sha256:{}", hex::encode(Sha256::digest(&body)))))
    }
}

fn digest_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(DIGEST_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

/// Docker Hub's manifest API lives on a different host than the registry
/// name users write.
fn api_host(registry: &str) -> &str {
    match registry {
        "docker.io" | "index.docker.io" => "registry-1.docker.io",
        other => other,
    }
}

fn is_index_media_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    matches!(
        media_type,
        "application/vnd.oci.image.index.v1+json"
            | "application/vnd.docker.distribution.manifest.list.v2+json"
    )
}

/// Local registries (and test servers) speak plain HTTP.
fn scheme(host: &str) -> &'static str {
    if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    }
}

#[derive(Debug, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

/// Parse a `WWW-Authenticate: Bearer realm="...",service="..."` challenge.
fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let params = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?;

    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    for param in params.split(',') {
        let (key, value) = param.trim().split_once('=')?;
        let value = value.trim_matches('"').to_string();
        match key {
            "realm" => realm = Some(value),
            "service" => service = Some(value),
            "scope" => scope = Some(value),
            _ => {}
        }
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
        scope,
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestIndex {
    #[serde(default)]
    manifests: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    digest: String,
    #[serde(default)]
    platform: Option<EntryPlatform>,
}

#[derive(Debug, Deserialize)]
struct EntryPlatform {
    os: String,
    architecture: String,
}

fn parse_index(body: &[u8]) -> Option<ManifestIndex> {
    serde_json::from_slice::<ManifestIndex>(body)
        .ok()
        .filter(|index| !index.manifests.is_empty())
}

fn select_platform_digest(index: &ManifestIndex, platform: &Platform) -> Option<String> {
    index
        .manifests
        .iter()
        .find(|entry| {
            entry.platform.as_ref().is_some_and(|p| {
                p.os == platform.os && p.architecture == platform.architecture
            })
        })
        .map(|entry| entry.digest.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = parse_bearer_challenge(
            "Bearer realm=\"https://auth.docker.io/token\",service=\"registry.docker.io\",scope=\"repository:library/busybox:pull\"",
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.docker.io"));
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:library/busybox:pull")
        );

        let challenge = parse_bearer_challenge("Bearer realm=\"https://example.com/t\"").unwrap();
        assert_eq!(challenge.service, None);

        assert!(parse_bearer_challenge("Basic realm=\"x\"").is_none());
        assert!(parse_bearer_challenge("Bearer service=\"x\"").is_none());
    }

    #[test]
    fn test_not_found_predicate_inspects_status_only() {
        let not_found = TransportError::Registry {
            status: StatusCode::NOT_FOUND,
            url: "http://localhost/v2/app/manifests/latest".to_string(),
            body: String::new(),
        };
        assert!(not_found.is_not_found());

        let unauthorized = TransportError::Registry {
            status: StatusCode::UNAUTHORIZED,
            url: "http://localhost/v2/app/manifests/latest".to_string(),
            body: "not found".to_string(),
        };
        assert!(!unauthorized.is_not_found());

        let manifest = TransportError::Manifest {
            url: "http://localhost".to_string(),
            message: "404 not found".to_string(),
        };
        assert!(!manifest.is_not_found());
    }

    #[test]
    fn test_api_host_and_scheme() {
        assert_eq!(api_host("docker.io"), "registry-1.docker.io");
        assert_eq!(api_host("index.docker.io"), "registry-1.docker.io");
        assert_eq!(api_host("ghcr.io"), "ghcr.io");

        assert_eq!(scheme("localhost:5000"), "http");
        assert_eq!(scheme("127.0.0.1:39211"), "http");
        assert_eq!(scheme("ghcr.io"), "https");
    }

    #[test]
    fn test_platform_selection() {
        let index: ManifestIndex = serde_json::from_value(serde_json::json!({
            "manifests": [
                { "digest": "sha256:amd64", "platform": { "os": "linux", "architecture": "amd64" } },
                { "digest": "sha256:arm64", "platform": { "os": "linux", "architecture": "arm64" } },
                { "digest": "sha256:attestation" }
            ]
        }))
        .unwrap();

        let platform = Platform {
            os: "linux".to_string(),
            architecture: "arm64".to_string(),
        };
        assert_eq!(
            select_platform_digest(&index, &platform).as_deref(),
            Some("sha256:arm64")
        );

        let platform = Platform {
            os: "windows".to_string(),
            architecture: "amd64".to_string(),
        };
        assert_eq!(select_platform_digest(&index, &platform), None);
    }

    #[test]
    fn test_host_platform_uses_oci_names() {
        let platform = Platform::host();
        assert!(!platform.os.is_empty());
        // Rust arch names that differ from OCI ones must be mapped
        assert_ne!(platform.architecture, "x86_64");
        assert_ne!(platform.architecture, "aarch64");
    }

    #[test]
    fn test_index_media_type_detection() {
        assert!(is_index_media_type("application/vnd.oci.image.index.v1+json"));
        assert!(is_index_media_type(
            "application/vnd.docker.distribution.manifest.list.v2+json; charset=utf-8"
        ));
        assert!(!is_index_media_type(
            "application/vnd.oci.image.manifest.v1+json"
        ));
        assert!(!is_index_media_type("application/json"));
    }

    #[test]
    fn test_plain_manifest_is_not_an_index() {
        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "config": { "digest": "sha256:cfg" },
            "layers": []
        });
        assert!(parse_index(manifest.to_string().as_bytes()).is_none());
    }
}

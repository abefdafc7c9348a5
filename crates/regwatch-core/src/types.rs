use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag queried when the source does not name one explicitly.
pub const DEFAULT_TAG: &str = "latest";

/// Username/password pair for registry authentication.
///
/// Both fields empty means anonymous access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    /// Whether a usable credential pair is present. A partial pair is
    /// treated as anonymous, matching registry clients that only send
    /// basic auth when both halves are set.
    pub fn is_present(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Mirror registry descriptor with its own, independent credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryMirror {
    /// Mirror registry host (e.g. "mirror.example.com:5000")
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl RegistryMirror {
    pub fn credentials(&self) -> BasicCredentials {
        BasicCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Configuration identifying the repository to watch.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    /// Repository, optionally qualified with a registry
    /// (e.g. "busybox", "my/app", "registry.example.com/my/app")
    pub repository: String,

    /// Tag selector, defaulting to "latest"
    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,

    /// Optional mirror consulted before the origin registry. Only applies
    /// when the repository resolves to the default public registry.
    #[serde(default)]
    pub registry_mirror: Option<RegistryMirror>,

    /// AWS credential triple for the ECR token exchange. The exchange is
    /// performed only when all three are non-empty.
    #[serde(default)]
    pub aws_access_key_id: String,
    #[serde(default)]
    pub aws_secret_access_key: String,
    #[serde(default)]
    pub aws_region: String,
}

impl Source {
    /// The tag to query, defaulting to "latest"
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Static credentials for the origin registry
    pub fn credentials(&self) -> BasicCredentials {
        BasicCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// The AWS credential triple, if fully configured
    pub fn aws_credentials(&self) -> Option<(&str, &str, &str)> {
        if self.aws_access_key_id.is_empty()
            || self.aws_secret_access_key.is_empty()
            || self.aws_region.is_empty()
        {
            return None;
        }

        Some((
            &self.aws_access_key_id,
            &self.aws_secret_access_key,
            &self.aws_region,
        ))
    }
}

/// An opaque content digest ("algorithm:hex") identifying a manifest.
///
/// Two versions are equal iff their digest strings are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    pub digest: String,
}

impl Version {
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest)
    }
}

/// A single check invocation: the source plus the previously-known version
/// (absent on first run).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
}

/// Ordered versions, oldest-known-still-present first, current last.
pub type CheckResponse = Vec<Version>;

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_source(repository: &str) -> Source {
        serde_json::from_value(serde_json::json!({ "repository": repository })).unwrap()
    }

    #[test]
    fn test_tag_defaults_to_latest() {
        let source = minimal_source("busybox");
        assert_eq!(source.tag(), "latest");

        let mut source = minimal_source("busybox");
        source.tag = Some("1.36".to_string());
        assert_eq!(source.tag(), "1.36");
    }

    #[test]
    fn test_aws_credentials_require_full_triple() {
        let mut source = minimal_source("busybox");
        assert!(source.aws_credentials().is_none());

        source.aws_access_key_id = "AKIAEXAMPLE".to_string();
        source.aws_region = "us-east-1".to_string();
        // Secret key still missing
        assert!(source.aws_credentials().is_none());

        source.aws_secret_access_key = "secret".to_string();
        assert_eq!(
            source.aws_credentials(),
            Some(("AKIAEXAMPLE", "secret", "us-east-1"))
        );
    }

    #[test]
    fn test_partial_basic_credentials_are_anonymous() {
        let credentials = BasicCredentials {
            username: "user".to_string(),
            password: String::new(),
        };
        assert!(!credentials.is_present());

        let credentials = BasicCredentials {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert!(credentials.is_present());
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let payload = serde_json::json!({
            "source": { "repository": "busybox" },
            "versions": []
        });
        assert!(serde_json::from_value::<CheckRequest>(payload).is_err());

        let payload = serde_json::json!({
            "source": { "repository": "busybox", "insecure": true }
        });
        assert!(serde_json::from_value::<CheckRequest>(payload).is_err());
    }

    #[test]
    fn test_request_decodes_with_optional_version() {
        let payload = serde_json::json!({
            "source": { "repository": "busybox", "tag": "1.36" },
            "version": { "digest": "sha256:abcd" }
        });
        let request: CheckRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.source.repository, "busybox");
        assert_eq!(request.version.unwrap().digest, "sha256:abcd");
    }

    #[test]
    fn test_version_equality_is_byte_equality() {
        assert_eq!(Version::new("sha256:aaaa"), Version::new("sha256:aaaa"));
        assert_ne!(Version::new("sha256:aaaa"), Version::new("sha256:AAAA"));
    }

    #[test]
    fn test_response_serializes_as_digest_list() {
        let response: CheckResponse =
            vec![Version::new("sha256:bbbb"), Version::new("sha256:aaaa")];
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"[{"digest":"sha256:bbbb"},{"digest":"sha256:aaaa"}]"#
        );
    }
}

use regwatch_core::Error;
use std::fmt;

/// Registry assumed when a repository does not name one.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// A registry host plus repository path, without a tag or digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Registry hostname (e.g. "docker.io", "registry.example.com:5000")
    pub registry: String,
    /// Repository path (e.g. "library/busybox", "my/app")
    pub path: String,
}

impl Repository {
    /// Parse a repository string like "my/app" or "registry.example.com/my/app".
    ///
    /// Validation is weak: any syntactically plausible repository is
    /// accepted, no registry reachability is checked. The first path
    /// component is treated as a registry only when it looks like a host
    /// (contains a dot or port, or is "localhost"); otherwise the default
    /// public registry is assumed. Single-component repositories on the
    /// default registry get the implicit "library/" namespace.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (registry, path) = match s.split_once('/') {
            Some((first, rest)) if looks_like_registry(first) => (first, rest),
            _ => (DEFAULT_REGISTRY, s),
        };

        if path.is_empty() || !is_plausible_path(path) {
            return Err(Error::invalid_source(s));
        }

        let path = if is_default_registry_host(registry) && !path.contains('/') {
            format!("library/{path}")
        } else {
            path.to_string()
        };

        Ok(Self {
            registry: registry.to_string(),
            path,
        })
    }

    /// Whether this repository lives on the ecosystem's default public
    /// registry. Mirror substitution only applies in that case: an
    /// explicitly-named registry is never silently redirected.
    pub fn is_default_registry(&self) -> bool {
        is_default_registry_host(&self.registry)
    }

    /// Same repository path on a different registry host (mirror
    /// substitution).
    pub fn with_registry(&self, host: &str) -> Result<Self, Error> {
        if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
            return Err(Error::invalid_source(host));
        }

        Ok(Self {
            registry: host.to_string(),
            path: self.path.clone(),
        })
    }

    /// Reference to a mutable tag within this repository
    pub fn tag(&self, tag: &str) -> Reference {
        Reference {
            repository: self.clone(),
            target: Target::Tag(tag.to_string()),
        }
    }

    /// Reference to an immutable, content-addressed digest within this
    /// repository
    pub fn digest(&self, digest: &str) -> Reference {
        Reference {
            repository: self.clone(),
            target: Target::Digest(digest.to_string()),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.path)
    }
}

/// What a reference points at within a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Mutable tag; the digest it resolves to may change between queries
    Tag(String),
    /// Content-addressed digest; either exists or does not
    Digest(String),
}

/// Fully-qualified pointer to a tag or digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub repository: Repository,
    pub target: Target,
}

impl Reference {
    /// The path segment used in manifest URLs: the tag name or the digest
    /// string.
    pub fn identifier(&self) -> &str {
        match &self.target {
            Target::Tag(tag) => tag,
            Target::Digest(digest) => digest,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Tag(tag) => write!(f, "{}:{}", self.repository, tag),
            Target::Digest(digest) => write!(f, "{}@{}", self.repository, digest),
        }
    }
}

fn is_default_registry_host(host: &str) -> bool {
    matches!(
        host,
        DEFAULT_REGISTRY | "index.docker.io" | "registry-1.docker.io"
    )
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn is_plausible_path(path: &str) -> bool {
    !path.contains(':')
        && !path.contains('@')
        && !path.chars().any(char::is_whitespace)
        && !path.split('/').any(str::is_empty)
}

//! Image reference parsing
//!
//! A reference names an image in a registry: `registry/repository[:tag][@digest]`.
//! References without a host-like first component default to Docker Hub, and
//! references without a tag or digest default to the `latest` tag.

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

use crate::constants::tag;

/// Registry used when a reference does not name one
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    registry: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl Reference {
    /// Registry hostname (and optional port)
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path within the registry
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Tag, defaulting to `latest` when neither tag nor digest was given
    pub fn tag(&self) -> &str {
        match (&self.tag, &self.digest) {
            (Some(t), _) => t,
            (None, Some(_)) => "",
            (None, None) => tag::DEFAULT,
        }
    }

    /// Digest, if the reference pins one
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// The tag or digest to address manifests with
    pub fn manifest_ref(&self) -> &str {
        match &self.digest {
            Some(d) => d,
            None => self.tag(),
        }
    }

    /// Same repository, addressed by the given digest
    pub fn with_digest(&self, digest: &str) -> Reference {
        Reference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        }
    }

    /// Parse a reference, prefixing a configured default registry when the
    /// name does not carry a host-like component of its own
    pub fn parse_with_default(s: &str, default_registry: Option<&str>) -> Result<Reference> {
        let reference: Reference = s.parse()?;
        if let Some(default) = default_registry {
            if reference.registry() == DEFAULT_REGISTRY && !s.starts_with(DEFAULT_REGISTRY) {
                return format!("{}/{}", default, s).parse();
            }
        }
        Ok(reference)
    }

    /// Same repository, addressed by the given tag
    pub fn with_tag(&self, tag: &str) -> Reference {
        Reference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
            digest: None,
        }
    }
}

impl FromStr for Reference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            bail!("Empty image reference");
        }

        // Split off a pinned digest first; everything after '@' is the digest.
        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => {
                if !digest.starts_with("sha256:") {
                    bail!("Invalid digest in reference {}: {}", s, digest);
                }
                (name, Some(digest.to_string()))
            }
            None => (s, None),
        };

        // A tag is a ':' after the final '/', so registry ports don't match.
        let (name, tag) = match name.rfind(':') {
            Some(i) if i > name.rfind('/').unwrap_or(0) => {
                (&name[..i], Some(name[i + 1..].to_string()))
            }
            _ => (name, None),
        };

        if let Some(t) = &tag {
            if t.is_empty() {
                bail!("Empty tag in reference: {}", s);
            }
        }

        let (registry, repository) = split_registry(name);
        if repository.is_empty() {
            bail!("Missing repository in reference: {}", s);
        }

        Ok(Reference {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Split a reference name into registry and repository
///
/// The first path component is a registry when it looks like a host:
/// contains a dot or a port, or is `localhost`. Anything else is a
/// repository on Docker Hub.
fn split_registry(name: &str) -> (&str, &str) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (first, rest);
        }
    }
    (DEFAULT_REGISTRY, name)
}

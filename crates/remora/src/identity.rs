//! Remote repository identity resolution.
//!
//! Every artifact remora produces is namespaced under `host/owner/name`,
//! derived once from the configured repository URL before any network or
//! filesystem work happens.

use thiserror::Error;
use url::Url;

/// Errors raised while resolving a repository URL.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The URL could not be parsed at all.
    #[error("invalid repository url {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL parsed but does not name a `host/owner/name` repository.
    #[error("invalid repository url {url:?}: expected host/owner/name")]
    Shape { url: String },

    /// The resolved repository name is unusable as a path component.
    #[error("invalid repository name {name:?}")]
    Name { name: String },
}

/// The `{host, owner, name}` triple a repository URL resolves to.
///
/// Configured URLs may carry an `https://` scheme or omit it
/// (`github.com/rust-lang/rust`); both forms resolve identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RemoteIdentity {
    /// Resolve a repository URL into its identity.
    ///
    /// Names that would escape their namespace (`.`, `/`, empty) are
    /// rejected here, before anything touches the network or the disk.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        let url = Url::parse(&with_scheme).map_err(|source| IdentityError::Parse {
            url: raw.to_string(),
            source,
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| IdentityError::Shape {
                url: raw.to_string(),
            })?
            .to_string();

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            return Err(IdentityError::Shape {
                url: raw.to_string(),
            });
        }
        let name = segments
            .pop()
            .unwrap_or_default()
            .trim_end_matches(".git")
            .to_string();
        let owner = segments.pop().unwrap_or_default().to_string();

        if name.is_empty() || name == "." || name == "/" || owner.is_empty() {
            return Err(IdentityError::Name { name });
        }

        Ok(Self { host, owner, name })
    }

    /// The `host/owner/name` prefix under which artifacts are stored.
    pub fn prefix(&self) -> String {
        format!("{}/{}/{}", self.host, self.owner, self.name)
    }
}

impl std::fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schemeless_url() {
        let id = RemoteIdentity::parse("github.com/rust-lang/rust").unwrap();
        assert_eq!(id.host, "github.com");
        assert_eq!(id.owner, "rust-lang");
        assert_eq!(id.name, "rust");
    }

    #[test]
    fn parses_https_url_and_strips_git_suffix() {
        let id = RemoteIdentity::parse("https://github.com/rust-lang/rust.git").unwrap();
        assert_eq!(id.prefix(), "github.com/rust-lang/rust");
    }

    #[test]
    fn rejects_bare_host() {
        assert!(RemoteIdentity::parse("github.com").is_err());
    }

    #[test]
    fn rejects_dot_name() {
        assert!(RemoteIdentity::parse("github.com/owner/.").is_err());
    }

    #[test]
    fn rejects_missing_owner() {
        assert!(RemoteIdentity::parse("github.com//repo").is_err());
    }
}

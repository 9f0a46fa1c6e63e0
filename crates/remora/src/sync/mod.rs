//! Sync orchestration.
//!
//! One submodule per mirrored facet (code/wiki trees, issues, discussions,
//! release assets, full dumps). Each facet runs strictly sequentially for a
//! single repository: prepare a working directory, bring the local state up
//! to date, archive if anything changed, fan the result out to every
//! configured storage target, clean up.

pub mod code;
pub mod discussions;
pub mod dump;
pub mod issues;
pub mod releases;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{RepoConfig, RepoKind, StorageConfig};
use crate::git::GitError;
use crate::github::{GitHub, GitHubError};
use crate::identity::IdentityError;
use crate::storage::{self, ObjectStore, StorageError};

/// Errors surfaced by a sync run. Each is terminal for the step that raised
/// it; reruns are safe because every step is idempotent.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("repository {repo} has no usable storage target")]
    NoStorage { repo: String },
}

/// A named, opened storage backend to publish into.
pub struct Target {
    pub name: String,
    pub store: Box<dyn ObjectStore>,
}

/// Open the storage targets a repository publishes to.
///
/// `overrides` (from the CLI) replaces the repository's configured list when
/// non-empty. Names that do not match a configured storage are logged and
/// skipped; ending up with zero targets is an error.
pub async fn open_targets(
    repo: &RepoConfig,
    storages: &HashMap<String, StorageConfig>,
    overrides: &[String],
) -> Result<Vec<Target>, SyncError> {
    let names = if overrides.is_empty() {
        &repo.storage
    } else {
        overrides
    };
    let mut targets = Vec::new();
    for name in names {
        let Some(cfg) = storages.get(name) else {
            warn!(storage = %name, repo = %repo.name, "storage not found in config");
            continue;
        };
        targets.push(Target {
            name: name.clone(),
            store: storage::open(cfg).await?,
        });
    }
    if targets.is_empty() {
        return Err(SyncError::NoStorage {
            repo: repo.name.clone(),
        });
    }
    Ok(targets)
}

/// Store one archive under the same key in every target, in order, stopping
/// at the first failure.
pub async fn publish(targets: &[Target], key: &str, data: &[u8]) -> Result<(), SyncError> {
    for target in targets {
        target.store.put(key, data).await?;
        info!(target = %target.name, key, size = data.len(), "archive stored");
    }
    Ok(())
}

/// Expand a descriptor into concrete repository descriptors.
///
/// A `repo` descriptor maps to itself; `user`/`org` descriptors are expanded
/// by enumerating the account's repositories through the API, each inheriting
/// the descriptor's settings.
pub async fn expand(github: &GitHub, repo: &RepoConfig) -> Result<Vec<RepoConfig>, SyncError> {
    match repo.kind {
        RepoKind::Repo => Ok(vec![repo.clone()]),
        RepoKind::User | RepoKind::Org => {
            let urls = github.account_repo_urls(&repo.org_name, repo.kind).await?;
            info!(account = %repo.org_name, count = urls.len(), "expanded account descriptor");
            Ok(urls
                .into_iter()
                .map(|url| {
                    let name = url.rsplit('/').next().unwrap_or(url.as_str()).to_string();
                    RepoConfig {
                        name,
                        url,
                        kind: RepoKind::Repo,
                        org_name: String::new(),
                        cron: repo.cron.clone(),
                        storage: repo.storage.clone(),
                        use_cache: repo.use_cache,
                        all_branches: repo.all_branches,
                        depth: repo.depth,
                        download_releases: repo.download_releases,
                        download_issues: repo.download_issues,
                        download_wiki: repo.download_wiki,
                        download_discussion: repo.download_discussion,
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageKind;
    use tempfile::TempDir;

    fn file_storage(name: &str, root: &std::path::Path) -> StorageConfig {
        StorageConfig {
            name: name.to_string(),
            kind: StorageKind::File,
            path: root.to_string_lossy().into_owned(),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn unknown_storage_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let mut storages = HashMap::new();
        storages.insert("local".to_string(), file_storage("local", dir.path()));
        let repo = RepoConfig {
            name: "demo".into(),
            storage: vec!["local".into(), "missing".into()],
            ..RepoConfig::default()
        };

        let targets = open_targets(&repo, &storages, &[]).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "local");
    }

    #[tokio::test]
    async fn zero_targets_is_an_error() {
        let repo = RepoConfig {
            name: "demo".into(),
            storage: vec!["missing".into()],
            ..RepoConfig::default()
        };
        let Err(err) = open_targets(&repo, &HashMap::new(), &[]).await else {
            panic!("expected an error for a repo with no usable storage");
        };
        assert!(matches!(err, SyncError::NoStorage { .. }));
    }

    #[tokio::test]
    async fn overrides_replace_configured_targets() {
        let dir = TempDir::new().unwrap();
        let mut storages = HashMap::new();
        storages.insert("local".to_string(), file_storage("local", dir.path()));
        storages.insert("other".to_string(), file_storage("other", dir.path()));
        let repo = RepoConfig {
            name: "demo".into(),
            storage: vec!["local".into()],
            ..RepoConfig::default()
        };

        let targets = open_targets(&repo, &storages, &["other".to_string()])
            .await
            .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "other");
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_target() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let targets = vec![
            Target {
                name: "a".into(),
                store: crate::storage::open(&file_storage("a", &a)).await.unwrap(),
            },
            Target {
                name: "b".into(),
                store: crate::storage::open(&file_storage("b", &b)).await.unwrap(),
            },
        ];

        publish(&targets, "x/y.tar.gz", b"payload").await.unwrap();
        assert!(a.join("x/y.tar.gz").exists());
        assert!(b.join("x/y.tar.gz").exists());
    }
}

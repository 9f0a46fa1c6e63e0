//! Release asset mirroring with retention.
//!
//! The planner in [`crate::retention`] decides which releases survive the
//! count and size limits; this module executes the plan: a size-based
//! idempotence check per target decides which targets still need each asset,
//! the asset is downloaded at most once and fanned out, and afterwards every
//! release directory that fell out of the plan is evicted from storage.

use tracing::{info, warn};

use super::{SyncError, Target};
use crate::config::RepoConfig;
use crate::github::GitHub;
use crate::identity::RemoteIdentity;
use crate::retention;

/// Mirror the retained releases' assets into every target under
/// `<host/owner/name>/release/<tag>/<asset>`, then evict non-retained tags.
pub async fn sync_releases(
    github: &GitHub,
    repo: &RepoConfig,
    targets: &[Target],
    num_limit: i64,
    size_limit: i64,
) -> Result<(), SyncError> {
    let identity = RemoteIdentity::parse(&repo.url)?;
    let releases = github.releases(&identity.owner, &identity.name).await?;
    let kept = retention::plan(releases, num_limit, size_limit);
    info!(repo = %repo.name, kept = kept.len(), "retention plan computed");

    let prefix = identity.prefix();
    for release in &kept {
        for asset in release.assets.iter().filter(|a| a.uploaded()) {
            let key = format!("{prefix}/release/{}/{}", release.tag, asset.name);

            let needy = targets_needing(targets, &key, asset.size).await;
            if needy.is_empty() {
                continue;
            }

            info!(tag = %release.tag, asset = %asset.name, targets = needy.len(), "downloading asset");
            let data = github.download_asset(asset).await?;
            for target in needy {
                target.store.put(&key, &data).await?;
                info!(target = %target.name, key, "asset stored");
            }
        }
    }

    evict(&prefix, &kept, targets).await
}

/// Targets that still need an asset of `size` bytes at `key`: the asset is
/// absent, unreadable, or present with a different byte size. A target
/// holding an object of the exact size is skipped.
async fn targets_needing<'a>(targets: &'a [Target], key: &str, size: u64) -> Vec<&'a Target> {
    let mut needy = Vec::new();
    for target in targets {
        match target.store.list_meta(key).await {
            Ok(metas) if metas.first().map(|m| m.size) == Some(size) => {}
            Ok(_) | Err(_) => needy.push(target),
        }
    }
    needy
}

/// Delete release directories that are not in the retention plan. A target
/// whose release prefix cannot be listed (typically: nothing stored yet) is
/// skipped.
async fn evict(
    prefix: &str,
    kept: &[crate::github::Release],
    targets: &[Target],
) -> Result<(), SyncError> {
    let release_prefix = format!("{prefix}/release");
    for target in targets {
        let entries = match target.store.list_meta(&release_prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(target = %target.name, error = %e, "cannot list release prefix");
                }
                continue;
            }
        };
        for entry in entries {
            let tag = entry.base_name();
            if kept.iter().any(|r| r.tag == tag) {
                continue;
            }
            target.store.delete(&entry.path).await?;
            info!(target = %target.name, path = %entry.path, "evicted release");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageConfig, StorageKind};
    use crate::github::Release;
    use crate::storage;
    use tempfile::TempDir;

    async fn file_target(root: &std::path::Path) -> Target {
        let cfg = StorageConfig {
            name: "local".into(),
            kind: StorageKind::File,
            path: root.to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        Target {
            name: "local".into(),
            store: storage::open(&cfg).await.unwrap(),
        }
    }

    #[tokio::test]
    async fn matching_size_skips_redownload() {
        let dir = TempDir::new().unwrap();
        let target = file_target(dir.path()).await;
        let key = "gh/o/r/release/v1/tool.bin";
        target.store.put(key, b"12345").await.unwrap();

        let targets = [target];
        let needy = targets_needing(&targets, key, 5).await;
        assert!(needy.is_empty());
    }

    #[tokio::test]
    async fn size_mismatch_forces_redownload_to_that_target_only() {
        let dir = TempDir::new().unwrap();
        let stale = file_target(&dir.path().join("stale")).await;
        let fresh = file_target(&dir.path().join("fresh")).await;
        let key = "gh/o/r/release/v1/tool.bin";
        // One byte short on one target, exact on the other.
        stale.store.put(key, b"1234").await.unwrap();
        fresh.store.put(key, b"12345").await.unwrap();

        let targets = vec![stale, fresh];
        let needy = targets_needing(&targets, key, 5).await;
        assert_eq!(needy.len(), 1);
        assert!(std::ptr::eq(needy[0], &targets[0]));
    }

    #[tokio::test]
    async fn absent_asset_marks_the_target_needy() {
        let dir = TempDir::new().unwrap();
        let target = file_target(dir.path()).await;
        let targets = [target];
        let needy = targets_needing(&targets, "gh/o/r/release/v1/tool.bin", 5).await;
        assert_eq!(needy.len(), 1);
    }

    #[tokio::test]
    async fn eviction_removes_only_unplanned_tags() {
        let dir = TempDir::new().unwrap();
        let target = file_target(dir.path()).await;
        target
            .store
            .put("gh/o/r/release/v1/a.bin", b"one")
            .await
            .unwrap();
        target
            .store
            .put("gh/o/r/release/v2/b.bin", b"two")
            .await
            .unwrap();

        let kept = vec![Release {
            tag: "v2".into(),
            published_at: None,
            assets: vec![],
        }];
        evict("gh/o/r", &kept, &[target]).await.unwrap();

        assert!(!dir.path().join("gh/o/r/release/v1").exists());
        assert!(dir.path().join("gh/o/r/release/v2/b.bin").exists());
    }

    #[tokio::test]
    async fn eviction_skips_targets_with_no_release_prefix() {
        let dir = TempDir::new().unwrap();
        let target = file_target(dir.path()).await;
        // Nothing stored yet; must not error.
        evict("gh/o/r", &[], &[target]).await.unwrap();
    }
}

//! Timestamped full dumps.
//!
//! Unlike the fixed-name code snapshot, a dump keeps history in storage:
//! every run publishes a fresh `<name>-YYYYMMDDHHMMSS.tar.gz` at the target
//! root, so successive runs accumulate distinct archives.

use std::path::Path;

use chrono::Utc;
use tracing::info;

use super::{publish, SyncError, Target};
use crate::archive;
use crate::config::RepoConfig;
use crate::git;
use crate::identity::RemoteIdentity;
use crate::workdir::Workdir;

/// Mirror every branch of the repository and publish a timestamp-named
/// archive of the working tree.
pub async fn dump(repo: &RepoConfig, targets: &[Target]) -> Result<(), SyncError> {
    dump_in(&std::env::current_dir()?, repo, targets).await
}

/// Same as [`dump`], rooted at an explicit directory.
pub async fn dump_in(root: &Path, repo: &RepoConfig, targets: &[Target]) -> Result<(), SyncError> {
    let identity = RemoteIdentity::parse(&repo.url)?;
    let workdir = Workdir::create_in(root, repo.use_cache)?;

    let gitdir = workdir.path().join(&identity.name);
    let url = format!("https://{}", repo.url);
    let depth = repo.depth;
    let dir = gitdir.clone();
    let outcome = tokio::task::spawn_blocking(move || git::mirror(&url, &dir, true, depth)).await??;

    if outcome.updated {
        let bytes = archive::pack_dir(workdir.path(), &identity.name, &repo.name)?;
        let key = archive::dump_name(&repo.name, Utc::now());
        publish(targets, &key, &bytes).await?;
    } else {
        info!(repo = %repo.name, "up to date, no dump published");
    }

    workdir.cleanup()?;
    Ok(())
}

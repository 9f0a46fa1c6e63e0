//! Code and wiki tree mirroring.
//!
//! Both facets are git repositories (the wiki lives at `<url>.wiki`), so
//! they share one path: reconcile the local mirror with the remote, and when
//! anything moved, archive the tree and fan it out.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{publish, SyncError, Target};
use crate::archive;
use crate::config::RepoConfig;
use crate::git;
use crate::identity::RemoteIdentity;
use crate::workdir::Workdir;

/// Which git tree of the repository to mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tree {
    Code,
    Wiki,
}

impl Tree {
    /// Directory the tree is mirrored into, under `host/owner/name/`.
    fn dir(self) -> &'static str {
        match self {
            Tree::Code => "code",
            Tree::Wiki => "wiki",
        }
    }

    fn clone_url(self, base: &str) -> String {
        match self {
            Tree::Code => format!("https://{base}"),
            Tree::Wiki => format!("https://{base}.wiki"),
        }
    }

    /// Top-level entry name inside the archive, which also names the archive.
    fn entry_name(self, repo_name: &str) -> String {
        match self {
            Tree::Code => repo_name.to_string(),
            Tree::Wiki => format!("{repo_name}_wiki"),
        }
    }
}

/// Mirror the main tree and publish `<host/owner/name>/<name>.tar.gz`.
pub async fn sync_code(repo: &RepoConfig, targets: &[Target]) -> Result<(), SyncError> {
    sync_tree(&std::env::current_dir()?, repo, targets, Tree::Code).await
}

/// Mirror the wiki tree and publish `<host/owner/name>/<name>_wiki.tar.gz`.
pub async fn sync_wiki(repo: &RepoConfig, targets: &[Target]) -> Result<(), SyncError> {
    sync_tree(&std::env::current_dir()?, repo, targets, Tree::Wiki).await
}

/// Same as [`sync_code`], rooted at an explicit directory instead of the
/// process working directory.
pub async fn sync_code_in(
    root: &Path,
    repo: &RepoConfig,
    targets: &[Target],
) -> Result<(), SyncError> {
    sync_tree(root, repo, targets, Tree::Code).await
}

async fn sync_tree(
    root: &Path,
    repo: &RepoConfig,
    targets: &[Target],
    tree: Tree,
) -> Result<(), SyncError> {
    let identity = RemoteIdentity::parse(&repo.url)?;
    let workdir = Workdir::create_in(root, repo.use_cache)?;

    let base: PathBuf = workdir
        .path()
        .join(&identity.host)
        .join(&identity.owner)
        .join(&identity.name);
    let gitdir = base.join(tree.dir());

    let url = tree.clone_url(&repo.url);
    let all_branches = repo.all_branches;
    let depth = repo.depth;
    let dir = gitdir.clone();
    let outcome =
        tokio::task::spawn_blocking(move || git::mirror(&url, &dir, all_branches, depth)).await??;

    if outcome.updated {
        let entry = tree.entry_name(&identity.name);
        let bytes = archive::pack_dir(&base, tree.dir(), &entry)?;
        let key = format!("{}/{}", identity.prefix(), archive::snapshot_name(&entry));
        publish(targets, &key, &bytes).await?;
    } else {
        info!(repo = %repo.name, tree = tree.dir(), "up to date, nothing to publish");
    }

    workdir.cleanup()?;
    Ok(())
}

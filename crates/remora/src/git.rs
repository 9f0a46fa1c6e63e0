//! Local mirror maintenance for a remote git repository.

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    AutotagOption, BranchType, FetchOptions, Repository, ResetType,
};
use thiserror::Error;
use tracing::{debug, warn};

const REMOTE_NAME: &str = "origin";
const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("remote has no default branch")]
    NoDefaultBranch,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one reconciliation pass.
#[derive(Debug)]
pub struct MirrorOutcome {
    /// Whether any local ref moved during this pass.
    pub updated: bool,
    /// Short name of the remote's default branch.
    pub default_branch: String,
}

/// Clone or update the repository at `url` into `dir`, then reconcile local
/// branches with the remote.
///
/// Every remote branch (or only the default one, when `all_branches` is
/// false) gets a matching local branch: missing branches are created at the
/// remote tip, existing ones are fast-forwarded. Branches that cannot be
/// fast-forwarded are logged and skipped. The default branch is checked out
/// on return regardless of which branch was visited last.
pub fn mirror(
    url: &str,
    dir: &Path,
    all_branches: bool,
    depth: i32,
) -> Result<MirrorOutcome, GitError> {
    let (repo, cloned) = open_or_clone(url, dir, depth)?;
    // A fresh clone is always an update.
    let mut updated = cloned;

    {
        let mut remote = repo.find_remote(REMOTE_NAME)?;
        let mut opts = fetch_options(depth);
        remote.fetch(&[FETCH_REFSPEC], Some(&mut opts), None)?;
    }

    let default_branch = remote_default_branch(&repo)?;

    let branches = if all_branches {
        remote_branch_names(&repo)?
    } else {
        vec![default_branch.clone()]
    };

    for branch in &branches {
        match reconcile_branch(&repo, branch) {
            Ok(moved) => updated |= moved,
            Err(e) => {
                warn!(branch = %branch, error = %e, "skipping branch");
            }
        }
    }

    checkout_branch(&repo, &default_branch)?;

    Ok(MirrorOutcome {
        updated,
        default_branch,
    })
}

fn open_or_clone(url: &str, dir: &Path, depth: i32) -> Result<(Repository, bool), GitError> {
    if dir.join(".git").exists() {
        return Ok((Repository::open(dir)?, false));
    }
    std::fs::create_dir_all(dir)?;
    debug!(url, dir = %dir.display(), "cloning");
    let repo = RepoBuilder::new()
        .fetch_options(fetch_options(depth))
        .clone(url, dir)?;
    Ok((repo, true))
}

fn fetch_options(depth: i32) -> FetchOptions<'static> {
    let mut opts = FetchOptions::new();
    opts.download_tags(AutotagOption::All);
    if depth > 0 {
        opts.depth(depth);
    }
    opts
}

/// Default branch as advertised by the remote HEAD symref.
fn remote_default_branch(repo: &Repository) -> Result<String, GitError> {
    let mut remote = repo.find_remote(REMOTE_NAME)?;
    let connection = remote.connect_auth(git2::Direction::Fetch, None, None)?;
    for head in connection.list()? {
        if head.name() == "HEAD" {
            if let Some(target) = head.symref_target() {
                if let Some(short) = target.strip_prefix("refs/heads/") {
                    return Ok(short.to_string());
                }
            }
        }
    }
    Err(GitError::NoDefaultBranch)
}

fn remote_branch_names(repo: &Repository) -> Result<Vec<String>, GitError> {
    let mut names = Vec::new();
    for entry in repo.branches(Some(BranchType::Remote))? {
        let (branch, _) = entry?;
        let Some(name) = branch.name()? else { continue };
        let Some(short) = name.strip_prefix("origin/") else {
            continue;
        };
        // origin/HEAD is an alias, not a branch.
        if short == "HEAD" {
            continue;
        }
        names.push(short.to_string());
    }
    Ok(names)
}

/// Bring the local branch `name` up to its remote counterpart. Returns
/// whether the local ref moved.
fn reconcile_branch(repo: &Repository, name: &str) -> Result<bool, git2::Error> {
    let remote_ref = format!("refs/remotes/origin/{name}");
    let remote_commit = repo
        .find_reference(&remote_ref)?
        .peel_to_commit()?;

    match repo.find_branch(name, BranchType::Local) {
        Ok(local) => {
            let local_oid = local
                .get()
                .target()
                .ok_or_else(|| git2::Error::from_str("unborn local branch"))?;
            if local_oid == remote_commit.id() {
                return Ok(false);
            }
            let annotated = repo.find_annotated_commit(remote_commit.id())?;
            let (analysis, _) = repo.merge_analysis_for_ref(local.get(), &[&annotated])?;
            if !analysis.is_fast_forward() {
                return Err(git2::Error::from_str("non-fast-forward update"));
            }
            let mut reference = repo.find_reference(&format!("refs/heads/{name}"))?;
            reference.set_target(remote_commit.id(), "fast-forward")?;
            if is_checked_out(repo, name) {
                repo.reset(remote_commit.as_object(), ResetType::Hard, None)?;
            }
            Ok(true)
        }
        Err(_) => {
            let mut branch = repo.branch(name, &remote_commit, false)?;
            branch.set_upstream(Some(&format!("origin/{name}")))?;
            Ok(true)
        }
    }
}

fn is_checked_out(repo: &Repository, name: &str) -> bool {
    repo.head()
        .ok()
        .and_then(|h| h.shorthand().map(|s| s == name))
        .unwrap_or(false)
}

fn checkout_branch(repo: &Repository, name: &str) -> Result<(), git2::Error> {
    let refname = format!("refs/heads/{name}");
    let object = repo.revparse_single(&refname)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(&object, Some(&mut checkout))?;
    repo.set_head(&refname)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();
        let parents: Vec<_> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    fn upstream(dir: &TempDir) -> (Repository, PathBuf) {
        let path = dir.path().join("upstream");
        let repo = Repository::init(&path).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        commit_file(&repo, "README.md", "hello", "initial");
        (repo, path)
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn clones_fresh_repository() {
        let dir = TempDir::new().unwrap();
        let (_upstream, upstream_path) = upstream(&dir);
        let local = dir.path().join("local");

        let outcome = mirror(&file_url(&upstream_path), &local, false, 0).unwrap();
        assert_eq!(outcome.default_branch, "main");
        assert!(local.join("README.md").exists());
    }

    #[test]
    fn second_pass_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (_upstream, upstream_path) = upstream(&dir);
        let local = dir.path().join("local");
        let url = file_url(&upstream_path);

        mirror(&url, &local, false, 0).unwrap();
        let second = mirror(&url, &local, false, 0).unwrap();
        assert!(!second.updated);
    }

    #[test]
    fn fast_forwards_after_upstream_commit() {
        let dir = TempDir::new().unwrap();
        let (upstream_repo, upstream_path) = upstream(&dir);
        let local = dir.path().join("local");
        let url = file_url(&upstream_path);

        mirror(&url, &local, false, 0).unwrap();
        commit_file(&upstream_repo, "CHANGES.md", "more", "second");

        let outcome = mirror(&url, &local, false, 0).unwrap();
        assert!(outcome.updated);
        assert!(local.join("CHANGES.md").exists());
    }

    #[test]
    fn creates_local_branch_for_new_remote_branch() {
        let dir = TempDir::new().unwrap();
        let (upstream_repo, upstream_path) = upstream(&dir);
        let local = dir.path().join("local");
        let url = file_url(&upstream_path);

        mirror(&url, &local, true, 0).unwrap();

        let head = upstream_repo.head().unwrap().peel_to_commit().unwrap();
        upstream_repo.branch("feature", &head, false).unwrap();
        upstream_repo.set_head("refs/heads/feature").unwrap();
        commit_file(&upstream_repo, "feature.txt", "wip", "feature work");
        upstream_repo.set_head("refs/heads/main").unwrap();
        upstream_repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .unwrap();

        let outcome = mirror(&url, &local, true, 0).unwrap();
        assert!(outcome.updated);
        assert_eq!(outcome.default_branch, "main");

        let feature_tip = upstream_repo
            .find_branch("feature", BranchType::Local)
            .unwrap()
            .get()
            .target()
            .unwrap();
        let main_tip = upstream_repo
            .find_branch("main", BranchType::Local)
            .unwrap()
            .get()
            .target()
            .unwrap();

        let mirrored = Repository::open(&local).unwrap();
        let mirrored_feature = mirrored
            .find_branch("feature", BranchType::Local)
            .unwrap()
            .get()
            .target()
            .unwrap();
        // The new branch lands at the remote tip, not wherever HEAD was.
        assert_eq!(mirrored_feature, feature_tip);
        assert_ne!(mirrored_feature, main_tip);
        // Default branch stays checked out.
        assert_eq!(mirrored.head().unwrap().shorthand(), Some("main"));
    }
}

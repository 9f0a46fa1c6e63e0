//! End-to-end flow over local fixtures: mirror a repository, archive the
//! tree, fan it out to a filesystem target, and clean up.

use std::path::Path;

use flate2::read::GzDecoder;
use git2::{Repository, Signature};
use tar::Archive;
use tempfile::TempDir;

use remora::config::{StorageConfig, StorageKind};
use remora::storage;
use remora::sync::{publish, Target};
use remora::workdir::Workdir;
use remora::{archive, git};

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

fn upstream(dir: &Path) -> (Repository, String) {
    let path = dir.join("upstream");
    let repo = Repository::init(&path).unwrap();
    repo.set_head("refs/heads/main").unwrap();
    commit_file(&repo, "README.md", "hello", "initial");
    let url = format!("file://{}", path.display());
    (repo, url)
}

async fn file_target(root: &Path) -> Target {
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
async fn mirror_archive_publish_cleanup() {
    let fixture = TempDir::new().unwrap();
    let (_upstream, url) = upstream(fixture.path());
    let store_root = fixture.path().join("store");
    let target = file_target(&store_root).await;

    let workdir = Workdir::create_in(fixture.path(), false).unwrap();
    let base = workdir.path().join("local/owner/demo");
    let gitdir = base.join("code");

    let outcome = git::mirror(&url, &gitdir, false, 0).unwrap();
    assert!(outcome.updated);

    let bytes = archive::pack_dir(&base, "code", "demo").unwrap();
    let key = format!("local/owner/demo/{}", archive::snapshot_name("demo"));
    publish(&[target], &key, &bytes).await.unwrap();

    let stored = store_root.join("local/owner/demo/demo.tar.gz");
    assert!(stored.exists());

    // The archive's top-level entry is the repository name, regardless of
    // the on-disk directory name.
    let mut entries = Vec::new();
    let mut tar = Archive::new(GzDecoder::new(std::fs::File::open(&stored).unwrap()));
    for entry in tar.entries().unwrap() {
        let entry = entry.unwrap();
        entries.push(entry.path().unwrap().to_string_lossy().into_owned());
    }
    assert!(entries.iter().any(|p| p.starts_with("demo/")));
    assert!(entries.iter().any(|p| p == "demo/README.md"));

    let workpath = workdir.path().to_path_buf();
    workdir.cleanup().unwrap();
    assert!(!workpath.exists());
}

#[tokio::test]
async fn unchanged_mirror_publishes_nothing() {
    let fixture = TempDir::new().unwrap();
    let (_upstream, url) = upstream(fixture.path());
    let store_root = fixture.path().join("store");
    let target = file_target(&store_root).await;

    // Cached working directory so the second pass sees the first clone.
    let workdir = Workdir::create_in(fixture.path(), true).unwrap();
    let gitdir = workdir.path().join("local/owner/demo/code");

    let first = git::mirror(&url, &gitdir, false, 0).unwrap();
    assert!(first.updated);

    let second = git::mirror(&url, &gitdir, false, 0).unwrap();
    assert!(!second.updated);

    // The engine only archives and publishes on updates, so after a no-op
    // pass the store must still be empty.
    if second.updated {
        let base = workdir.path().join("local/owner/demo");
        let bytes = archive::pack_dir(&base, "code", "demo").unwrap();
        publish(&[target], "local/owner/demo/demo.tar.gz", &bytes)
            .await
            .unwrap();
    }
    assert!(!store_root.join("local/owner/demo/demo.tar.gz").exists());
}

#[tokio::test]
async fn failed_mirror_leaves_no_disposable_workdir() {
    let fixture = TempDir::new().unwrap();
    let missing = format!("file://{}", fixture.path().join("nonexistent").display());

    {
        let workdir = Workdir::create_in(fixture.path(), false).unwrap();
        let gitdir = workdir.path().join("local/owner/demo/code");
        assert!(git::mirror(&missing, &gitdir, false, 0).is_err());
        // Dropped without cleanup(), as the engine's error path does.
    }

    let leftovers: Vec<_> = match std::fs::read_dir(fixture.path().join(".remora")) {
        Ok(entries) => entries.collect(),
        Err(_) => Vec::new(),
    };
    assert!(leftovers.is_empty(), "disposable workdir leaked: {leftovers:?}");
}

#[tokio::test]
async fn upstream_commit_flows_into_a_fresh_snapshot() {
    let fixture = TempDir::new().unwrap();
    let (upstream_repo, url) = upstream(fixture.path());

    let workdir = Workdir::create_in(fixture.path(), true).unwrap();
    let gitdir = workdir.path().join("local/owner/demo/code");

    git::mirror(&url, &gitdir, false, 0).unwrap();
    commit_file(&upstream_repo, "CHANGES.md", "news", "second");

    let outcome = git::mirror(&url, &gitdir, false, 0).unwrap();
    assert!(outcome.updated);
    assert!(gitdir.join("CHANGES.md").exists());
}

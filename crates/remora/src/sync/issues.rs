//! Issue mirroring.
//!
//! Issues are rendered to one markdown file per issue (`#<n>.md`) carrying a
//! durable `- Updated Time:` marker. The highest marker across the existing
//! files is the watermark for the next incremental fetch; an empty directory
//! means everything is fetched.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use super::{publish, SyncError, Target};
use crate::archive;
use crate::config::RepoConfig;
use crate::github::{GitHub, IssueRecord};
use crate::identity::RemoteIdentity;
use crate::watermark;
use crate::workdir::Workdir;

const ISSUES_DIR: &str = "issues";

/// Fetch issues updated since the last run and publish
/// `<host/owner/name>/issues.tar.gz` when anything changed.
pub async fn sync_issues(
    github: &GitHub,
    repo: &RepoConfig,
    targets: &[Target],
) -> Result<(), SyncError> {
    sync_issues_in(&std::env::current_dir()?, github, repo, targets).await
}

/// Same as [`sync_issues`], rooted at an explicit directory.
pub async fn sync_issues_in(
    root: &Path,
    github: &GitHub,
    repo: &RepoConfig,
    targets: &[Target],
) -> Result<(), SyncError> {
    let identity = RemoteIdentity::parse(&repo.url)?;
    let workdir = Workdir::create_in(root, repo.use_cache)?;

    let base = workdir
        .path()
        .join(&identity.host)
        .join(&identity.owner)
        .join(&identity.name);
    let dir = base.join(ISSUES_DIR);
    fs::create_dir_all(&dir)?;

    let mark = watermark::scan_dir(&dir)?;
    info!(repo = %repo.name, watermark = %watermark::format_time(mark), "fetching updated issues");
    let records = github
        .issues_updated_after(&identity.owner, &identity.name, mark)
        .await?;

    if records.is_empty() {
        info!(repo = %repo.name, "issues up to date, nothing to publish");
        workdir.cleanup()?;
        return Ok(());
    }

    for record in &records {
        let path = dir.join(format!("#{}.md", record.number));
        fs::write(&path, render_issue(record))?;
    }
    info!(repo = %repo.name, count = records.len(), "issues written");

    let bytes = archive::pack_dir(&base, ISSUES_DIR, ISSUES_DIR)?;
    let key = format!(
        "{}/{}",
        identity.prefix(),
        archive::snapshot_name(ISSUES_DIR)
    );
    publish(targets, &key, &bytes).await?;

    workdir.cleanup()?;
    Ok(())
}

/// Markdown rendition of one issue and its comments.
fn render_issue(issue: &IssueRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Issue #{}: {}\n", issue.number, issue.title);
    out.push_str("## Basic Information\n\n");
    let _ = writeln!(out, "- Created Time: {}", watermark::format_time(issue.created_at));
    let _ = writeln!(out, "- Updated Time: {}", watermark::format_time(issue.updated_at));
    let _ = writeln!(out, "- State: {}", issue.state);
    let _ = writeln!(out, "- Author: {}", issue.author);
    let _ = writeln!(out, "- Comment Count: {}\n", issue.comments.len());

    out.push_str("## Content\n\n");
    out.push_str(&issue.body);
    out.push_str("\n\n");

    if !issue.comments.is_empty() {
        out.push_str("## Comments\n\n");
        for comment in &issue.comments {
            let _ = writeln!(out, "### Comment #{}\n", comment.id);
            let _ = writeln!(out, "- Author: {}", comment.author);
            let _ = writeln!(out, "- Created Time: {}", watermark::format_time(comment.created_at));
            let _ = writeln!(out, "- Updated Time: {}\n", watermark::format_time(comment.updated_at));
            out.push_str("- Content:\n\n");
            out.push_str(&comment.body);
            out.push_str("\n\n---\n\n");
        }
    }
    out
}

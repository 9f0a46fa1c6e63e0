//! Discussion mirroring.
//!
//! Discussions land as `<n>.md` files inside a `discussion/` directory, one
//! file per discussion, with bodies fenced so user content can't be mistaken
//! for the metadata lines. Incremental behavior mirrors the issue facet: the
//! `- Updated Time:` marker in each file feeds the watermark.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::info;

use super::{publish, SyncError, Target};
use crate::archive;
use crate::config::RepoConfig;
use crate::github::discussions::Discussion;
use crate::github::GitHub;
use crate::identity::RemoteIdentity;
use crate::watermark;
use crate::workdir::Workdir;

const DISCUSSION_DIR: &str = "discussion";
const ARCHIVE_NAME: &str = "discussions";

/// Fetch discussions updated since the last run and publish
/// `<host/owner/name>/discussions.tar.gz` when anything changed.
pub async fn sync_discussions(
    github: &GitHub,
    repo: &RepoConfig,
    targets: &[Target],
) -> Result<(), SyncError> {
    sync_discussions_in(&std::env::current_dir()?, github, repo, targets).await
}

/// Same as [`sync_discussions`], rooted at an explicit directory.
pub async fn sync_discussions_in(
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
    let dir = base.join(DISCUSSION_DIR);
    fs::create_dir_all(&dir)?;

    let mark = watermark::scan_dir(&dir)?;
    info!(repo = %repo.name, watermark = %watermark::format_time(mark), "fetching updated discussions");
    let discussions = github
        .discussions_updated_after(&identity.owner, &identity.name, mark)
        .await?;

    if discussions.is_empty() {
        info!(repo = %repo.name, "discussions up to date, nothing to publish");
        workdir.cleanup()?;
        return Ok(());
    }

    for discussion in &discussions {
        let path = dir.join(format!("{}.md", discussion.number));
        fs::write(&path, render_discussion(discussion))?;
    }
    info!(repo = %repo.name, count = discussions.len(), "discussions written");

    let bytes = archive::pack_dir(&base, DISCUSSION_DIR, DISCUSSION_DIR)?;
    let key = format!(
        "{}/{}",
        identity.prefix(),
        archive::snapshot_name(ARCHIVE_NAME)
    );
    publish(targets, &key, &bytes).await?;

    workdir.cleanup()?;
    Ok(())
}

fn fenced(body: &str) -> String {
    format!("```\n{body}\n```\n\n")
}

/// Markdown rendition of one discussion with comments and replies.
fn render_discussion(discussion: &Discussion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Discussion: {}\n", discussion.title);
    out.push_str("## Basic Information\n\n");
    let _ = writeln!(out, "- Created Time: {}", watermark::format_time(discussion.created_at));
    let _ = writeln!(out, "- Updated Time: {}", watermark::format_time(discussion.updated_at));
    let _ = writeln!(out, "- Category: {}", discussion.category);
    let _ = writeln!(out, "- Author: {}", discussion.author);
    let _ = writeln!(out, "- Comment Count: {}\n", discussion.comments.len());

    out.push_str("## Content\n\n");
    out.push_str(&fenced(&discussion.body));

    if !discussion.comments.is_empty() {
        out.push_str("## Comments\n\n");
        for comment in &discussion.comments {
            let _ = writeln!(out, "### Comment #{}\n", comment.id);
            out.push_str(&fenced(&comment.body));
            let _ = writeln!(out, "- Author: {}", comment.author);
            let _ = writeln!(out, "- Created Time: {}", watermark::format_time(comment.created_at));
            let _ = writeln!(out, "- Updated Time: {}\n", watermark::format_time(comment.updated_at));
            out.push_str("---\n\n");

            for reply in &comment.replies {
                let _ = writeln!(out, "#### Reply #{}\n", reply.id);
                out.push_str(&fenced(&reply.body));
                let _ = writeln!(out, "- Author: {}", reply.author);
                let _ = writeln!(out, "- Created Time: {}", watermark::format_time(reply.created_at));
                let _ = writeln!(out, "- Updated Time: {}\n", watermark::format_time(reply.updated_at));
                out.push_str("---\n\n");
            }
        }
    }
    out
}

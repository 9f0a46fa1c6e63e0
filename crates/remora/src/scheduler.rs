//! Cron daemon.
//!
//! One tokio task per scheduled repository. Each task sleeps until its next
//! cron fire time, then waits for a semaphore permit before running, so at
//! most the configured number of syncs run at once while late jobs queue up
//! instead of being dropped. A failed run is logged and the loop continues
//! with the next fire time.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Local;
use cron::Schedule;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::{Config, RepoConfig, StorageConfig};
use crate::github::{GitHub, GitHubError};
use crate::sync::{self, SyncError};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid cron expression {expr:?}: {source}")]
    Cron {
        expr: String,
        source: cron::error::Error,
    },

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Accept the common five-field cron dialect by prepending a seconds field.
fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Run one full sync of a repository: expand the descriptor, then mirror
/// every enabled facet of each concrete repository in order.
pub async fn run_once(
    repo: &RepoConfig,
    github: &GitHub,
    storages: &HashMap<String, StorageConfig>,
    num_limit: i64,
    size_limit: i64,
) -> Result<(), SyncError> {
    for concrete in sync::expand(github, repo).await? {
        let targets = sync::open_targets(&concrete, storages, &[]).await?;
        sync::code::sync_code(&concrete, &targets).await?;
        if concrete.download_wiki {
            sync::code::sync_wiki(&concrete, &targets).await?;
        }
        if concrete.download_issues {
            sync::issues::sync_issues(github, &concrete, &targets).await?;
        }
        if concrete.download_discussion {
            sync::discussions::sync_discussions(github, &concrete, &targets).await?;
        }
        if concrete.download_releases {
            sync::releases::sync_releases(github, &concrete, &targets, num_limit, size_limit)
                .await?;
        }
    }
    Ok(())
}

/// Run the daemon until every repository loop finishes (in practice: until
/// the process is stopped, since cron schedules have no end).
pub async fn run(cfg: Config) -> Result<(), DaemonError> {
    let github = Arc::new(GitHub::new(&cfg.github_token)?);
    let semaphore = Arc::new(Semaphore::new(cfg.concurrency()));
    let storages = Arc::new(cfg.storage_map());
    let num_limit = cfg.release_num_limit();
    let size_limit = cfg.release_size_limit();

    let mut handles = Vec::new();
    for repo in cfg.repository.iter().filter(|r| !r.cron.is_empty()) {
        let schedule =
            Schedule::from_str(&normalize_cron(&repo.cron)).map_err(|source| DaemonError::Cron {
                expr: repo.cron.clone(),
                source,
            })?;
        info!(repo = %repo.name, cron = %repo.cron, "scheduled");

        let repo = repo.clone();
        let github = Arc::clone(&github);
        let semaphore = Arc::clone(&semaphore);
        let storages = Arc::clone(&storages);
        handles.push(tokio::spawn(async move {
            repo_loop(repo, schedule, github, semaphore, storages, num_limit, size_limit).await;
        }));
    }
    info!(jobs = handles.len(), "daemon started");

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn repo_loop(
    repo: RepoConfig,
    schedule: Schedule,
    github: Arc<GitHub>,
    semaphore: Arc<Semaphore>,
    storages: Arc<HashMap<String, StorageConfig>>,
    num_limit: i64,
    size_limit: i64,
) {
    loop {
        let Some(next) = schedule.upcoming(Local).next() else {
            info!(repo = %repo.name, "schedule exhausted");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or_default();
        info!(repo = %repo.name, at = %next, "next run scheduled");
        tokio::time::sleep(wait).await;

        let Ok(_permit) = semaphore.acquire().await else {
            return;
        };
        info!(repo = %repo.name, "starting scheduled sync");
        if let Err(e) = run_once(&repo, &github, &storages, num_limit, size_limit).await {
            error!(repo = %repo.name, error = %e, "scheduled sync failed");
        }
    }
}

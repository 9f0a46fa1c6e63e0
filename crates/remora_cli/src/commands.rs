//! Command handlers.
//!
//! A per-repository failure is reported and the loop moves on to the next
//! repository; only setup problems (unreadable config, no matching repo)
//! abort the whole command.

use anyhow::{bail, Result};
use console::style;
use tracing::error;

use remora::config::{Config, RepoConfig};
use remora::github::GitHub;
use remora::{scheduler, sync};

use crate::SyncArgs;

/// Which facet of the repositories an on-demand command mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Code,
    Wiki,
    Issues,
    Discussions,
    Releases,
    Dump,
}

pub async fn run_facet(cfg: Config, args: SyncArgs, facet: Facet) -> Result<()> {
    let github = GitHub::new(&cfg.github_token)?;
    let storages = cfg.storage_map();
    let overrides: Vec<String> = args.storage.into_iter().collect();
    let num_limit = cfg.release_num_limit();
    let size_limit = cfg.release_size_limit();

    let selected: Vec<&RepoConfig> = cfg
        .repository
        .iter()
        .filter(|r| args.name.as_deref().map_or(true, |n| r.name == n))
        .collect();
    if selected.is_empty() {
        match args.name {
            Some(name) => bail!("repository {name:?} not found in config"),
            None => bail!("no repositories configured"),
        }
    }

    for repo in selected {
        let expanded = match sync::expand(&github, repo).await {
            Ok(expanded) => expanded,
            Err(e) => {
                error!(repo = %repo.name, error = %e, "descriptor expansion failed");
                eprintln!("{} {}: {e}", style("error").red().bold(), repo.name);
                continue;
            }
        };
        for concrete in expanded {
            println!("{} {}", style("syncing").green().bold(), concrete.name);
            let outcome = sync_one(&github, &concrete, &storages, &overrides, facet, num_limit, size_limit).await;
            match outcome {
                Ok(()) => println!("{} {}", style("done").green(), concrete.name),
                Err(e) => {
                    error!(repo = %concrete.name, error = %e, "sync failed");
                    eprintln!("{} {}: {e}", style("error").red().bold(), concrete.name);
                }
            }
        }
    }
    Ok(())
}

async fn sync_one(
    github: &GitHub,
    repo: &RepoConfig,
    storages: &std::collections::HashMap<String, remora::config::StorageConfig>,
    overrides: &[String],
    facet: Facet,
    num_limit: i64,
    size_limit: i64,
) -> Result<(), sync::SyncError> {
    let targets = sync::open_targets(repo, storages, overrides).await?;
    match facet {
        Facet::Code => sync::code::sync_code(repo, &targets).await,
        Facet::Wiki => sync::code::sync_wiki(repo, &targets).await,
        Facet::Issues => sync::issues::sync_issues(github, repo, &targets).await,
        Facet::Discussions => sync::discussions::sync_discussions(github, repo, &targets).await,
        Facet::Releases => {
            sync::releases::sync_releases(github, repo, &targets, num_limit, size_limit).await
        }
        Facet::Dump => sync::dump::dump(repo, &targets).await,
    }
}

pub async fn daemon(cfg: Config) -> Result<()> {
    println!("{}", style("starting daemon").green().bold());
    scheduler::run(cfg).await?;
    Ok(())
}

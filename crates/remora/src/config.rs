//! Configuration descriptors.
//!
//! Configuration is a YAML document listing repositories and named storage
//! backends, loaded with the `config` crate. Environment variables prefixed
//! with `REMORA_` override file values (most usefully `REMORA_GITHUBTOKEN`).
//!
//! Example:
//! ```yaml
//! githubToken: ghp_...
//! concurrencyNum: 3
//! releaseNumLimit: 3
//! releaseSizeLimit: 300000000
//! repository:
//!   - name: rust
//!     url: github.com/rust-lang/rust
//!     cron: "0 3 * * *"
//!     storage: [local]
//!     allBranches: true
//!     downloadReleases: true
//! storage:
//!   - name: local
//!     type: file
//!     path: ./backups
//! ```

use std::collections::HashMap;
use std::path::Path;

use config::{Config as Loader, Environment, File, FileFormat};
use serde::Deserialize;

/// Default number of concurrently running scheduled jobs.
const DEFAULT_CONCURRENCY: u32 = 3;
/// Default number of releases kept per repository.
const DEFAULT_RELEASE_NUM_LIMIT: i64 = 3;
/// Default cumulative release asset budget in bytes (300 MB).
const DEFAULT_RELEASE_SIZE_LIMIT: i64 = 300_000_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Repositories to mirror.
    pub repository: Vec<RepoConfig>,
    /// Named storage backends that repositories may publish to.
    pub storage: Vec<StorageConfig>,
    /// GitHub access token, also settable via `REMORA_GITHUBTOKEN`.
    #[serde(alias = "githubtoken")]
    pub github_token: String,
    /// Maximum scheduled jobs running at once; 0 means the default (3).
    #[serde(alias = "concurrencynum")]
    pub concurrency_num: u32,
    /// Cumulative release asset byte budget; 0 means the default (300 MB),
    /// negative means unbounded.
    pub release_size_limit: i64,
    /// Number of releases retained; 0 means the default (3), negative means
    /// unbounded.
    pub release_num_limit: i64,
}

impl Config {
    /// Load configuration from a YAML file, with `REMORA_*` environment
    /// overrides layered on top.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        Loader::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Yaml))
            .add_source(Environment::with_prefix("REMORA"))
            .build()?
            .try_deserialize()
    }

    pub fn concurrency(&self) -> usize {
        if self.concurrency_num == 0 {
            DEFAULT_CONCURRENCY as usize
        } else {
            self.concurrency_num as usize
        }
    }

    pub fn release_num_limit(&self) -> i64 {
        if self.release_num_limit == 0 {
            DEFAULT_RELEASE_NUM_LIMIT
        } else {
            self.release_num_limit
        }
    }

    pub fn release_size_limit(&self) -> i64 {
        if self.release_size_limit == 0 {
            DEFAULT_RELEASE_SIZE_LIMIT
        } else {
            self.release_size_limit
        }
    }

    /// Storage descriptors indexed by name.
    pub fn storage_map(&self) -> HashMap<String, StorageConfig> {
        self.storage
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect()
    }
}

/// What a repository descriptor names: a single repository, or an account
/// whose repositories are enumerated before syncing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Repo,
    User,
    Org,
}

/// One repository (or account) to mirror. Immutable once loaded; one
/// instance drives one sync run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepoConfig {
    pub name: String,
    pub url: String,
    /// Cron expression; empty disables scheduling for this repository.
    pub cron: String,
    /// Names of storage backends to publish to.
    pub storage: Vec<String>,
    /// Reuse a stable working directory across runs.
    pub use_cache: bool,
    #[serde(rename = "type")]
    pub kind: RepoKind,
    /// Account to enumerate when `kind` is `user` or `org`.
    pub org_name: String,
    /// Mirror every remote branch instead of just the default branch.
    pub all_branches: bool,
    /// Clone/pull depth; 0 keeps full history.
    pub depth: i32,
    pub download_releases: bool,
    pub download_issues: bool,
    pub download_wiki: bool,
    pub download_discussion: bool,
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    S3,
}

/// A named storage backend instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StorageKind,
    /// Backend root: a directory for `file` (relative paths resolve against
    /// the process working directory), a key prefix for `s3`.
    pub path: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

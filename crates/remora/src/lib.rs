//! Remora - a repository mirroring and retention engine.
//!
//! This library mirrors remote GitHub repositories into one or more storage
//! backends: code and wiki trees as git mirrors, issues and discussions as
//! markdown snapshots, release assets with count/size retention, all packed
//! into gzip tarballs and fanned out to filesystem or S3-compatible targets.
//! Runs are incremental (a durable update marker in the mirrored files acts
//! as the watermark) and idempotent, so a failed run is simply rerun.
//!
//! # Example
//!
//! ```ignore
//! use remora::{config::Config, github::GitHub, sync};
//!
//! let cfg = Config::load(Path::new("config.yaml"))?;
//! let github = GitHub::new(&cfg.github_token)?;
//! let repo = &cfg.repository[0];
//! let targets = sync::open_targets(repo, &cfg.storage_map(), &[]).await?;
//! sync::code::sync_code(repo, &targets).await?;
//! ```

pub mod archive;
pub mod config;
pub mod git;
pub mod github;
pub mod identity;
pub mod retention;
pub mod scheduler;
pub mod storage;
pub mod sync;
pub mod watermark;
pub mod workdir;

pub use config::Config;
pub use github::{GitHub, GitHubError};
pub use identity::{IdentityError, RemoteIdentity};
pub use storage::{ObjectStore, StorageError};
pub use sync::SyncError;

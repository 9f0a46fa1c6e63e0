//! Directory archiving.
//!
//! Folds a directory tree into a single gzip-compressed tarball, read from
//! an explicit base directory. Nothing here touches the process working
//! directory, so concurrent syncs in one process cannot race on it.
//!
//! Naming policy: code/wiki/item snapshots use fixed names (each snapshot
//! fully supersedes the previous one), while standalone full-repository
//! dumps embed a timestamp so successive runs accumulate distinct archives.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

/// Pack `base/source` into a gzip tarball whose entries live under
/// `entry_name/`.
pub fn pack_dir(base: &Path, source: &str, entry_name: &str) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(entry_name, base.join(source))?;
    let encoder = builder.into_inner()?;
    encoder.finish()
}

/// Fixed archive name for a superseding snapshot.
pub fn snapshot_name(name: &str) -> String {
    format!("{name}.tar.gz")
}

/// Timestamped archive name for a standalone full dump.
pub fn dump_name(name: &str, now: DateTime<Utc>) -> String {
    format!("{name}-{}.tar.gz", now.format("%Y%m%d%H%M%S"))
}

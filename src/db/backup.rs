//! Pre-migration snapshotting.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

/// Why no backup was taken. Distinct from an I/O failure, which is
/// propagated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupSkipReason {
    FreshDatabase,
    AlreadyCurrent,
    SourceNotFound,
    BackupExists,
}

impl BackupSkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FreshDatabase => "fresh_database",
            Self::AlreadyCurrent => "already_current",
            Self::SourceNotFound => "source_not_found",
            Self::BackupExists => "backup_exists",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub created: Option<PathBuf>,
    pub skipped: Option<BackupSkipReason>,
}

/// Default number of `pre-migrate-v*` snapshots retained per database.
pub const DEFAULT_RETENTION: usize = 5;

fn backup_path(db_path: &Path, version: i64) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(format!(".pre-migrate-v{version}"));
    PathBuf::from(name)
}

/// Snapshot `db_path` (plus `-wal`/`-shm` companions) to
/// `<db_path>.pre-migrate-v<current_version>` before migrating, unless a
/// skip condition applies.
pub fn maybe_backup(
    db_path: &Path,
    current_version: i64,
    target_version: i64,
    retention: usize,
) -> std::io::Result<BackupOutcome> {
    if current_version == 0 {
        return Ok(BackupOutcome {
            created: None,
            skipped: Some(BackupSkipReason::FreshDatabase),
        });
    }
    if current_version >= target_version {
        return Ok(BackupOutcome {
            created: None,
            skipped: Some(BackupSkipReason::AlreadyCurrent),
        });
    }
    if !db_path.exists() {
        return Ok(BackupOutcome {
            created: None,
            skipped: Some(BackupSkipReason::SourceNotFound),
        });
    }

    let dest = backup_path(db_path, current_version);
    if dest.exists() {
        // The pristine earliest copy is preserved; never overwrite.
        return Ok(BackupOutcome {
            created: None,
            skipped: Some(BackupSkipReason::BackupExists),
        });
    }

    fs::copy(db_path, &dest)?;
    for suffix in ["-wal", "-shm"] {
        let companion_src = companion_path(db_path, suffix);
        if companion_src.exists() {
            fs::copy(&companion_src, companion_path(&dest, suffix))?;
        }
    }

    info!(path = %dest.display(), "pre-migration backup created");
    enforce_retention(db_path, retention)?;

    Ok(BackupOutcome {
        created: Some(dest),
        skipped: None,
    })
}

fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Keep the `retention` most recent `pre-migrate-v*` snapshots for
/// `db_path`, deleting older ones.
fn enforce_retention(db_path: &Path, retention: usize) -> std::io::Result<()> {
    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = db_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = format!("{stem}.pre-migrate-v");

    let mut snapshots: Vec<(i64, PathBuf)> = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(version_str) = name.strip_prefix(&prefix) {
                if let Ok(version) = version_str.parse::<i64>() {
                    snapshots.push((version, entry.path()));
                }
            }
        }
    }

    snapshots.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in snapshots.into_iter().skip(retention) {
        fs::remove_file(&path)?;
        for suffix in ["-wal", "-shm"] {
            let companion = companion_path(&path, suffix);
            if companion.exists() {
                fs::remove_file(&companion)?;
            }
        }
        info!(path = %path.display(), "pruned old pre-migration backup");
    }

    Ok(())
}

//! Moves the node's on-disk databases aside before a risky container
//! replacement, and moves them back when the replacement fails.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::config::WatcherConfig;
use crate::errors::WatcherError;

/// Databases moved aside during an upgrade, relative to the base storage
/// directory: one entry per logical database per chain variant.
const MIGRATED_DATABASES: [&str; 4] = [
    "data/blocks.leveldb",
    "data/index.leveldb",
    "data-test/blocks.leveldb",
    "data-test/index.leveldb",
];

/// Renames the database set to its backup form before a replacement and
/// reverses the rename when the replacement fails. The guard keeps no
/// record of which renames ran; restore simply re-attempts the full
/// inverse set.
pub struct MigrationGuard {
    base_dir: PathBuf,
    suffix: String,
}

impl MigrationGuard {
    pub fn new(base_dir: PathBuf, suffix: &str) -> Self {
        Self {
            base_dir,
            suffix: suffix.to_string(),
        }
    }

    /// Guard for the configured storage directory. Fails with a
    /// configuration error when no directory is set.
    pub fn for_config(config: &WatcherConfig) -> Result<MigrationGuard, WatcherError> {
        Ok(MigrationGuard::new(
            config.require_base_dir()?.to_path_buf(),
            &config.backup_suffix,
        ))
    }

    fn entries(&self) -> impl Iterator<Item = (PathBuf, PathBuf)> + '_ {
        MIGRATED_DATABASES.iter().map(move |relative| {
            let canonical = self.base_dir.join(relative);
            let backup = backup_path(&canonical, &self.suffix);
            (canonical, backup)
        })
    }

    /// Rename every present database to its backup form. Absent entries
    /// are skipped; the first rename failure aborts with that entry's
    /// error.
    pub async fn migrate(&self) -> Result<(), WatcherError> {
        for (canonical, backup) in self.entries() {
            if !fs::try_exists(&canonical).await.unwrap_or(false) {
                log::debug!("database {} absent, skipped", canonical.display());
                continue;
            }
            fs::rename(&canonical, &backup)
                .await
                .map_err(|source| WatcherError::DatabaseRename {
                    path: canonical.clone(),
                    source,
                })?;
            log::info!(
                "database {} moved to {}",
                canonical.display(),
                backup.display()
            );
        }
        Ok(())
    }

    /// Undo `migrate` for every entry, whether or not its forward rename
    /// ran; a missing backup is not a failure, which makes restore safe
    /// against partially applied migrations. Real failures are logged and
    /// not retried; the last one is returned.
    pub async fn restore(&self) -> Result<(), WatcherError> {
        let mut failure = None;
        for (canonical, backup) in self.entries() {
            match fs::rename(&backup, &canonical).await {
                Ok(()) => log::info!("database {} restored", canonical.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    log::debug!("database {} has no backup to restore", canonical.display());
                }
                Err(source) => {
                    log::error!("database {} restore failed: {}", backup.display(), source);
                    failure = Some(WatcherError::DatabaseRename {
                        path: backup.clone(),
                        source,
                    });
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

//! Point-in-time archives of the server save directory.
//!
//! Archive names are `{version}_{base}_{YYYYMMDDHHMMSS}.tar.gz`. The timestamp
//! is fixed-width and zero-padded, so sorting names lexicographically in
//! descending order yields newest-first. The backup directory is the only
//! record of what exists.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};
use tracing::{debug, info, warn};

use crate::config::BackupConfig;
use crate::error::{AdminError, Result};

pub const UNKNOWN_VERSION: &str = "vx.x.x.x";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const ARCHIVE_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub version: String,
    pub base_name: String,
    pub timestamp: NaiveDateTime,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Number of entries listed when the archive was verified
    pub entries: usize,
}

impl BackupRecord {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Archive the whole save directory and verify the result on disk.
    async fn create(&self, version: &str) -> Result<BackupRecord>;

    /// Keep the `keep` lexicographically greatest entries, delete the rest.
    /// Returns the removed paths.
    async fn prune(&self, keep: usize) -> Result<Vec<PathBuf>>;
}

/// Version label from the server's welcome text, e.g.
/// `Welcome to Pal Server[v0.1.4.1] My Server` gives `v0.1.4.1`.
pub fn extract_version(info_text: &str) -> String {
    let Some(open) = info_text.find('[') else {
        return UNKNOWN_VERSION.to_string();
    };
    let rest = &info_text[open + 1..];
    match rest.find(']') {
        Some(close) => {
            let version = rest[..close].trim();
            if version.is_empty() || version.contains(['/', '\\']) || version == ".." {
                UNKNOWN_VERSION.to_string()
            } else {
                version.to_string()
            }
        }
        None => UNKNOWN_VERSION.to_string(),
    }
}

pub fn backup_file_name(version: &str, base_name: &str, timestamp: &NaiveDateTime) -> String {
    format!(
        "{}_{}_{}{}",
        version,
        base_name,
        timestamp.format(TIMESTAMP_FORMAT),
        ARCHIVE_SUFFIX
    )
}

/// gzip-compressed tar archives in a flat directory.
#[derive(Debug, Clone)]
pub struct TarBackupStore {
    source_dir: PathBuf,
    backup_dir: PathBuf,
    base_name: String,
}

impl TarBackupStore {
    pub fn new(source_dir: PathBuf, backup_dir: PathBuf, base_name: impl Into<String>) -> Self {
        Self {
            source_dir,
            backup_dir,
            base_name: base_name.into(),
        }
    }

    pub fn from_config(save_dir: PathBuf, config: &BackupConfig) -> Self {
        Self::new(save_dir, config.dir.clone(), config.base_name.clone())
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// First free archive path at or after `now` that also sorts after every
    /// existing archive of the same version. Colliding names advance the
    /// timestamp by one second so the fixed-width ordering still holds.
    fn reserve_path(&self, version: &str, now: NaiveDateTime) -> (PathBuf, NaiveDateTime) {
        let mut timestamp = match self.latest_timestamp(version) {
            Some(latest) if latest >= now => latest + TimeDelta::seconds(1),
            _ => now,
        };
        loop {
            let path = self
                .backup_dir
                .join(backup_file_name(version, &self.base_name, &timestamp));
            if !path.exists() {
                return (path, timestamp);
            }
            debug!(path = %path.display(), "Backup name taken, advancing timestamp");
            timestamp += TimeDelta::seconds(1);
        }
    }

    fn latest_timestamp(&self, version: &str) -> Option<NaiveDateTime> {
        let prefix = format!("{}_{}_", version, self.base_name);
        fs::read_dir(&self.backup_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stamp = name.strip_prefix(&prefix)?.strip_suffix(ARCHIVE_SUFFIX)?;
                NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
            })
            .max()
    }

    fn create_blocking(&self, version: &str, now: NaiveDateTime) -> Result<BackupRecord> {
        fs::create_dir_all(&self.backup_dir)?;
        let (path, timestamp) = self.reserve_path(version, now);

        if let Err(e) = write_archive(&self.source_dir, &path) {
            let _ = fs::remove_file(&path);
            return Err(AdminError::BackupIo {
                path,
                reason: e.to_string(),
            });
        }

        let (size_bytes, entries) = verify_archive(&path).map_err(|e| AdminError::BackupIo {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        info!(path = %path.display(), size_bytes, entries, "Backup created");
        Ok(BackupRecord {
            version: version.to_string(),
            base_name: self.base_name.clone(),
            timestamp,
            path,
            size_bytes,
            entries,
        })
    }

    fn prune_blocking(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let mut names: Vec<String> = fs::read_dir(&self.backup_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed = Vec::new();
        for name in names.into_iter().skip(keep) {
            let path = self.backup_dir.join(&name);
            let outcome = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match outcome {
                Ok(()) => {
                    info!(path = %path.display(), "Pruned old backup");
                    removed.push(path);
                }
                Err(e) => warn!(path = %path.display(), "Failed to prune backup: {}", e),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl BackupStore for TarBackupStore {
    async fn create(&self, version: &str) -> Result<BackupRecord> {
        let store = self.clone();
        let version = version.to_string();
        let now = Local::now().naive_local();
        tokio::task::spawn_blocking(move || store.create_blocking(&version, now)).await?
    }

    async fn prune(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.prune_blocking(keep)).await?
    }
}

/// The archive is rooted at `source` itself, matching `tar -C source .`.
fn write_archive(source: &Path, target: &Path) -> std::io::Result<()> {
    if !source.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("save directory {} does not exist", source.display()),
        ));
    }
    let file = File::create(target)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(".", source)?;
    let file = builder.into_inner()?.finish()?;
    file.sync_all()
}

/// Existence plus a full listing of the archive.
fn verify_archive(path: &Path) -> std::io::Result<(u64, usize)> {
    let size = fs::metadata(path)?.len();
    let mut archive = Archive::new(GzDecoder::new(File::open(path)?));
    let mut entries = 0;
    for entry in archive.entries()? {
        entry?;
        entries += 1;
    }
    Ok((size, entries))
}

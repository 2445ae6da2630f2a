use std::path::{Path, PathBuf};

use crate::error::{AdminError, Result};

/// Flat ban list written by the game server, one identifier-suffixed line per
/// ban. Read and rewritten whole on every call.
#[derive(Debug, Clone)]
pub struct BanList {
    path: PathBuf,
}

impl BanList {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn not_found(&self) -> AdminError {
        AdminError::ResourceNotFound {
            what: "ban list",
            path: self.path.clone(),
        }
    }

    pub async fn read(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(self.not_found()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every line ending in `steam_<id>` and rewrite the file. Returns the
    /// removed lines.
    pub async fn unban(&self, steam_id: &str) -> Result<Vec<String>> {
        let content = self.read().await?;
        let suffix = format!("steam_{}", steam_id);

        let mut kept = String::with_capacity(content.len());
        let mut removed = Vec::new();
        for line in content.split_inclusive('\n') {
            if line.trim_end().ends_with(&suffix) {
                tracing::info!(line = %line.trim_end(), "Removed ban entry");
                removed.push(line.trim_end().to_string());
            } else {
                kept.push_str(line);
            }
        }

        tokio::fs::write(&self.path, kept).await?;
        Ok(removed)
    }
}

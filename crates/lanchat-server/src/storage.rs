use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};

/// Flat directory of uploaded files, one file per upload, stored under the
/// client-supplied name.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Uploads directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete a stored file. A missing file is not an error.
    pub async fn delete_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file last modified more than `retention` before `now`.
    /// Returns how many were removed.
    ///
    /// Entries that are not regular files are skipped. A file that cannot be
    /// deleted is logged and left for the next pass.
    pub async fn delete_older_than(&self, retention: Duration, now: SystemTime) -> Result<usize> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No mtime for {}: {}", path.display(), e);
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= retention {
                continue;
            }
            if let Err(e) = self.delete_file(&path).await {
                warn!("Failed to delete expired upload {}: {}", path.display(), e);
                continue;
            }
            info!("Deleted expired upload {}", path.display());
            removed += 1;
        }

        Ok(removed)
    }
}

/// Accept a bare file name only: no separators, no parent references, nothing
/// hidden.
pub fn sanitize_file_name(file_name: &str) -> Option<&str> {
    let name = file_name.trim();
    let bare = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().is_some_and(|f| f == name);
    bare.then_some(name)
}

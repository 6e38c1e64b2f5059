//! Seen-links blob kept in a local file.
//!
//! Writes go to a sibling temporary file which is then renamed over the
//! target, so a crash mid-write leaves either the old or the new blob, never
//! a partial one.

use super::BlobStore;
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "seen_links.txt".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BlobStore for FileBlobStore {
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn download(&self) -> Result<Option<String>, Box<dyn Error>> {
        match fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Seen-links file does not exist yet");
                Ok(None)
            }
            Err(e) => Err(Box::new(e)),
        }
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), bytes = body.len()))]
    async fn upload(&self, body: &str) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Replaced seen-links file");
        Ok(())
    }
}

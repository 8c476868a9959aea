use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::utils::file_extension;

/// An uploaded file written to disk for the duration of one request.
///
/// The file is removed when the guard is dropped, on every exit path.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub async fn persist(
        dir: &Path,
        original_filename: &str,
        bytes: &[u8],
    ) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let extension = file_extension(original_filename).unwrap_or_default();
        let path = dir.join(format!("{}{}", Uuid::new_v4(), extension));

        // Guard first so a partial write is still cleaned up.
        let upload = TempUpload { path };
        tokio::fs::write(&upload.path, bytes).await?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Cleaned up file: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

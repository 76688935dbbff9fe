//! Local storage for uploaded and annotated images

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Prefix of the annotated copy of an upload
pub const ANNOTATED_PREFIX: &str = "yolo_";

/// Reduce a client-supplied filename to its final path component.
///
/// Empty names (or names that are only path separators or dots) become
/// `image_{index}.jpg`.
pub fn sanitize_filename(raw: &str, index: usize) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        format!("image_{}.jpg", index)
    } else {
        name.to_string()
    }
}

pub fn annotated_filename(filename: &str) -> String {
    format!("{}{}", ANNOTATED_PREFIX, filename)
}

/// Image directory on local disk
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[cfg(test)]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Write an image, creating the directory on first use
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(filename);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "image saved");
        Ok(path)
    }

    /// Read a stored image by its bare filename
    pub async fn read(&self, filename: &str) -> AppResult<Vec<u8>> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.chars().all(|c| c == '.')
        {
            return Err(AppError::validation("filename", "Invalid image filename"));
        }

        match tokio::fs::read(self.root.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound("Image".to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

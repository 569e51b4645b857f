// Upload storage for profile images

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub struct UploadStorage {
    base_path: PathBuf,
}

impl UploadStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {e}")))?;
        Ok(())
    }

    /// Writes an upload under a fresh UUID name, keeping the original
    /// extension, and returns the stored file name.
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<String> {
        let file_name = match extension_of(original_name) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };

        self.init().await?;
        fs::write(self.base_path.join(&file_name), data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write upload: {e}")))?;

        Ok(file_name)
    }

    pub async fn delete(&self, file_name: &str) -> Result<()> {
        // Only plain names ever come out of `store`
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(AppError::BadRequest("Invalid file name".to_string()));
        }

        let path = self.base_path.join(file_name);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete upload: {e}")))?;
        }
        Ok(())
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(extension_of("me.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("weird.p$g"), None);
    }

    #[tokio::test]
    async fn stores_and_deletes_uploads() {
        let dir = std::env::temp_dir().join(format!("creatorlink-uploads-{}", Uuid::new_v4()));
        let storage = UploadStorage::new(&dir);

        let name = storage.store("avatar.jpg", b"jpeg bytes").await.unwrap();
        assert!(name.ends_with(".jpg"));
        assert_eq!(fs::read(dir.join(&name)).await.unwrap(), b"jpeg bytes");

        storage.delete(&name).await.unwrap();
        assert!(!dir.join(&name).exists());
        assert!(storage.delete("../escape.jpg").await.is_err());

        let _ = fs::remove_dir_all(&dir).await;
    }
}

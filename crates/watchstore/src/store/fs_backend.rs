use super::backend::KvBackend;
use crate::error::{Result, StoreError};
use crate::keys;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const VALUE_EXT: &str = ".json";

/// Unconstrained local store: one file per key inside a directory.
///
/// ```text
/// <root>/
/// ├── user_42_meta.json
/// ├── user_42_movies_want.json
/// └── user_42_movie_reviews.json
/// ```
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", keys::normalize(key), VALUE_EXT))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(StoreError::Io)
    }
}

#[async_trait]
impl KvBackend for FsBackend {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    async fn probe(&self) -> Result<()> {
        self.ensure_dir().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.value_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir().await?;

        // Atomic write: tmp file then rename
        let path = self.value_path(key);
        let tmp = self.root.join(format!(".{}-{}.tmp", keys::normalize(key), Uuid::new_v4()));
        fs::write(&tmp, value).await.map_err(StoreError::Io)?;
        fs::rename(&tmp, &path).await.map_err(StoreError::Io)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.value_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(StoreError::Io)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(VALUE_EXT) {
                if key.starts_with(prefix) {
                    found.push(key.to_string());
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_on_disk() {
        let temp = TempDir::new().unwrap();
        let backend = FsBackend::new(temp.path().join("store"));

        assert_eq!(backend.get("user_1_meta").await.unwrap(), None);
        backend.set("user_1_meta", r#"{"v":1}"#).await.unwrap();
        assert_eq!(
            backend.get("user_1_meta").await.unwrap().as_deref(),
            Some(r#"{"v":1}"#)
        );
        assert!(temp.path().join("store/user_1_meta.json").exists());
    }

    #[tokio::test]
    async fn test_list_keys_ignores_tmp_and_foreign_files() {
        let temp = TempDir::new().unwrap();
        let backend = FsBackend::new(temp.path());
        backend.set("user_1_a", "1").await.unwrap();
        backend.set("user_1_b", "2").await.unwrap();
        backend.set("user_2_a", "3").await.unwrap();
        std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

        assert_eq!(
            backend.list_keys("user_1_").await.unwrap(),
            vec!["user_1_a".to_string(), "user_1_b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let backend = FsBackend::new(temp.path().join("nope"));
        assert!(backend.list_keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let backend = FsBackend::new(temp.path());
        backend.remove("user_1_x").await.unwrap();
        backend.set("user_1_x", "1").await.unwrap();
        backend.remove("user_1_x").await.unwrap();
        assert_eq!(backend.get("user_1_x").await.unwrap(), None);
    }
}

//! Object store backed by a local directory (a mounted or mirrored bucket)

use super::{folder_prefix, validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Keys map to files below `root`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn ensure_parent(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let prefix = folder_prefix(prefix)?;
        let dir = self.root.join(&prefix);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&prefix, e)),
        };

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&prefix, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(&prefix, e))?;
            if file_type.is_dir() {
                children.push(format!("{}{}/", prefix, name));
            } else {
                children.push(format!("{}{}", prefix, name));
            }
        }

        children.sort();
        Ok(children)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_of(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_of(key)?;
        tokio::fs::read(&path).await.map_err(|e| StoreError::io(key, e))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_of(key)?;
        self.ensure_parent(key, &path).await?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StoreError::io(key, e))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let src_path = self.path_of(src)?;
        let dst_path = self.path_of(dst)?;
        if !tokio::fs::try_exists(&src_path)
            .await
            .map_err(|e| StoreError::io(src, e))?
        {
            return Err(StoreError::NotFound(src.to_string()));
        }
        self.ensure_parent(dst, &dst_path).await?;
        tokio::fs::copy(&src_path, &dst_path)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::io(dst, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        store
            .put("cameras/caco-01/c1/2019/347_Dec.13/raw/1576270801.c1.timex.jpg", vec![1, 2, 3])
            .await
            .unwrap();
        store
            .put("cameras/caco-01/c2/2019/347_Dec.13/raw/1576270801.c2.timex.jpg", vec![4])
            .await
            .unwrap();

        let cameras = store.list("cameras/caco-01").await.unwrap();
        assert_eq!(cameras, vec!["cameras/caco-01/c1/", "cameras/caco-01/c2/"]);

        let raw = store.list("cameras/caco-01/c1/2019/347_Dec.13/raw/").await.unwrap();
        assert_eq!(
            raw,
            vec!["cameras/caco-01/c1/2019/347_Dec.13/raw/1576270801.c1.timex.jpg"]
        );

        let data = store
            .get("cameras/caco-01/c2/2019/347_Dec.13/raw/1576270801.c2.timex.jpg")
            .await
            .unwrap();
        assert_eq!(data, vec![4]);
    }

    #[tokio::test]
    async fn test_missing_objects() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        assert!(store.list("cameras/nowhere/").await.unwrap().is_empty());
        assert!(!store.exists("cameras/nowhere/x.jpg").await.unwrap());
        assert!(matches!(
            store.get("cameras/nowhere/x.jpg").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.copy("cameras/nowhere/x.jpg", "cameras/b/x.jpg").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_creates_destination_folders() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        store.put("cameras/a/products/f.jpg", vec![9]).await.unwrap();
        store
            .copy("cameras/a/products/f.jpg", "cameras/a/c1/2019/001_Jan.01/raw/f.jpg")
            .await
            .unwrap();

        assert!(store.exists("cameras/a/c1/2019/001_Jan.01/raw/f.jpg").await.unwrap());
        assert!(store.exists("cameras/a/products/f.jpg").await.unwrap());
        assert!(!store.exists("cameras/a/c1/2019").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path());

        assert!(matches!(
            store.put("../outside.jpg", vec![]).await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}

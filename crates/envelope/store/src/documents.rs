//! Storage collaborator: `get(key) -> bytes`, `put(bytes, key, content_type)`.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use dashmap::DashMap;
use envelope_types::DocumentKey;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Where a stored object can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub key: DocumentKey,
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> StorageResult<Vec<u8>>;

    /// Write `bytes` under `key`, replacing any previous object.
    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &DocumentKey,
        content_type: &str,
    ) -> StorageResult<StoredObject>;
}

/// Keys are relative, slash-separated paths without `.` or `..` segments.
pub fn validate_key(key: &DocumentKey) -> StorageResult<()> {
    let raw = key.as_str();
    if raw.is_empty() || raw.starts_with('/') || raw.contains('\\') {
        return Err(StorageError::InvalidInput(format!(
            "invalid document key '{}'",
            raw
        )));
    }
    if raw
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidInput(format!(
            "invalid document key '{}'",
            raw
        )));
    }
    Ok(())
}

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// Process-local storage for development and tests.
pub struct InMemoryDocumentStorage {
    objects: Arc<DashMap<String, StoredBlob>>,
}

impl InMemoryDocumentStorage {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn content_type(&self, key: &DocumentKey) -> Option<String> {
        self.objects
            .get(key.as_str())
            .map(|o| o.content_type.clone())
    }
}

impl Default for InMemoryDocumentStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStorage for InMemoryDocumentStorage {
    async fn get(&self, key: &DocumentKey) -> StorageResult<Vec<u8>> {
        self.objects
            .get(key.as_str())
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(format!("document {}", key)))
    }

    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &DocumentKey,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        self.objects.insert(
            key.as_str().to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredObject {
            url: format!("memory://{}", key),
            key: key.clone(),
        })
    }
}

/// Objects stored as files below a root directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written object.
pub struct LocalDocumentStorage {
    root: PathBuf,
}

impl LocalDocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &DocumentKey) -> StorageResult<PathBuf> {
        validate_key(key)?;
        let relative = Path::new(key.as_str());
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidInput(format!(
                "invalid document key '{}'",
                key
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for LocalDocumentStorage {
    async fn get(&self, key: &DocumentKey) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("document {}", key)))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &DocumentKey,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(
            key = %key,
            size = bytes.len(),
            content_type = content_type,
            "Stored document"
        );
        Ok(StoredObject {
            url: format!("file://{}", path.display()),
            key: key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cannot_escape_root() {
        for bad in ["", "/etc/passwd", "../x", "a//b", "a/./b", "a\\b"] {
            assert!(validate_key(&DocumentKey::new(bad)).is_err(), "{}", bad);
        }
        assert!(validate_key(&DocumentKey::new("rendered/abc/def.pdf")).is_ok());
    }

    #[tokio::test]
    async fn memory_round_trip() {
        let storage = InMemoryDocumentStorage::new();
        let key = DocumentKey::new("documents/a.pdf");
        let stored = storage
            .put(b"%PDF-1.4".to_vec(), &key, "application/pdf")
            .await
            .unwrap();
        assert_eq!(stored.url, "memory://documents/a.pdf");
        assert_eq!(storage.get(&key).await.unwrap(), b"%PDF-1.4".to_vec());
        assert_eq!(
            storage.content_type(&key).as_deref(),
            Some("application/pdf")
        );
        assert!(matches!(
            storage.get(&DocumentKey::new("missing.pdf")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_storage_writes_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDocumentStorage::new(dir.path());
        let key = DocumentKey::new("rendered/env/hash.pdf");
        let stored = storage
            .put(vec![1, 2, 3], &key, "application/pdf")
            .await
            .unwrap();
        assert!(stored.url.starts_with("file://"));
        assert!(dir.path().join("rendered/env/hash.pdf").exists());
        assert!(!dir.path().join("rendered/env/hash.pdf.partial").exists());
        assert_eq!(storage.get(&key).await.unwrap(), vec![1, 2, 3]);

        // Overwrite is allowed and atomic.
        storage.put(vec![9], &key, "application/pdf").await.unwrap();
        assert_eq!(storage.get(&key).await.unwrap(), vec![9]);

        assert!(matches!(
            storage.get(&DocumentKey::new("nope.pdf")).await,
            Err(StorageError::NotFound(_))
        ));
    }
}

//! Object store: raw original-file bytes, keyed `<doc_id>/<filename>`, kept
//! independent of the metadata row so the two can be restored out of order.

use async_trait::async_trait;
use object_store::local::LocalFileSystem;
use object_store::{ObjectStore as _, PutPayload, path::Path as ObjectPath};
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};

/// Object store surface the ingestion pipeline writes original bytes to and
/// the version diff engine reads them back from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` under `<doc_id>/<filename>`, overwriting if present.
    async fn put(&self, doc_id: Uuid, filename: &str, bytes: Vec<u8>) -> Result<()>;

    /// Reads the bytes back.
    async fn get(&self, doc_id: Uuid, filename: &str) -> Result<Vec<u8>>;

    /// Deletes the object, if present. Not an error if it is already gone.
    async fn delete(&self, doc_id: Uuid, filename: &str) -> Result<()>;
}

/// Filesystem-backed production implementation rooted at a configured
/// directory (spec's `object_store_root`).
pub struct FsObjectStore {
    inner: LocalFileSystem,
}

impl FsObjectStore {
    /// Opens (creating if absent) a local filesystem object store rooted at
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Object`] if `root` cannot be created or is not
    /// a directory.
    pub fn open(root: &str) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        let inner = LocalFileSystem::new_with_prefix(root).map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        Ok(Self { inner })
    }

    fn object_path(doc_id: Uuid, filename: &str) -> ObjectPath {
        ObjectPath::from(format!("{doc_id}/{filename}"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, doc_id: Uuid, filename: &str, bytes: Vec<u8>) -> Result<()> {
        let path = Self::object_path(doc_id, filename);
        self.inner
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        Ok(())
    }

    async fn get(&self, doc_id: Uuid, filename: &str) -> Result<Vec<u8>> {
        let path = Self::object_path(doc_id, filename);
        let result = self.inner.get(&path).await.map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        let bytes = result.bytes().await.map_err(|e| Error::Store(StoreError::Object(e.to_string())))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, doc_id: Uuid, filename: &str) -> Result<()> {
        let path = Self::object_path(doc_id, filename);
        match self.inner.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::Store(StoreError::Object(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_through_a_temp_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::open(dir.path().to_str().expect("utf8 path")).expect("open");
        let doc_id = Uuid::new_v4();

        store.put(doc_id, "policy.pdf", b"hello world".to_vec()).await.expect("put");
        let bytes = store.get(doc_id, "policy.pdf").await.expect("get");
        assert_eq!(bytes, b"hello world");

        store.delete(doc_id, "policy.pdf").await.expect("delete");
        assert!(store.get(doc_id, "policy.pdf").await.is_err());
    }

    #[tokio::test]
    async fn delete_of_missing_object_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::open(dir.path().to_str().expect("utf8 path")).expect("open");
        store.delete(Uuid::new_v4(), "missing.txt").await.expect("delete missing is ok");
    }
}

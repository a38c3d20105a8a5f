//! src/services/local_store.rs
//!
//! LocalObjectStore: disk-backed implementation of [`ObjectStore`].
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{public_id}` and
//! served back through `GET /upload/{*path}`, so references handed out here
//! resolve against this process.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use super::object_store::{Asset, ObjectStore, ObjectStoreError, StoredObject, UPLOAD_MARKER};

const MAX_PUBLIC_ID_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,

    /// Externally reachable origin used to build references.
    pub public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Basic identifier validation to avoid trivial path traversal vectors.
    ///
    /// Rejects identifiers that begin with `/`, contain `..`, backslashes or
    /// control characters.
    fn ensure_id_safe(id: &str) -> Result<(), ObjectStoreError> {
        let invalid = id.is_empty()
            || id.len() > MAX_PUBLIC_ID_LEN
            || id.starts_with('/')
            || id.contains("..")
            || id.bytes().any(|b| b.is_ascii_control() || b == b'\\');

        if invalid {
            Err(ObjectStoreError::InvalidIdentifier(id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Two-level shard directories derived from MD5(public_id).
    fn object_shards(public_id: &str) -> (String, String) {
        let digest = md5::compute(public_id);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    fn object_path(&self, public_id: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(public_id);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(public_id);
        path
    }

    /// Open a stored payload for streaming out.
    pub async fn open(&self, public_id: &str) -> Result<File, ObjectStoreError> {
        Self::ensure_id_safe(public_id)?;
        File::open(self.object_path(public_id))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ObjectStoreError::NotFound(public_id.to_string()),
                _ => ObjectStoreError::Io(err),
            })
    }

    /// Write `bytes` to a temp file next to `file_path`, fsync, then rename
    /// into place. The temp file is removed on any failure.
    async fn write_atomically(file_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = file_path
            .parent()
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        written
    }

    /// Remove empty directories from `start` up to (not including) the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        namespace: &str,
        asset: Asset,
    ) -> Result<StoredObject, ObjectStoreError> {
        let namespace = namespace.trim_matches('/');
        Self::ensure_id_safe(namespace)?;

        let public_id = format!("{}/{}", namespace, Uuid::new_v4().simple());
        let file_path = self.object_path(&public_id);
        Self::write_atomically(&file_path, &asset.bytes).await?;

        let etag = format!("{:x}", md5::compute(&asset.bytes));
        let reference = format!(
            "{}{}v{}/{}.{}",
            self.public_base_url,
            UPLOAD_MARKER,
            Utc::now().timestamp(),
            public_id,
            asset.extension()
        );
        debug!(%public_id, %etag, size = asset.bytes.len(), "stored object");

        Ok(StoredObject {
            reference,
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), ObjectStoreError> {
        Self::ensure_id_safe(public_id)?;
        let file_path = self.object_path(public_id);

        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(public_id.to_string()));
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Write, read back, and remove a probe file under `base_path`.
    async fn ping(&self) -> Result<(), ObjectStoreError> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;

        if read_back? == b"readyz" {
            Ok(())
        } else {
            Err(ObjectStoreError::Unavailable("probe file content mismatch".into()))
        }
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entries::name::sanitize_segment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub size: i64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// External object store holding file bytes. Entries only keep the key.
#[async_trait]
pub trait BlobStoragePort: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> anyhow::Result<StoredBlob>;
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobObject>>;
}

/// `{user}/{entry id}/{file name}`, each segment sanitized.
pub fn blob_key(user_id: &str, entry_id: Uuid, filename: &str) -> String {
    format!(
        "{}/{}/{}",
        sanitize_segment(user_id),
        entry_id,
        sanitize_segment(filename)
    )
}

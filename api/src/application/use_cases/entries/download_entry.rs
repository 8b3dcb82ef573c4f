use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::blob_storage_port::BlobStoragePort;
use crate::application::ports::entry_repository::EntryRepository;

pub struct DownloadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct DownloadEntry<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub repo: &'a R,
    pub storage: &'a S,
}

impl<'a, R, S> DownloadEntry<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<DownloadedFile, AppError> {
        let entry = self.repo.get_for_user(id, user_id).await?;
        let Some(key) = entry.storage_key.as_deref() else {
            return Err(AppError::validation("folders have no content"));
        };
        let bytes = self.storage.get(key).await.map_err(|err| {
            tracing::error!(error = ?err, entry_id = %id, key, "blob_get_failed");
            AppError::Storage(err)
        })?;
        Ok(DownloadedFile {
            content_type: entry
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            name: entry.name,
            bytes,
        })
    }
}

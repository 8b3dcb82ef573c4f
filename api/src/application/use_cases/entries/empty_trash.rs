use crate::application::error::AppError;
use crate::application::ports::blob_storage_port::BlobStoragePort;
use crate::application::ports::entry_repository::EntryRepository;

use super::delete_entry::purge_blobs;

pub struct EmptyTrash<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub repo: &'a R,
    pub storage: &'a S,
}

impl<'a, R, S> EmptyTrash<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub async fn execute(&self, user_id: &str) -> Result<usize, AppError> {
        let removed = self.repo.empty_trash(user_id).await?;
        purge_blobs(self.storage, &removed).await;
        tracing::info!(user_id, removed = removed.len(), "trash_emptied");
        Ok(removed.len())
    }
}

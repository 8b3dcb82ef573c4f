use futures_util::future::join_all;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::blob_storage_port::BlobStoragePort;
use crate::application::ports::entry_repository::{EntryRepository, RemovedEntry};

pub struct PermanentlyDelete<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub repo: &'a R,
    pub storage: &'a S,
}

impl<'a, R, S> PermanentlyDelete<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    /// Only entries already in the trash can be removed. Returns the number
    /// of rows deleted, subtree included.
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<usize, AppError> {
        let removed = self.repo.delete_trashed(id, user_id).await?;
        purge_blobs(self.storage, &removed).await;
        tracing::info!(entry_id = %id, user_id, removed = removed.len(), "entry_deleted");
        Ok(removed.len())
    }
}

/// Rows are already gone; a blob that fails to delete is left for the orphan sweep.
pub(crate) async fn purge_blobs<S: BlobStoragePort + ?Sized>(storage: &S, removed: &[RemovedEntry]) {
    let deletes = removed.iter().filter_map(move |r| {
        r.storage_key.as_deref().map(|key| async move {
            if let Err(err) = storage.delete(key).await {
                tracing::warn!(error = ?err, entry_id = %r.id, key, "blob_delete_failed");
            }
        })
    });
    join_all(deletes).await;
}

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::ResolvedEntry;

/// Brings an entry back with its subtree; trashed ancestors are restored too
/// so the entry is reachable again.
pub struct RestoreFromTrash<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> RestoreFromTrash<'a, R> {
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<ResolvedEntry, AppError> {
        let entry = self.repo.set_trash(id, user_id, false).await?;
        tracing::debug!(entry_id = %id, user_id, "entry_restored");
        super::resolve(self.repo, entry).await
    }
}

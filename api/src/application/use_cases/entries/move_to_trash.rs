use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::ResolvedEntry;

/// Soft delete. Folders take their whole subtree with them.
pub struct MoveToTrash<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> MoveToTrash<'a, R> {
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<ResolvedEntry, AppError> {
        let entry = self.repo.set_trash(id, user_id, true).await?;
        tracing::debug!(entry_id = %id, user_id, "entry_trashed");
        super::resolve(self.repo, entry).await
    }
}

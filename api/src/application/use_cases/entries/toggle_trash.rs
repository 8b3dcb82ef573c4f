use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::ResolvedEntry;

pub struct ToggleTrash<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> ToggleTrash<'a, R> {
    pub async fn execute(
        &self,
        user_id: &str,
        id: Uuid,
        expected: Option<bool>,
    ) -> Result<ResolvedEntry, AppError> {
        let entry = self.repo.toggle_trash(id, user_id, expected).await?;
        tracing::debug!(entry_id = %id, user_id, trashed = entry.is_trash, "trash_toggled");
        super::resolve(self.repo, entry).await
    }
}

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::ResolvedEntry;

pub struct ToggleStar<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> ToggleStar<'a, R> {
    /// `expected` is the value the caller last saw; a mismatch is a conflict.
    pub async fn execute(
        &self,
        user_id: &str,
        id: Uuid,
        expected: Option<bool>,
    ) -> Result<ResolvedEntry, AppError> {
        let entry = self.repo.toggle_star(id, user_id, expected).await?;
        tracing::debug!(entry_id = %id, user_id, starred = entry.is_starred, "star_toggled");
        super::resolve(self.repo, entry).await
    }
}

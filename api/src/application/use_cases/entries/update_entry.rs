use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::{EntryChanges, ResolvedEntry};
use crate::domain::entries::name::validate_name;

/// Rename and/or move. Both changes land in one atomic update.
pub struct UpdateEntry<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> UpdateEntry<'a, R> {
    // parent_id: None => not provided; Some(None) => move to root; Some(Some(uuid)) => move under uuid
    pub async fn execute(
        &self,
        user_id: &str,
        id: Uuid,
        name: Option<String>,
        parent_id: Option<Option<Uuid>>,
    ) -> Result<ResolvedEntry, AppError> {
        let changes = EntryChanges {
            name: name.as_deref().map(validate_name).transpose()?,
            parent_id,
        };
        if changes.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let updated = self.repo.update_for_user(id, user_id, &changes).await?;
        tracing::debug!(entry_id = %id, user_id, "entry_updated");
        super::resolve(self.repo, updated).await
    }
}

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::AncestorLink;

/// Breadcrumbs from the root down to the entry itself.
pub struct GetAncestors<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> GetAncestors<'a, R> {
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<Vec<AncestorLink>, AppError> {
        Ok(self.repo.ancestors_for_user(id, user_id).await?)
    }
}

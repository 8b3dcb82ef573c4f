use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::ResolvedEntry;

pub struct GetEntry<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> GetEntry<'a, R> {
    pub async fn execute(&self, user_id: &str, id: Uuid) -> Result<ResolvedEntry, AppError> {
        let entry = self.repo.get_for_user(id, user_id).await?;
        super::resolve(self.repo, entry).await
    }
}

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::{NewEntry, ResolvedEntry};
use crate::domain::entries::name::validate_name;

pub struct CreateFolder<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> CreateFolder<'a, R> {
    pub async fn execute(
        &self,
        user_id: &str,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<ResolvedEntry, AppError> {
        let name = validate_name(name)?;
        let folder = NewEntry::folder(user_id, parent_id, name);
        let created = self.repo.create_for_user(&folder).await?;
        tracing::debug!(entry_id = %created.id, user_id, "folder_created");
        super::resolve(self.repo, created).await
    }
}

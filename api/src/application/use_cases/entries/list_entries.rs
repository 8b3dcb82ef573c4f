use std::collections::HashMap;

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::{Entry, EntryView, ResolvedEntry};
use crate::domain::entries::tree::{child_path, display_path};

pub struct ListEntries<'a, R: EntryRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: EntryRepository + ?Sized> ListEntries<'a, R> {
    pub async fn execute(
        &self,
        user_id: &str,
        view: EntryView,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<ResolvedEntry>, AppError> {
        let items = match view {
            EntryView::All => self.repo.list_children(user_id, parent_id).await?,
            EntryView::Starred | EntryView::Trash if parent_id.is_some() => {
                return Err(AppError::validation(
                    "parentId only applies to the default view",
                ));
            }
            EntryView::Starred => self.repo.list_starred(user_id).await?,
            EntryView::Trash => self.repo.list_trash(user_id).await?,
        };
        self.with_paths(user_id, items).await
    }

    /// Resolves each distinct parent once; siblings share the parent path.
    async fn with_paths(
        &self,
        user_id: &str,
        items: Vec<Entry>,
    ) -> Result<Vec<ResolvedEntry>, AppError> {
        let mut parent_paths: HashMap<Uuid, String> = HashMap::new();
        let mut out = Vec::with_capacity(items.len());
        for entry in items {
            let parent_path = match entry.parent_id {
                None => None,
                Some(pid) => {
                    if !parent_paths.contains_key(&pid) {
                        let chain = self.repo.ancestors_for_user(pid, user_id).await?;
                        parent_paths.insert(pid, display_path(&chain));
                    }
                    parent_paths.get(&pid).map(String::as_str)
                }
            };
            let path = child_path(parent_path, &entry.name);
            out.push(ResolvedEntry { entry, path });
        }
        Ok(out)
    }
}

pub mod create_folder;
pub mod delete_entry;
pub mod download_entry;
pub mod empty_trash;
pub mod get_ancestors;
pub mod get_entry;
pub mod list_entries;
pub mod move_to_trash;
pub mod restore_from_trash;
pub mod sweep_orphans;
pub mod toggle_star;
pub mod toggle_trash;
pub mod update_entry;
pub mod upload_file;

use crate::application::error::AppError;
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::{Entry, ResolvedEntry};
use crate::domain::entries::tree::display_path;

/// Attaches the display path to an entry.
pub(crate) async fn resolve<R>(repo: &R, entry: Entry) -> Result<ResolvedEntry, AppError>
where
    R: EntryRepository + ?Sized,
{
    let chain = repo.ancestors_for_user(entry.id, &entry.user_id).await?;
    Ok(ResolvedEntry {
        path: display_path(&chain),
        entry,
    })
}

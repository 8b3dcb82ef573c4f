use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entries::entry::{AncestorLink, Entry, EntryChanges, NewEntry};
use crate::domain::entries::tree::ParentProblem;

#[derive(thiserror::Error, Debug)]
pub enum EntryStoreError {
    /// Missing or owned by another user; the two are deliberately indistinguishable.
    #[error("entry not found")]
    NotFound,
    #[error("{}", .0.message())]
    InvalidParent(ParentProblem),
    #[error("entry state changed concurrently")]
    Conflict,
    #[error("entry is not in the trash")]
    NotTrashed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, EntryStoreError>;

/// A row removed by a permanent delete; the key drives blob cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntry {
    pub id: Uuid,
    pub storage_key: Option<String>,
}

/// Record store over the flat `entries` table. Every method is scoped by the
/// owning `user_id` and every mutation is atomic.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Fails with `InvalidParent` (and inserts nothing) when the parent is
    /// missing, foreign, not a folder or trashed.
    async fn create_for_user(&self, entry: &NewEntry) -> StoreResult<Entry>;

    /// Same parent rules as `create_for_user`, without writing.
    async fn check_parent(&self, user_id: &str, parent_id: Uuid) -> StoreResult<()>;

    async fn get_for_user(&self, id: Uuid, user_id: &str) -> StoreResult<Entry>;

    /// Root-first chain ending at `id`.
    async fn ancestors_for_user(&self, id: Uuid, user_id: &str)
    -> StoreResult<Vec<AncestorLink>>;

    /// Non-trashed children ordered by name. A given parent must be an owned,
    /// non-trashed folder, otherwise `NotFound`.
    async fn list_children(&self, user_id: &str, parent_id: Option<Uuid>)
    -> StoreResult<Vec<Entry>>;

    async fn list_starred(&self, user_id: &str) -> StoreResult<Vec<Entry>>;

    /// Trashed entries whose parent is not trashed.
    async fn list_trash(&self, user_id: &str) -> StoreResult<Vec<Entry>>;

    async fn update_for_user(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &EntryChanges,
    ) -> StoreResult<Entry>;

    /// Flips `is_starred` in one statement. With `expected`, flips only when
    /// the current value matches, otherwise `Conflict`.
    async fn toggle_star(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry>;

    /// Sets the trash flag on the entry and its subtree; restoring also
    /// restores trashed ancestors.
    async fn set_trash(&self, id: Uuid, user_id: &str, trashed: bool) -> StoreResult<Entry>;

    async fn toggle_trash(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry>;

    /// Removes a trashed entry and its subtree. `NotTrashed` leaves the row.
    async fn delete_trashed(&self, id: Uuid, user_id: &str) -> StoreResult<Vec<RemovedEntry>>;

    async fn empty_trash(&self, user_id: &str) -> StoreResult<Vec<RemovedEntry>>;

    /// Every blob key still referenced by some entry.
    async fn list_storage_keys(&self) -> anyhow::Result<HashSet<String>>;
}

//! In-memory ports for use-case tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::blob_storage_port::{BlobObject, BlobStoragePort, StoredBlob};
use crate::application::ports::entry_repository::{
    EntryRepository, EntryStoreError, RemovedEntry, StoreResult,
};
use crate::domain::entries::entry::{AncestorLink, Entry, EntryChanges, NewEntry};
use crate::domain::entries::tree::{ancestor_chain, check_parent_chain};

#[derive(Default)]
pub struct MemoryEntryRepository {
    rows: Mutex<HashMap<Uuid, Entry>>,
    pub fail_inserts: AtomicBool,
}

impl MemoryEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Entry> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn chain(rows: &HashMap<Uuid, Entry>, user_id: &str, id: Uuid) -> Vec<AncestorLink> {
        ancestor_chain(id, |cur| {
            rows.get(&cur).filter(|e| e.user_id == user_id).map(|e| AncestorLink {
                id: e.id,
                name: e.name.clone(),
                parent_id: e.parent_id,
                is_folder: e.is_folder,
                is_trash: e.is_trash,
            })
        })
    }

    fn owned(rows: &HashMap<Uuid, Entry>, id: Uuid, user_id: &str) -> StoreResult<Entry> {
        rows.get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned()
            .ok_or(EntryStoreError::NotFound)
    }

    fn subtree(rows: &HashMap<Uuid, Entry>, root: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            queue.extend(
                rows.values()
                    .filter(|e| e.parent_id == Some(id))
                    .map(|e| e.id),
            );
        }
        out
    }

    fn sorted(mut items: Vec<Entry>) -> Vec<Entry> {
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        items
    }

    fn apply_trash(rows: &mut HashMap<Uuid, Entry>, id: Uuid, user_id: &str, trashed: bool) {
        let now = Utc::now();
        for sid in Self::subtree(rows, id) {
            if let Some(e) = rows.get_mut(&sid) {
                e.is_trash = trashed;
                e.updated_at = now;
            }
        }
        if !trashed {
            let ancestors: Vec<Uuid> = Self::chain(rows, user_id, id)
                .into_iter()
                .filter(|l| l.is_trash)
                .map(|l| l.id)
                .collect();
            for aid in ancestors {
                if let Some(e) = rows.get_mut(&aid) {
                    e.is_trash = false;
                    e.updated_at = now;
                }
            }
        }
    }

    fn remove_subtrees(rows: &mut HashMap<Uuid, Entry>, roots: &[Uuid]) -> Vec<RemovedEntry> {
        let mut removed = Vec::new();
        for root in roots {
            for id in Self::subtree(rows, *root) {
                if let Some(e) = rows.remove(&id) {
                    removed.push(RemovedEntry {
                        id: e.id,
                        storage_key: e.storage_key,
                    });
                }
            }
        }
        removed
    }
}

#[async_trait]
impl EntryRepository for MemoryEntryRepository {
    async fn create_for_user(&self, entry: &NewEntry) -> StoreResult<Entry> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(parent_id) = entry.parent_id {
            let chain = Self::chain(&rows, &entry.user_id, parent_id);
            check_parent_chain(&chain, parent_id, None).map_err(EntryStoreError::InvalidParent)?;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(EntryStoreError::Other(anyhow::anyhow!("insert failed")));
        }
        let now = Utc::now();
        let content = entry.content.clone();
        let row = Entry {
            id: entry.id,
            user_id: entry.user_id.clone(),
            parent_id: entry.parent_id,
            name: entry.name.clone(),
            is_folder: content.is_none(),
            size: content.as_ref().map(|c| c.size).unwrap_or(0),
            content_type: content.as_ref().and_then(|c| c.content_type.clone()),
            storage_key: content.as_ref().map(|c| c.storage_key.clone()),
            file_url: content.as_ref().map(|c| c.file_url.clone()),
            thumbnail_url: content.as_ref().and_then(|c| c.thumbnail_url.clone()),
            is_starred: false,
            is_trash: false,
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn check_parent(&self, user_id: &str, parent_id: Uuid) -> StoreResult<()> {
        let rows = self.rows.lock().unwrap();
        let chain = Self::chain(&rows, user_id, parent_id);
        check_parent_chain(&chain, parent_id, None).map_err(EntryStoreError::InvalidParent)
    }

    async fn get_for_user(&self, id: Uuid, user_id: &str) -> StoreResult<Entry> {
        let rows = self.rows.lock().unwrap();
        Self::owned(&rows, id, user_id)
    }

    async fn ancestors_for_user(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> StoreResult<Vec<AncestorLink>> {
        let rows = self.rows.lock().unwrap();
        let chain = Self::chain(&rows, user_id, id);
        if chain.is_empty() {
            return Err(EntryStoreError::NotFound);
        }
        Ok(chain)
    }

    async fn list_children(
        &self,
        user_id: &str,
        parent_id: Option<Uuid>,
    ) -> StoreResult<Vec<Entry>> {
        let rows = self.rows.lock().unwrap();
        if let Some(pid) = parent_id {
            let parent = Self::owned(&rows, pid, user_id)?;
            if !parent.is_folder || parent.is_trash {
                return Err(EntryStoreError::NotFound);
            }
        }
        Ok(Self::sorted(
            rows.values()
                .filter(|e| e.user_id == user_id && e.parent_id == parent_id && !e.is_trash)
                .cloned()
                .collect(),
        ))
    }

    async fn list_starred(&self, user_id: &str) -> StoreResult<Vec<Entry>> {
        let rows = self.rows.lock().unwrap();
        Ok(Self::sorted(
            rows.values()
                .filter(|e| e.user_id == user_id && e.is_starred && !e.is_trash)
                .cloned()
                .collect(),
        ))
    }

    async fn list_trash(&self, user_id: &str) -> StoreResult<Vec<Entry>> {
        let rows = self.rows.lock().unwrap();
        Ok(Self::sorted(
            rows.values()
                .filter(|e| e.user_id == user_id && e.is_trash)
                .filter(|e| {
                    e.parent_id
                        .and_then(|p| rows.get(&p))
                        .map(|p| !p.is_trash)
                        .unwrap_or(true)
                })
                .cloned()
                .collect(),
        ))
    }

    async fn update_for_user(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &EntryChanges,
    ) -> StoreResult<Entry> {
        let mut rows = self.rows.lock().unwrap();
        Self::owned(&rows, id, user_id)?;
        if let Some(Some(pid)) = changes.parent_id {
            let chain = Self::chain(&rows, user_id, pid);
            check_parent_chain(&chain, pid, Some(id)).map_err(EntryStoreError::InvalidParent)?;
        }
        let row = rows.get_mut(&id).ok_or(EntryStoreError::NotFound)?;
        if let Some(name) = &changes.name {
            row.name = name.clone();
        }
        if let Some(parent) = changes.parent_id {
            row.parent_id = parent;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn toggle_star(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&id)
            .filter(|e| e.user_id == user_id)
            .ok_or(EntryStoreError::NotFound)?;
        if expected.is_some_and(|v| v != row.is_starred) {
            return Err(EntryStoreError::Conflict);
        }
        row.is_starred = !row.is_starred;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_trash(&self, id: Uuid, user_id: &str, trashed: bool) -> StoreResult<Entry> {
        let mut rows = self.rows.lock().unwrap();
        Self::owned(&rows, id, user_id)?;
        Self::apply_trash(&mut rows, id, user_id, trashed);
        Self::owned(&rows, id, user_id)
    }

    async fn toggle_trash(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry> {
        let mut rows = self.rows.lock().unwrap();
        let current = Self::owned(&rows, id, user_id)?;
        if expected.is_some_and(|v| v != current.is_trash) {
            return Err(EntryStoreError::Conflict);
        }
        Self::apply_trash(&mut rows, id, user_id, !current.is_trash);
        Self::owned(&rows, id, user_id)
    }

    async fn delete_trashed(&self, id: Uuid, user_id: &str) -> StoreResult<Vec<RemovedEntry>> {
        let mut rows = self.rows.lock().unwrap();
        let row = Self::owned(&rows, id, user_id)?;
        if !row.is_trash {
            return Err(EntryStoreError::NotTrashed);
        }
        Ok(Self::remove_subtrees(&mut rows, &[id]))
    }

    async fn empty_trash(&self, user_id: &str) -> StoreResult<Vec<RemovedEntry>> {
        let mut rows = self.rows.lock().unwrap();
        let roots: Vec<Uuid> = rows
            .values()
            .filter(|e| e.user_id == user_id && e.is_trash)
            .map(|e| e.id)
            .collect();
        Ok(Self::remove_subtrees(&mut rows, &roots))
    }

    async fn list_storage_keys(&self) -> anyhow::Result<HashSet<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter_map(|e| e.storage_key.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_puts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn insert_at(&self, key: &str, bytes: &[u8], at: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), at));
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStoragePort for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: Option<&str>,
    ) -> anyhow::Result<StoredBlob> {
        if self.fail_puts.load(Ordering::SeqCst) {
            anyhow::bail!("bucket unavailable");
        }
        self.insert_at(key, bytes, Utc::now());
        Ok(StoredBlob {
            key: key.to_string(),
            size: bytes.len() as i64,
            content_hash: String::new(),
        })
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(b, _)| b.clone())
            .ok_or_else(|| anyhow::anyhow!("not_found"))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("bucket unavailable");
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobObject>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (b, at))| BlobObject {
                key: k.clone(),
                size: b.len() as i64,
                last_modified: Some(*at),
            })
            .collect())
    }
}

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::application::ports::entry_repository::{
    EntryRepository, EntryStoreError, RemovedEntry, StoreResult,
};
use crate::domain::entries::entry::{AncestorLink, Entry, EntryChanges, NewEntry};
use crate::domain::entries::tree::{ParentProblem, ancestor_chain, check_parent_chain};
use crate::infrastructure::db::PgPool;

const ENTRY_COLUMNS: &str = "id, user_id, parent_id, name, is_folder, size, content_type, \
     storage_key, file_url, thumbnail_url, is_starred, is_trash, created_at, updated_at";

pub struct SqlxEntryRepository {
    pub pool: PgPool,
}

impl SqlxEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for EntryStoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                // serialization failure / deadlock between concurrent writers
                Some("40001") | Some("40P01") => return EntryStoreError::Conflict,
                // parent removed after it was checked
                Some("23503") => return EntryStoreError::InvalidParent(ParentProblem::Missing),
                _ => {}
            }
        }
        EntryStoreError::Other(err.into())
    }
}

fn map_entry(r: &PgRow) -> Entry {
    Entry {
        id: r.get("id"),
        user_id: r.get("user_id"),
        parent_id: r.get("parent_id"),
        name: r.get("name"),
        is_folder: r.get("is_folder"),
        size: r.get("size"),
        content_type: r.get("content_type"),
        storage_key: r.get("storage_key"),
        file_url: r.get("file_url"),
        thumbnail_url: r.get("thumbnail_url"),
        is_starred: r.get("is_starred"),
        is_trash: r.get("is_trash"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn map_removed(r: &PgRow) -> RemovedEntry {
    RemovedEntry {
        id: r.get("id"),
        storage_key: r.get("storage_key"),
    }
}

/// Root-first chain ending at `id`, restricted to rows owned by `user_id`.
async fn load_chain(
    conn: &mut PgConnection,
    user_id: &str,
    id: Uuid,
) -> Result<Vec<AncestorLink>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE chain AS (
          SELECT id, name, parent_id, is_folder, is_trash
          FROM entries WHERE id = $1 AND user_id = $2
          UNION
          SELECT e.id, e.name, e.parent_id, e.is_folder, e.is_trash
          FROM entries e JOIN chain c ON e.id = c.parent_id
          WHERE e.user_id = $2
        )
        SELECT id, name, parent_id, is_folder, is_trash FROM chain
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    let mut links: HashMap<Uuid, AncestorLink> = rows
        .into_iter()
        .map(|r| {
            let link = AncestorLink {
                id: r.get("id"),
                name: r.get("name"),
                parent_id: r.get("parent_id"),
                is_folder: r.get("is_folder"),
                is_trash: r.get("is_trash"),
            };
            (link.id, link)
        })
        .collect();
    Ok(ancestor_chain(id, |cur| links.remove(&cur)))
}

async fn fetch_owned(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: &str,
    lock: bool,
) -> StoreResult<Entry> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 AND user_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_entry).ok_or(EntryStoreError::NotFound)
}

/// Serializes tree-shape changes (create, move, trash, delete) of one user
/// until the surrounding transaction ends.
async fn lock_user_tree(conn: &mut PgConnection, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('stash.entries:' || $1, 0))")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Locks the prospective parent and validates its chain for a new or moved child.
async fn lock_and_check_parent(
    conn: &mut PgConnection,
    user_id: &str,
    parent_id: Uuid,
    moving: Option<Uuid>,
) -> StoreResult<()> {
    sqlx::query("SELECT 1 FROM entries WHERE id = $1 AND user_id = $2 FOR UPDATE")
        .bind(parent_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    let chain = load_chain(conn, user_id, parent_id).await?;
    check_parent_chain(&chain, parent_id, moving).map_err(EntryStoreError::InvalidParent)
}

/// Sets the flag on the subtree of `id`; restoring also clears trashed ancestors.
async fn apply_trash(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: &str,
    trashed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        WITH RECURSIVE subtree AS (
          SELECT id FROM entries WHERE id = $1 AND user_id = $2
          UNION
          SELECT e.id FROM entries e JOIN subtree s ON e.parent_id = s.id
        )
        UPDATE entries SET is_trash = $3, updated_at = now()
        WHERE id IN (SELECT id FROM subtree) AND user_id = $2 AND is_trash <> $3
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(trashed)
    .execute(&mut *conn)
    .await?;
    if !trashed {
        sqlx::query(
            r#"
            WITH RECURSIVE up AS (
              SELECT id, parent_id FROM entries WHERE id = $1 AND user_id = $2
              UNION
              SELECT e.id, e.parent_id FROM entries e JOIN up u ON e.id = u.parent_id
              WHERE e.user_id = $2
            )
            UPDATE entries SET is_trash = FALSE, updated_at = now()
            WHERE id IN (SELECT id FROM up) AND is_trash
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl EntryRepository for SqlxEntryRepository {
    async fn create_for_user(&self, entry: &NewEntry) -> StoreResult<Entry> {
        let mut tx = self.pool.begin().await?;
        lock_user_tree(&mut tx, &entry.user_id).await?;
        if let Some(parent_id) = entry.parent_id {
            lock_and_check_parent(&mut tx, &entry.user_id, parent_id, None).await?;
        }
        let content = entry.content.as_ref();
        let sql = format!(
            r#"INSERT INTO entries (id, user_id, parent_id, name, is_folder, size, content_type,
                                   storage_key, file_url, thumbnail_url)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {ENTRY_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(entry.id)
            .bind(&entry.user_id)
            .bind(entry.parent_id)
            .bind(&entry.name)
            .bind(entry.is_folder())
            .bind(content.map(|c| c.size).unwrap_or(0))
            .bind(content.and_then(|c| c.content_type.as_deref()))
            .bind(content.map(|c| c.storage_key.as_str()))
            .bind(content.map(|c| c.file_url.as_str()))
            .bind(content.and_then(|c| c.thumbnail_url.as_deref()))
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_entry(&row))
    }

    async fn check_parent(&self, user_id: &str, parent_id: Uuid) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        let chain = load_chain(&mut conn, user_id, parent_id).await?;
        check_parent_chain(&chain, parent_id, None).map_err(EntryStoreError::InvalidParent)
    }

    async fn get_for_user(&self, id: Uuid, user_id: &str) -> StoreResult<Entry> {
        let mut conn = self.pool.acquire().await?;
        fetch_owned(&mut conn, id, user_id, false).await
    }

    async fn ancestors_for_user(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> StoreResult<Vec<AncestorLink>> {
        let mut conn = self.pool.acquire().await?;
        let chain = load_chain(&mut conn, user_id, id).await?;
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
        if let Some(pid) = parent_id {
            let row = sqlx::query("SELECT is_folder, is_trash FROM entries WHERE id = $1 AND user_id = $2")
                .bind(pid)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            let listable = row
                .map(|r| r.get::<bool, _>("is_folder") && !r.get::<bool, _>("is_trash"))
                .unwrap_or(false);
            if !listable {
                return Err(EntryStoreError::NotFound);
            }
        }
        let sql = format!(
            r#"SELECT {ENTRY_COLUMNS} FROM entries
               WHERE user_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND NOT is_trash
               ORDER BY name, id"#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(map_entry).collect())
    }

    async fn list_starred(&self, user_id: &str) -> StoreResult<Vec<Entry>> {
        let sql = format!(
            r#"SELECT {ENTRY_COLUMNS} FROM entries
               WHERE user_id = $1 AND is_starred AND NOT is_trash
               ORDER BY name, id"#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(map_entry).collect())
    }

    async fn list_trash(&self, user_id: &str) -> StoreResult<Vec<Entry>> {
        let sql = format!(
            r#"SELECT {ENTRY_COLUMNS} FROM entries
               WHERE user_id = $1 AND is_trash
                 AND NOT EXISTS (
                   SELECT 1 FROM entries p WHERE p.id = entries.parent_id AND p.is_trash
                 )
               ORDER BY name, id"#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(map_entry).collect())
    }

    async fn update_for_user(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &EntryChanges,
    ) -> StoreResult<Entry> {
        let mut tx = self.pool.begin().await?;
        if changes.parent_id.is_some() {
            lock_user_tree(&mut tx, user_id).await?;
        }
        fetch_owned(&mut tx, id, user_id, true).await?;
        if let Some(Some(pid)) = changes.parent_id {
            lock_and_check_parent(&mut tx, user_id, pid, Some(id)).await?;
        }
        let sql = format!(
            r#"UPDATE entries
               SET name = COALESCE($3, name),
                   parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END,
                   updated_at = now()
               WHERE id = $1 AND user_id = $2
               RETURNING {ENTRY_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .bind(changes.name.as_deref())
            .bind(changes.parent_id.is_some())
            .bind(changes.parent_id.flatten())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(map_entry(&row))
    }

    async fn toggle_star(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry> {
        let sql = format!(
            r#"UPDATE entries SET is_starred = NOT is_starred, updated_at = now()
               WHERE id = $1 AND user_id = $2 AND ($3::bool IS NULL OR is_starred = $3)
               RETURNING {ENTRY_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return Ok(map_entry(&row));
        }
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM entries WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Err(if exists {
            EntryStoreError::Conflict
        } else {
            EntryStoreError::NotFound
        })
    }

    async fn set_trash(&self, id: Uuid, user_id: &str, trashed: bool) -> StoreResult<Entry> {
        let mut tx = self.pool.begin().await?;
        lock_user_tree(&mut tx, user_id).await?;
        fetch_owned(&mut tx, id, user_id, true).await?;
        apply_trash(&mut tx, id, user_id, trashed).await?;
        let entry = fetch_owned(&mut tx, id, user_id, false).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn toggle_trash(
        &self,
        id: Uuid,
        user_id: &str,
        expected: Option<bool>,
    ) -> StoreResult<Entry> {
        let mut tx = self.pool.begin().await?;
        lock_user_tree(&mut tx, user_id).await?;
        let current = fetch_owned(&mut tx, id, user_id, true).await?;
        if expected.is_some_and(|v| v != current.is_trash) {
            return Err(EntryStoreError::Conflict);
        }
        apply_trash(&mut tx, id, user_id, !current.is_trash).await?;
        let entry = fetch_owned(&mut tx, id, user_id, false).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn delete_trashed(&self, id: Uuid, user_id: &str) -> StoreResult<Vec<RemovedEntry>> {
        let mut tx = self.pool.begin().await?;
        lock_user_tree(&mut tx, user_id).await?;
        let current = fetch_owned(&mut tx, id, user_id, true).await?;
        if !current.is_trash {
            return Err(EntryStoreError::NotTrashed);
        }
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
              SELECT id FROM entries WHERE id = $1 AND user_id = $2
              UNION
              SELECT e.id FROM entries e JOIN subtree s ON e.parent_id = s.id
            )
            DELETE FROM entries WHERE id IN (SELECT id FROM subtree)
            RETURNING id, storage_key
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_removed).collect())
    }

    async fn empty_trash(&self, user_id: &str) -> StoreResult<Vec<RemovedEntry>> {
        let mut tx = self.pool.begin().await?;
        lock_user_tree(&mut tx, user_id).await?;
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
              SELECT id FROM entries WHERE user_id = $1 AND is_trash
              UNION
              SELECT e.id FROM entries e JOIN subtree s ON e.parent_id = s.id
            )
            DELETE FROM entries WHERE id IN (SELECT id FROM subtree)
            RETURNING id, storage_key
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows.iter().map(map_removed).collect())
    }

    async fn list_storage_keys(&self) -> anyhow::Result<HashSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT storage_key FROM entries WHERE storage_key IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys.into_iter().collect())
    }
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub is_folder: bool,
    pub size: i64,
    pub content_type: Option<String>,
    pub storage_key: Option<String>,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_starred: bool,
    pub is_trash: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Blob-backed part of a file entry. Folders have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub size: i64,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub id: Uuid,
    pub user_id: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub content: Option<FileContent>,
}

impl NewEntry {
    pub fn folder(user_id: &str, parent_id: Option<Uuid>, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            parent_id,
            name,
            content: None,
        }
    }

    pub fn file(
        id: Uuid,
        user_id: &str,
        parent_id: Option<Uuid>,
        name: String,
        content: FileContent,
    ) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            parent_id,
            name,
            content: Some(content),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.content.is_none()
    }
}

/// Which slice of a user's entries a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryView {
    #[default]
    All,
    Starred,
    Trash,
}

impl EntryView {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(Self::All),
            "starred" => Some(Self::Starred),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }
}

/// Partial update applied by rename/move.
/// parent_id: None => unchanged; Some(None) => move to root; Some(Some(id)) => move under id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    pub name: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

/// An entry together with its display path, computed from the parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub entry: Entry,
    pub path: String,
}

/// Ancestor link as seen while walking up the parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorLink {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub is_folder: bool,
    pub is_trash: bool,
}

use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::ports::blob_storage_port::{BlobStoragePort, blob_key};
use crate::application::ports::entry_repository::EntryRepository;
use crate::domain::entries::entry::{FileContent, NewEntry, ResolvedEntry};
use crate::domain::entries::name::validate_name;

/// Limits applied before any byte reaches blob storage.
#[derive(Debug, Clone, Default)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    /// Lowercase MIME prefixes such as `image/` or `application/pdf`. Empty allows all.
    pub allowed_content_types: Vec<String>,
    pub public_base_url: Option<String>,
}

impl UploadPolicy {
    pub fn allows(&self, content_type: &str) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type.to_ascii_lowercase();
        self.allowed_content_types
            .iter()
            .any(|prefix| ct.starts_with(prefix.as_str()))
    }
}

pub struct UploadRequest {
    pub parent_id: Option<Uuid>,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct UploadFile<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub repo: &'a R,
    pub storage: &'a S,
    pub policy: &'a UploadPolicy,
}

impl<'a, R, S> UploadFile<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    /// Writes the blob first and records metadata only once it is stored.
    /// A failed insert removes the blob again.
    pub async fn execute(
        &self,
        user_id: &str,
        req: UploadRequest,
    ) -> Result<ResolvedEntry, AppError> {
        let name = validate_name(&req.filename)?;
        if req.bytes.is_empty() {
            return Err(AppError::validation("uploaded file is empty"));
        }
        if self.policy.max_bytes > 0 && req.bytes.len() > self.policy.max_bytes {
            return Err(AppError::PayloadTooLarge {
                limit: self.policy.max_bytes,
            });
        }
        let content_type = resolve_content_type(req.content_type.as_deref(), &name);
        if !self.policy.allows(&content_type) {
            return Err(AppError::validation(format!(
                "file type {content_type} is not allowed"
            )));
        }
        if let Some(parent_id) = req.parent_id {
            self.repo.check_parent(user_id, parent_id).await?;
        }

        let id = Uuid::new_v4();
        let key = blob_key(user_id, id, &name);
        let stored = self
            .storage
            .put(&key, &req.bytes, Some(&content_type))
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, entry_id = %id, user_id, "blob_put_failed");
                AppError::Storage(err)
            })?;

        let url = content_url(self.policy.public_base_url.as_deref(), id);
        let thumbnail_url = content_type.starts_with("image/").then(|| url.clone());
        let entry = NewEntry::file(
            id,
            user_id,
            req.parent_id,
            name,
            FileContent {
                size: stored.size,
                content_type: Some(content_type),
                storage_key: stored.key.clone(),
                file_url: url,
                thumbnail_url,
            },
        );

        let created = match self.repo.create_for_user(&entry).await {
            Ok(created) => created,
            Err(err) => {
                if let Err(cleanup) = self.storage.delete(&stored.key).await {
                    tracing::warn!(error = ?cleanup, key = %stored.key, "blob_rollback_failed");
                }
                return Err(err.into());
            }
        };
        tracing::info!(
            entry_id = %created.id,
            user_id,
            size = created.size,
            hash = %stored.content_hash,
            "file_uploaded"
        );
        super::resolve(self.repo, created).await
    }
}

/// Client-declared type when meaningful, otherwise a guess from the extension.
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_ascii_lowercase(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

pub fn content_url(public_base_url: Option<&str>, id: Uuid) -> String {
    match public_base_url {
        Some(base) => format!("{}/api/entries/{}/content", base.trim_end_matches('/'), id),
        None => format!("/api/entries/{}/content", id),
    }
}

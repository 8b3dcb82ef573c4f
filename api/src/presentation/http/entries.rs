use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::use_cases::entries::create_folder::CreateFolder;
use crate::application::use_cases::entries::delete_entry::PermanentlyDelete;
use crate::application::use_cases::entries::download_entry::DownloadEntry;
use crate::application::use_cases::entries::empty_trash::EmptyTrash;
use crate::application::use_cases::entries::get_ancestors::GetAncestors;
use crate::application::use_cases::entries::get_entry::GetEntry;
use crate::application::use_cases::entries::list_entries::ListEntries;
use crate::application::use_cases::entries::move_to_trash::MoveToTrash;
use crate::application::use_cases::entries::restore_from_trash::RestoreFromTrash;
use crate::application::use_cases::entries::toggle_star::ToggleStar;
use crate::application::use_cases::entries::toggle_trash::ToggleTrash;
use crate::application::use_cases::entries::update_entry::UpdateEntry;
use crate::application::use_cases::entries::upload_file::{UploadFile, UploadRequest};
use crate::bootstrap::app_context::AppContext;
use crate::domain::entries::entry::{AncestorLink, EntryView, ResolvedEntry};
use crate::presentation::http::auth::AuthUser;
use crate::presentation::http::error::ApiErrorResponse;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: Uuid,
    pub user_id: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub is_folder: bool,
    pub size: i64,
    pub content_type: Option<String>,
    pub file_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_starred: bool,
    pub is_trash: bool,
    /// Display path computed from the parent chain, e.g. `/Docs/report.pdf`.
    pub path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ResolvedEntry> for EntryResponse {
    fn from(r: ResolvedEntry) -> Self {
        let e = r.entry;
        Self {
            id: e.id,
            user_id: e.user_id,
            parent_id: e.parent_id,
            name: e.name,
            is_folder: e.is_folder,
            size: e.size,
            content_type: e.content_type,
            file_url: e.file_url,
            thumbnail_url: e.thumbnail_url,
            is_starred: e.is_starred,
            is_trash: e.is_trash,
            path: r.path,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntryListResponse {
    pub items: Vec<EntryResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AncestorResponse {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub is_folder: bool,
}

impl From<AncestorLink> for AncestorResponse {
    fn from(l: AncestorLink) -> Self {
        Self {
            id: l.id,
            name: l.name,
            parent_id: l.parent_id,
            is_folder: l.is_folder,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesQuery {
    pub parent_id: Option<String>,
    pub view: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CreateEntryMultipart {
    /// File to upload; omit together with `isFolder=true` to create a folder
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<String>,
    /// Target folder; root when absent
    #[schema(value_type = Option<String>, format = Uuid)]
    parent_id: Option<String>,
    /// Overrides the uploaded file name
    name: Option<String>,
    #[schema(value_type = Option<bool>)]
    is_folder: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    pub name: Option<String>,
    /// `null` moves the entry to the root; absent leaves it in place.
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<String>)]
    pub parent_id: DoubleOption<Uuid>,
}

#[derive(Debug, Clone)]
pub enum DoubleOption<T> {
    NotProvided,
    Null,
    Some(T),
}

impl<T> DoubleOption<T> {
    fn into_change(self) -> Option<Option<T>> {
        match self {
            DoubleOption::NotProvided => None,
            DoubleOption::Null => Some(None),
            DoubleOption::Some(v) => Some(Some(v)),
        }
    }
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<DoubleOption<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(|opt| match opt {
        None => DoubleOption::Null,
        Some(value) => DoubleOption::Some(value),
    })
}

impl<T> Default for DoubleOption<T> {
    fn default() -> Self {
        DoubleOption::NotProvided
    }
}

/// Optional guard for toggles: the flip applies only if the flag still has
/// the expected value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ToggleRequest {
    pub expected: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TrashRequest {
    pub expected: Option<bool>,
    /// Sets the flag explicitly instead of flipping it.
    pub trashed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub removed: usize,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route(
            "/entries/:id",
            get(get_entry).patch(update_entry).delete(delete_entry),
        )
        .route("/entries/:id/ancestors", get(get_ancestors))
        .route("/entries/:id/content", get(download_entry))
        .route("/entries/:id/star", patch(toggle_star))
        .route("/entries/:id/trash", patch(toggle_trash))
        .route("/entries/:id/restore", post(restore_entry))
        .route("/trash", delete(empty_trash))
        .with_state(ctx)
}

// Malformed ids cannot name an entry the caller owns.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound)
}

fn parse_parent(raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("root") => Ok(None),
        Some(v) => Uuid::parse_str(v)
            .map(Some)
            .map_err(|_| AppError::validation("parentId must be a UUID")),
    }
}

/// An empty body decodes to the default; any other body must be valid JSON,
/// whatever its content type.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Json::<T>::from_bytes(body)
        .map(|Json(value)| value)
        .map_err(|err| AppError::validation(err.body_text()))
}

fn items(list: Vec<ResolvedEntry>) -> Json<EntryListResponse> {
    Json(EntryListResponse {
        items: list.into_iter().map(EntryResponse::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/api/entries",
    tag = "Entries",
    params(
        ("parentId" = Option<Uuid>, Query, description = "Folder to list; root when absent"),
        ("view" = Option<String>, Query, description = "all | starred | trash")
    ),
    responses(
        (status = 200, body = EntryListResponse),
        (status = 404, description = "Parent folder not found", body = ApiErrorResponse)
    )
)]
pub async fn list_entries(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListEntriesQuery>,
) -> Result<Json<EntryListResponse>, AppError> {
    let view = match q.view.as_deref() {
        None => EntryView::All,
        Some(raw) => EntryView::parse(raw)
            .ok_or_else(|| AppError::validation("view must be one of all, starred, trash"))?,
    };
    let parent_id = parse_parent(q.parent_id.as_deref())?;
    let repo = ctx.entry_repo();
    let uc = ListEntries {
        repo: repo.as_ref(),
    };
    let list = uc.execute(&user_id, view, parent_id).await?;
    Ok(items(list))
}

/// POST /api/entries
/// - multipart with `file`: uploads a file (`parentId`, `name` optional)
/// - multipart with `isFolder=true` and `name`, or JSON `{name, parentId}`: creates a folder
#[utoipa::path(
    post,
    path = "/api/entries",
    tag = "Entries",
    request_body(
        content = CreateEntryMultipart,
        content_type = "multipart/form-data",
        description = "Folders can also be created with a JSON CreateFolderRequest body",
    ),
    responses(
        (status = 201, body = EntryResponse),
        (status = 400, body = ApiErrorResponse),
        (status = 413, body = ApiErrorResponse),
        (status = 502, body = ApiErrorResponse)
    )
)]
pub async fn create_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    req: Request,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    let created = if is_multipart {
        let multipart = Multipart::from_request(req, &ctx)
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;
        create_from_multipart(&ctx, &user_id, multipart).await?
    } else {
        let Json(body) = Json::<CreateFolderRequest>::from_request(req, &ctx)
            .await
            .map_err(|err| AppError::validation(err.body_text()))?;
        let repo = ctx.entry_repo();
        let uc = CreateFolder {
            repo: repo.as_ref(),
        };
        uc.execute(&user_id, &body.name, body.parent_id).await?
    };
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn create_from_multipart(
    ctx: &AppContext,
    user_id: &str,
    mut multipart: Multipart,
) -> Result<ResolvedEntry, AppError> {
    let policy = ctx.upload_policy();
    let mut parent_raw: Option<String> = None;
    let mut name: Option<String> = None;
    let mut is_folder = false;
    let mut file: Option<(Option<String>, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                limit: policy.max_bytes,
            }
        } else {
            AppError::validation(err.body_text())
        }
    })? {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(|s| s.to_string());
                let ct = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|err| {
                    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        AppError::PayloadTooLarge {
                            limit: policy.max_bytes,
                        }
                    } else {
                        AppError::validation(err.body_text())
                    }
                })?;
                // Enforce configured max upload size (additional safety besides DefaultBodyLimit)
                if policy.max_bytes > 0 && data.len() > policy.max_bytes {
                    return Err(AppError::PayloadTooLarge {
                        limit: policy.max_bytes,
                    });
                }
                file = Some((file_name, ct, data.to_vec()));
            }
            Some("parentId") | Some("parent_id") => {
                parent_raw = Some(field.text().await.map_err(|e| AppError::validation(e.body_text()))?);
            }
            Some("name") => {
                name = Some(field.text().await.map_err(|e| AppError::validation(e.body_text()))?);
            }
            Some("isFolder") | Some("is_folder") => {
                let raw = field.text().await.map_err(|e| AppError::validation(e.body_text()))?;
                is_folder = matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1");
            }
            _ => { /* ignore additional fields */ }
        }
    }

    let parent_id = parse_parent(parent_raw.as_deref())?;
    let repo = ctx.entry_repo();
    match file {
        Some((file_name, content_type, bytes)) => {
            let filename = name
                .filter(|n| !n.trim().is_empty())
                .or(file_name)
                .ok_or_else(|| AppError::validation("file name is required"))?;
            let storage = ctx.blob_storage();
            let uc = UploadFile {
                repo: repo.as_ref(),
                storage: storage.as_ref(),
                policy,
            };
            uc.execute(
                user_id,
                UploadRequest {
                    parent_id,
                    filename,
                    content_type,
                    bytes,
                },
            )
            .await
        }
        None if is_folder => {
            let name = name.ok_or_else(|| AppError::validation("folder name is required"))?;
            let uc = CreateFolder {
                repo: repo.as_ref(),
            };
            uc.execute(user_id, &name, parent_id).await
        }
        None => Err(AppError::validation("file is required")),
    }
}

#[utoipa::path(
    get,
    path = "/api/entries/{id}",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses((status = 200, body = EntryResponse), (status = 404, body = ApiErrorResponse))
)]
pub async fn get_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<EntryResponse>, AppError> {
    let id = parse_id(&id)?;
    let repo = ctx.entry_repo();
    let uc = GetEntry {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&user_id, id).await?.into()))
}

#[utoipa::path(
    get,
    path = "/api/entries/{id}/ancestors",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses((status = 200, description = "Root first, ending at the entry", body = [AncestorResponse]))
)]
pub async fn get_ancestors(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<AncestorResponse>>, AppError> {
    let id = parse_id(&id)?;
    let repo = ctx.entry_repo();
    let uc = GetAncestors {
        repo: repo.as_ref(),
    };
    let chain = uc.execute(&user_id, id).await?;
    Ok(Json(chain.into_iter().map(AncestorResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/entries/{id}/content",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "OK", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 400, description = "Entry is a folder", body = ApiErrorResponse),
        (status = 502, body = ApiErrorResponse)
    )
)]
pub async fn download_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let repo = ctx.entry_repo();
    let storage = ctx.blob_storage();
    let uc = DownloadEntry {
        repo: repo.as_ref(),
        storage: storage.as_ref(),
    };
    let file = uc.execute(&user_id, id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    let disposition = if file.content_type.starts_with("image/")
        || file.content_type == "application/pdf"
    {
        "inline"
    } else {
        "attachment"
    };
    if let Ok(v) = HeaderValue::from_str(&format!(
        "{}; filename*=UTF-8''{}",
        disposition,
        urlencoding::encode(&file.name)
    )) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    headers.insert(
        header::HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    Ok((headers, file.bytes).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/entries/{id}",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    request_body = UpdateEntryRequest,
    responses((status = 200, body = EntryResponse), (status = 400, body = ApiErrorResponse))
)]
pub async fn update_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, AppError> {
    let id = parse_id(&id)?;
    let Json(req) = body.map_err(|err| AppError::validation(err.body_text()))?;
    let repo = ctx.entry_repo();
    let uc = UpdateEntry {
        repo: repo.as_ref(),
    };
    let updated = uc
        .execute(&user_id, id, req.name, req.parent_id.into_change())
        .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    patch,
    path = "/api/entries/{id}/star",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    request_body(content = ToggleRequest, description = "Optional compare-and-set guard"),
    responses((status = 200, body = EntryResponse), (status = 409, body = ApiErrorResponse))
)]
pub async fn toggle_star(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<EntryResponse>, AppError> {
    let id = parse_id(&id)?;
    let expected = optional_json::<ToggleRequest>(&body)?.expected;
    let repo = ctx.entry_repo();
    let uc = ToggleStar {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&user_id, id, expected).await?.into()))
}

#[utoipa::path(
    patch,
    path = "/api/entries/{id}/trash",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    request_body(content = TrashRequest, description = "Optional guard or explicit state"),
    responses((status = 200, body = EntryResponse), (status = 409, body = ApiErrorResponse))
)]
pub async fn toggle_trash(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<EntryResponse>, AppError> {
    let id = parse_id(&id)?;
    let body = optional_json::<TrashRequest>(&body)?;
    let repo = ctx.entry_repo();
    let out = match body.trashed {
        Some(true) => {
            MoveToTrash {
                repo: repo.as_ref(),
            }
            .execute(&user_id, id)
            .await?
        }
        Some(false) => {
            RestoreFromTrash {
                repo: repo.as_ref(),
            }
            .execute(&user_id, id)
            .await?
        }
        None => {
            ToggleTrash {
                repo: repo.as_ref(),
            }
            .execute(&user_id, id, body.expected)
            .await?
        }
    };
    Ok(Json(out.into()))
}

#[utoipa::path(
    post,
    path = "/api/entries/{id}/restore",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses((status = 200, body = EntryResponse), (status = 404, body = ApiErrorResponse))
)]
pub async fn restore_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<EntryResponse>, AppError> {
    let id = parse_id(&id)?;
    let repo = ctx.entry_repo();
    let uc = RestoreFromTrash {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&user_id, id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/entries/{id}",
    tag = "Entries",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, body = DeleteResponse),
        (status = 400, description = "Entry is not in the trash", body = ApiErrorResponse)
    )
)]
pub async fn delete_entry(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = parse_id(&id)?;
    let repo = ctx.entry_repo();
    let storage = ctx.blob_storage();
    let uc = PermanentlyDelete {
        repo: repo.as_ref(),
        storage: storage.as_ref(),
    };
    let removed = uc.execute(&user_id, id).await?;
    Ok(Json(DeleteResponse { removed }))
}

#[utoipa::path(
    delete,
    path = "/api/trash",
    tag = "Entries",
    responses((status = 200, body = DeleteResponse))
)]
pub async fn empty_trash(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DeleteResponse>, AppError> {
    let repo = ctx.entry_repo();
    let storage = ctx.blob_storage();
    let uc = EmptyTrash {
        repo: repo.as_ref(),
        storage: storage.as_ref(),
    };
    let removed = uc.execute(&user_id).await?;
    Ok(Json(DeleteResponse { removed }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;

    use super::*;
    use crate::application::testing::{MemoryBlobStore, MemoryEntryRepository};
    use crate::application::use_cases::entries::upload_file::UploadPolicy;
    use crate::bootstrap::app_context::AppServices;
    use crate::bootstrap::config::Config;

    fn context() -> (AppContext, Arc<MemoryEntryRepository>, Arc<MemoryBlobStore>) {
        let cfg = Config::from_lookup(|_| None).unwrap();
        let repo = Arc::new(MemoryEntryRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let policy = UploadPolicy {
            max_bytes: 64,
            allowed_content_types: Vec::new(),
            public_base_url: Some("https://files.example.com".into()),
        };
        let ctx = AppContext::new(cfg, AppServices::new(repo.clone(), blobs.clone(), policy));
        (ctx, repo, blobs)
    }

    const PNG: &[u8] = b"\x89PNG....";

    fn user() -> AuthUser {
        AuthUser("u1".into())
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request {
        let boundary = "stash-test-boundary";
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/entries")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(json: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/entries")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn creates_folders_from_json_and_multipart() {
        let (ctx, repo, _) = context();
        let (status, Json(docs)) = create_entry(
            State(ctx.clone()),
            user(),
            json_request(r#"{"name":"Docs"}"#),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(docs.is_folder);
        assert_eq!(docs.path, "/Docs");

        let parent = docs.id.to_string();
        let (_, Json(inner)) = create_entry(
            State(ctx.clone()),
            user(),
            multipart_request(&[
                ("isFolder", None, "true".as_bytes()),
                ("name", None, "Inner".as_bytes()),
                ("parentId", None, parent.as_bytes()),
            ]),
        )
        .await
        .unwrap();
        assert_eq!(inner.parent_id, Some(docs.id));
        assert_eq!(inner.path, "/Docs/Inner");
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn uploads_and_downloads_files() {
        let (ctx, _, blobs) = context();
        let (_, Json(file)) = create_entry(
            State(ctx.clone()),
            user(),
            multipart_request(&[("file", Some("photo.png"), PNG)]),
        )
        .await
        .unwrap();
        assert!(!file.is_folder);
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(file.thumbnail_url, file.file_url);
        assert_eq!(blobs.len(), 1);

        let resp = download_entry(State(ctx.clone()), user(), Path(file.id.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn rejects_oversized_and_missing_files() {
        let (ctx, repo, blobs) = context();
        let big = vec![b'x'; 65];
        let err = create_entry(
            State(ctx.clone()),
            user(),
            multipart_request(&[("file", Some("big.bin"), big.as_slice())]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 64 }));

        let err = create_entry(
            State(ctx.clone()),
            user(),
            multipart_request(&[("name", None, "orphan".as_bytes())]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(repo.len(), 0);
        assert_eq!(blobs.len(), 0);
    }

    #[tokio::test]
    async fn list_views_and_bad_queries() {
        let (ctx, _, _) = context();
        let (_, Json(docs)) = create_entry(
            State(ctx.clone()),
            user(),
            json_request(r#"{"name":"Docs"}"#),
        )
        .await
        .unwrap();
        toggle_star(State(ctx.clone()), user(), Path(docs.id.to_string()), Bytes::new())
            .await
            .unwrap();

        let Json(starred) = list_entries(
            State(ctx.clone()),
            user(),
            Query(ListEntriesQuery {
                parent_id: None,
                view: Some("starred".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(starred.items.len(), 1);
        assert!(starred.items[0].is_starred);

        let err = list_entries(
            State(ctx.clone()),
            user(),
            Query(ListEntriesQuery {
                parent_id: None,
                view: Some("recent".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = list_entries(
            State(ctx.clone()),
            user(),
            Query(ListEntriesQuery {
                parent_id: Some("not-a-uuid".into()),
                view: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn trash_restore_and_delete_flow() {
        let (ctx, repo, _) = context();
        let (_, Json(a)) = create_entry(State(ctx.clone()), user(), json_request(r#"{"name":"A"}"#))
            .await
            .unwrap();
        let id = a.id.to_string();

        let err = delete_entry(State(ctx.clone()), user(), Path(id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let Json(trashed) = toggle_trash(
            State(ctx.clone()),
            user(),
            Path(id.clone()),
            Bytes::from_static(br#"{"expected":false}"#),
        )
        .await
        .unwrap();
        assert!(trashed.is_trash);

        let Json(restored) = restore_entry(State(ctx.clone()), user(), Path(id.clone()))
            .await
            .unwrap();
        assert!(!restored.is_trash);

        toggle_trash(
            State(ctx.clone()),
            user(),
            Path(id.clone()),
            Bytes::from_static(br#"{"trashed":true}"#),
        )
        .await
        .unwrap();
        let Json(out) = delete_entry(State(ctx.clone()), user(), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(out.removed, 1);
        assert_eq!(repo.len(), 0);

        let err = get_entry(State(ctx.clone()), user(), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let (ctx, _, _) = context();
        let err = get_entry(State(ctx), user(), Path("../../etc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn toggle_guards_survive_loose_bodies() {
        let (ctx, repo, _) = context();
        let (_, Json(a)) = create_entry(State(ctx.clone()), user(), json_request(r#"{"name":"A"}"#))
            .await
            .unwrap();
        let id = a.id.to_string();

        let err = toggle_star(
            State(ctx.clone()),
            user(),
            Path(id.clone()),
            Bytes::from_static(br#"{"expected":true}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = toggle_star(
            State(ctx.clone()),
            user(),
            Path(id.clone()),
            Bytes::from_static(br#"{"expected":"true"}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = toggle_trash(
            State(ctx.clone()),
            user(),
            Path(id.clone()),
            Bytes::from_static(b"expected=true"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let row = repo.snapshot(a.id).unwrap();
        assert!(!row.is_starred);
        assert!(!row.is_trash);

        let Json(starred) = toggle_star(
            State(ctx.clone()),
            user(),
            Path(id),
            Bytes::from_static(b"  \n"),
        )
        .await
        .unwrap();
        assert!(starred.is_starred);
    }

    #[tokio::test]
    async fn update_rejects_bad_json_as_validation_error() {
        let (ctx, _, _) = context();
        let (_, Json(a)) = create_entry(State(ctx.clone()), user(), json_request(r#"{"name":"A"}"#))
            .await
            .unwrap();
        let req = axum::http::Request::builder()
            .method("PATCH")
            .uri(format!("/api/entries/{}", a.id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"parentId":"nope"}"#))
            .unwrap();
        let body = Json::<UpdateEntryRequest>::from_request(req, &ctx).await;
        assert!(body.is_err());

        let err = update_entry(State(ctx.clone()), user(), Path(a.id.to_string()), body)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let payload: ApiErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(payload.error, "VALIDATION_ERROR");
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: UpdateEntryRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(absent.parent_id.into_change().is_none());
        let null: UpdateEntryRequest = serde_json::from_str(r#"{"parentId":null}"#).unwrap();
        assert_eq!(null.parent_id.into_change(), Some(None));
    }
}

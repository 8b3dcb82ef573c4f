use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use walkdir::WalkDir;

use crate::application::ports::blob_storage_port::{BlobObject, BlobStoragePort, StoredBlob};
use crate::infrastructure::storage::{content_hash, key_from_path, resolve_key_path};

/// Blobs as plain files under `root`, one file per key.
pub struct FsBlobStore {
    pub root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStoragePort for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: Option<&str>,
    ) -> anyhow::Result<StoredBlob> {
        let full = resolve_key_path(&self.root, key)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Readers never observe a half-written file.
        let tmp = full.with_extension("part");
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write blob {key}"))?;
        fs::rename(&tmp, &full).await?;
        Ok(StoredBlob {
            key: key.to_string(),
            size: bytes.len() as i64,
            content_hash: content_hash(bytes),
        })
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let full = resolve_key_path(&self.root, key)?;
        if !fs::try_exists(&full).await.unwrap_or(false) {
            anyhow::bail!("not_found");
        }
        let data = fs::read(&full).await?;
        Ok(data)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let full = resolve_key_path(&self.root, key)?;
        match fs::remove_file(&full).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err).with_context(|| format!("failed to delete blob {key}")),
        }
        // Drop the per-entry directory once empty.
        if let Some(parent) = full.parent() {
            if parent != self.root.as_path() {
                let _ = fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobObject>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<BlobObject>> {
            let mut out = Vec::new();
            if !root.exists() {
                return Ok(out);
            }
            for entry in WalkDir::new(&root) {
                let entry = entry?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let Some(key) = key_from_path(&root, entry.path()) else {
                    continue;
                };
                if !key.starts_with(&prefix) {
                    continue;
                }
                let meta = entry.metadata()?;
                out.push(BlobObject {
                    key,
                    size: meta.len() as i64,
                    last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
            out.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(out)
        })
        .await
        .context("blob listing task failed")?
    }
}

use chrono::{DateTime, Duration, Utc};

use crate::application::error::AppError;
use crate::application::ports::blob_storage_port::BlobStoragePort;
use crate::application::ports::entry_repository::EntryRepository;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
}

/// Removes blobs that no entry points at. Objects younger than `grace` are
/// skipped so an upload whose row is still being inserted is left alone.
pub struct SweepOrphans<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub repo: &'a R,
    pub storage: &'a S,
    pub grace: Duration,
}

impl<'a, R, S> SweepOrphans<'a, R, S>
where
    R: EntryRepository + ?Sized,
    S: BlobStoragePort + ?Sized,
{
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        // Objects are listed before keys are read: a row inserted in between
        // only makes its blob look referenced.
        let objects = self.storage.list("").await.map_err(AppError::Storage)?;
        let referenced = self
            .repo
            .list_storage_keys()
            .await
            .map_err(AppError::Internal)?;
        let cutoff = now - self.grace;

        let mut report = SweepReport {
            scanned: objects.len(),
            deleted: 0,
        };
        for obj in objects {
            if referenced.contains(&obj.key) {
                continue;
            }
            // Unknown age counts as old enough.
            if obj.last_modified.is_some_and(|at| at > cutoff) {
                continue;
            }
            match self.storage.delete(&obj.key).await {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    tracing::warn!(error = ?err, key = %obj.key, "blob_delete_failed")
                }
            }
        }
        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            "orphan_sweep_completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{MemoryBlobStore, MemoryEntryRepository};
    use crate::application::use_cases::entries::upload_file::{
        UploadFile, UploadPolicy, UploadRequest,
    };

    #[tokio::test]
    async fn deletes_only_old_unreferenced_blobs() {
        let repo = MemoryEntryRepository::new();
        let blobs = MemoryBlobStore::new();
        let policy = UploadPolicy::default();
        let file = UploadFile {
            repo: &repo,
            storage: &blobs,
            policy: &policy,
        }
        .execute(
            "u1",
            UploadRequest {
                parent_id: None,
                filename: "kept.txt".into(),
                content_type: None,
                bytes: b"kept".to_vec(),
            },
        )
        .await
        .unwrap()
        .entry;
        let now = Utc::now();
        blobs.insert_at("u1/stale/old.bin", b"x", now - Duration::hours(5));
        blobs.insert_at("u1/fresh/new.bin", b"y", now - Duration::minutes(1));

        let report = SweepOrphans {
            repo: &repo,
            storage: &blobs,
            grace: Duration::hours(1),
        }
        .execute(now)
        .await
        .unwrap();

        assert_eq!(report, SweepReport { scanned: 3, deleted: 1 });
        assert!(!blobs.contains("u1/stale/old.bin"));
        assert!(blobs.contains("u1/fresh/new.bin"));
        assert!(blobs.contains(file.storage_key.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn empty_storage_is_a_no_op() {
        let repo = MemoryEntryRepository::new();
        let blobs = MemoryBlobStore::new();
        let report = SweepOrphans {
            repo: &repo,
            storage: &blobs,
            grace: Duration::zero(),
        }
        .execute(Utc::now())
        .await
        .unwrap();
        assert_eq!(report, SweepReport::default());
    }
}

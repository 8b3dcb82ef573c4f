use std::path::PathBuf;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, error::SdkError};
use chrono::{DateTime, Utc};

use crate::application::ports::blob_storage_port::{BlobObject, BlobStoragePort, StoredBlob};
use crate::bootstrap::config::Config;
use crate::infrastructure::storage::{content_hash, normalize_prefix};

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    root_prefix: String,
}

impl S3BlobStore {
    pub async fn new(cfg: &Config) -> anyhow::Result<Self> {
        let bucket = cfg
            .s3_bucket
            .clone()
            .context("S3 bucket must be configured when using S3 storage backend")?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &cfg.s3_region {
            loader = loader.region(Region::new(region.clone()));
        }

        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let (Some(access), Some(secret)) = (&cfg.s3_access_key, &cfg.s3_secret_key) {
            let creds = Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "stash-s3-static",
            );
            builder = builder.credentials_provider(creds);
        }

        if let Some(endpoint) = &cfg.s3_endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        if cfg.s3_use_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        let root_prefix = normalize_prefix(&PathBuf::from(&cfg.storage_root));

        ensure_bucket(&client, &bucket).await?;

        Ok(Self {
            client,
            bucket,
            root_prefix,
        })
    }

    fn object_key(&self, key: &str) -> String {
        join_prefix(&self.root_prefix, key)
    }

    fn blob_key<'k>(&self, object_key: &'k str) -> Option<&'k str> {
        strip_root(&self.root_prefix, object_key)
    }
}

fn join_prefix(root_prefix: &str, key: &str) -> String {
    let key = key.trim_start_matches('/');
    if root_prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", root_prefix, key)
    }
}

fn strip_root<'k>(root_prefix: &str, object_key: &'k str) -> Option<&'k str> {
    if root_prefix.is_empty() {
        return Some(object_key);
    }
    object_key
        .strip_prefix(root_prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}

#[async_trait]
impl BlobStoragePort for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> anyhow::Result<StoredBlob> {
        let object_key = self.object_key(key);
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        req.send()
            .await
            .with_context(|| format!("failed to upload object {object_key}"))?;
        Ok(StoredBlob {
            key: key.to_string(),
            size: bytes.len() as i64,
            content_hash: content_hash(bytes),
        })
    }

    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let object_key = self.object_key(key);
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .with_context(|| format!("failed to get object {object_key}"))?;
        let data = object
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read object {object_key}"))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .with_context(|| format!("failed to delete object {object_key}"))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobObject>> {
        let full_prefix = self.object_key(prefix);
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .with_context(|| format!("failed to list objects under {full_prefix}"))?;
            for obj in page.contents() {
                let Some(key) = obj.key().and_then(|k| self.blob_key(k)) else {
                    continue;
                };
                out.push(BlobObject {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }
            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }
        Ok(out)
    }
}

async fn ensure_bucket(client: &Client, bucket: &str) -> anyhow::Result<()> {
    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => return Ok(()),
        Err(SdkError::ServiceError(service_err)) => {
            if !matches!(service_err.err(), HeadBucketError::NotFound(_)) {
                return Err(anyhow!(service_err.err().to_string()));
            }
        }
        Err(err) => return Err(anyhow!(err.to_string())),
    }

    tracing::info!(bucket, "creating_bucket");
    match client.create_bucket().bucket(bucket).send().await {
        Ok(_) => Ok(()),
        Err(SdkError::ServiceError(service_err)) => match service_err.err() {
            CreateBucketError::BucketAlreadyOwnedByYou(_) => Ok(()),
            CreateBucketError::BucketAlreadyExists(_) => Ok(()),
            other => Err(anyhow!(other.to_string())),
        },
        Err(err) => Err(anyhow!(err.to_string())),
    }
}

use std::sync::Arc;

use crate::application::ports::blob_storage_port::BlobStoragePort;
use crate::application::ports::entry_repository::EntryRepository;
use crate::application::use_cases::entries::upload_file::UploadPolicy;
use crate::bootstrap::config::Config;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    entry_repo: Arc<dyn EntryRepository>,
    blob_storage: Arc<dyn BlobStoragePort>,
    upload_policy: UploadPolicy,
}

impl AppServices {
    pub fn new(
        entry_repo: Arc<dyn EntryRepository>,
        blob_storage: Arc<dyn BlobStoragePort>,
        upload_policy: UploadPolicy,
    ) -> Self {
        Self {
            entry_repo,
            blob_storage,
            upload_policy,
        }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn entry_repo(&self) -> Arc<dyn EntryRepository> {
        self.services.entry_repo.clone()
    }

    pub fn blob_storage(&self) -> Arc<dyn BlobStoragePort> {
        self.services.blob_storage.clone()
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.services.upload_policy
    }
}

impl UploadPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_bytes: cfg.upload_max_bytes,
            allowed_content_types: cfg.allowed_content_types.clone(),
            public_base_url: cfg.public_base_url.clone(),
        }
    }
}

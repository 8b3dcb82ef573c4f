pub mod blob_storage_port;
pub mod entry_repository;

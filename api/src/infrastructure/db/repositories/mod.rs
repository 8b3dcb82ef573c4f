pub mod entry_repository_sqlx;

pub mod auth;
pub mod entries;
pub mod error;
pub mod health;

// Module layout (Clean Architecture style)
// - bootstrap: configuration and startup
// - infrastructure: Postgres and blob storage adapters
// - presentation: HTTP handlers and routing
// - application: ports, use cases and the error taxonomy
// - domain: core models

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

//! Blog Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, comment tree services, repository traits
//! - `application/` - Use cases (article cache, publishing, unlocking, comments, IP guard)
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Caching Model
//! - Article detail is cache-aside in a key-value hash; each read bumps the
//!   view counter in both the cache and the database
//! - The home listing is one sorted set scored by article id, rebuilt on miss
//! - Every article write invalidates its entry and the listing
//! - Locked articles hide their content until the Argon2id-hashed lock
//!   password is presented
//!
//! ## Request Guarding
//! - Fixed-window rate limits per (operation, client IP)
//! - IP blacklist with optional expiry
//! - Access logging off the request path

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::BlogConfig;
pub use error::{BlogError, BlogResult};
pub use infra::postgres::PgBlogRepository;
pub use presentation::router::{blog_router, blog_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entities::*;
    pub use crate::presentation::dto::*;
}

#[cfg(test)]
mod tests;

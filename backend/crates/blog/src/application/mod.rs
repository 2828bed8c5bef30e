//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.

pub mod article_cache;
pub mod comments;
pub mod config;
pub mod ip_guard;
pub mod publish_article;
pub mod unlock_article;

// Re-exports
pub use article_cache::{ArticleCache, ThumbnailPage};
pub use comments::CommentUseCase;
pub use config::BlogConfig;
pub use ip_guard::IpGuardUseCase;
pub use publish_article::PublishArticleUseCase;
pub use unlock_article::UnlockArticleUseCase;

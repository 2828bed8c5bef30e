//! Domain Layer
//!
//! Contains entities, pure domain services, and repository traits.

pub mod entities;
pub mod repository;
pub mod services;

// Re-exports
pub use entities::{
    AccessLog, Article, ArticleDraft, ArticleThumbnail, Comment, CommentNode, IpBan, NewComment,
    Tag,
};
pub use repository::{
    AccessLogRepository, ArticleRepository, BlogRepository, CommentRepository, IpBanRepository,
};

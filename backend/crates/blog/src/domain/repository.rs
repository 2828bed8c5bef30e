//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entities::{
    AccessLog, Article, ArticleDraft, ArticleLock, ArticleThumbnail, Comment, CommentLink, IpBan, NewComment,
    Tag,
};
use crate::error::BlogResult;
use chrono::{DateTime, Utc};
use kernel::id::{ArticleId, CommentId};

/// Article repository trait
#[trait_variant::make(ArticleRepository: Send)]
pub trait LocalArticleRepository {
    /// Published article without tags
    async fn find_article(&self, id: ArticleId) -> BlogResult<Option<Article>>;

    async fn find_article_tags(&self, id: ArticleId) -> BlogResult<Vec<Tag>>;

    /// Lock state of a published article
    async fn find_article_lock(&self, id: ArticleId) -> BlogResult<Option<ArticleLock>>;

    /// Write the authoritative view count
    async fn update_article_views(&self, id: ArticleId, views: i64) -> BlogResult<()>;

    /// All published articles, newest id first
    async fn list_published_thumbnails(&self) -> BlogResult<Vec<ArticleThumbnail>>;

    /// Insert the article and link its tags, creating missing ones.
    /// `lock_hash` replaces the draft's clear text password.
    async fn insert_article(
        &self,
        draft: &ArticleDraft,
        word_num: i64,
        lock_hash: Option<&str>,
    ) -> BlogResult<ArticleId>;

    /// Replace content, lock and tags; `false` if the article does not exist
    async fn update_article(
        &self,
        id: ArticleId,
        draft: &ArticleDraft,
        word_num: i64,
        lock_hash: Option<&str>,
    ) -> BlogResult<bool>;
}

/// Comment repository trait
#[trait_variant::make(CommentRepository: Send)]
pub trait LocalCommentRepository {
    async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment>;

    async fn find_comment(&self, id: CommentId) -> BlogResult<Option<Comment>>;

    /// Public comments of an article, newest first
    async fn list_public_comments(&self, article_id: ArticleId) -> BlogResult<Vec<Comment>>;

    /// Parent links of every comment on an article, public or not
    async fn list_comment_links(&self, article_id: ArticleId) -> BlogResult<Vec<CommentLink>>;

    /// Delete all ids in one atomic step
    async fn delete_comments(&self, ids: &[CommentId]) -> BlogResult<u64>;

    async fn update_comment(
        &self,
        id: CommentId,
        content: &str,
        is_public: bool,
    ) -> BlogResult<bool>;
}

/// Access log repository trait
#[trait_variant::make(AccessLogRepository: Send)]
pub trait LocalAccessLogRepository {
    async fn insert_access_log(&self, log: &AccessLog) -> BlogResult<()>;
}

/// IP blacklist repository trait
#[trait_variant::make(IpBanRepository: Send)]
pub trait LocalIpBanRepository {
    /// Whether a ban on `ip` is active at `now`
    async fn is_ip_banned(&self, ip: &str, now: DateTime<Utc>) -> BlogResult<bool>;

    async fn insert_ip_ban(&self, ban: &IpBan) -> BlogResult<()>;

    async fn delete_ip_bans(&self, ip: &str) -> BlogResult<u64>;
}

/// Everything the HTTP surface needs from storage
pub trait BlogRepository:
    ArticleRepository
    + CommentRepository
    + AccessLogRepository
    + IpBanRepository
    + Send
    + Sync
    + 'static
{
}

impl<T> BlogRepository for T where
    T: ArticleRepository
        + CommentRepository
        + AccessLogRepository
        + IpBanRepository
        + Send
        + Sync
        + 'static
{
}

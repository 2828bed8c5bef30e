//! API DTOs (Data Transfer Objects)

use crate::application::article_cache::ThumbnailPage;
use crate::domain::entities::{Article, ArticleThumbnail, Comment, CommentNode, Tag};
use chrono::{DateTime, Utc};
use kernel::id::{ArticleId, CommentId};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u64 = 10;

fn default_page() -> u64 {
    1
}

fn default_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Query for GET /api/articles
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailPageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_size")]
    pub size: u64,
}

/// Response for GET /api/articles
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailPageResponse {
    pub items: Vec<ArticleThumbnail>,
    pub page: u64,
    pub size: u64,
    pub total_pages: u64,
}

impl ThumbnailPageResponse {
    pub fn new(page: ThumbnailPage, query: &ThumbnailPageQuery) -> Self {
        Self {
            items: page.items,
            page: query.page,
            size: query.size,
            total_pages: page.total_pages,
        }
    }
}

/// Response for GET /api/articles/{id}
///
/// Content of a locked article is withheld.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: ArticleId,
    pub title: String,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub views: i64,
    pub word_num: i64,
    pub thumbnail_url: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

impl ArticleResponse {
    /// Full content regardless of the lock, for callers that passed the password check
    pub fn unlocked(article: Article) -> Self {
        Self::build(article, true)
    }

    fn build(article: Article, reveal: bool) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: (reveal || !article.is_locked).then_some(article.content),
            category_id: article.category_id,
            views: article.views,
            word_num: article.word_num,
            thumbnail_url: article.thumbnail_url,
            is_locked: article.is_locked,
            created_at: article.created_at,
            updated_at: article.updated_at,
            tags: article.tags,
        }
    }
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self::build(article, false)
    }
}

/// Request for POST /api/articles/{id}/unlock
#[derive(Debug, Clone, Deserialize)]
pub struct UnlockArticleRequest {
    pub password: String,
}

/// A comment with its replies; email and user agent are never exposed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: CommentId,
    pub article_id: ArticleId,
    pub parent_id: Option<CommentId>,
    pub author: String,
    pub content: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub children: Vec<CommentResponse>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            parent_id: comment.parent_id,
            author: comment.author,
            content: comment.content,
            is_admin: comment.is_admin,
            created_at: comment.created_at,
            children: Vec::new(),
        }
    }
}

impl From<CommentNode> for CommentResponse {
    fn from(node: CommentNode) -> Self {
        Self {
            children: node.children.into_iter().map(Self::from).collect(),
            ..Self::from(node.comment)
        }
    }
}

/// Request for POST /api/articles/{id}/comments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommentRequest {
    pub author: String,
    #[serde(default)]
    pub email: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

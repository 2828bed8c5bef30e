//! Comment Use Cases
//!
//! Threaded listing, submission, moderation and subtree deletion.

use crate::domain::entities::{Comment, CommentNode, NewComment};
use crate::domain::repository::{ArticleRepository, CommentRepository};
use crate::domain::services::{build_comment_tree, collect_subtree_post_order};
use crate::error::{BlogError, BlogResult};
use kernel::id::{ArticleId, CommentId};
use std::sync::Arc;

const MAX_AUTHOR_CHARS: usize = 64;
const MAX_CONTENT_CHARS: usize = 4096;

pub struct CommentUseCase<R>
where
    R: ArticleRepository + CommentRepository,
{
    repo: Arc<R>,
}

impl<R> CommentUseCase<R>
where
    R: ArticleRepository + CommentRepository + Sync,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Public comments of an article as threads, newest first at every level
    pub async fn list_tree(&self, article_id: ArticleId) -> BlogResult<Vec<CommentNode>> {
        let comments = self.repo.list_public_comments(article_id).await?;
        Ok(build_comment_tree(comments))
    }

    /// The article must be published; a reply must point at an existing
    /// comment on the same article.
    pub async fn submit(&self, mut comment: NewComment) -> BlogResult<Comment> {
        comment.author = comment.author.trim().to_string();
        comment.content = comment.content.trim().to_string();
        validate(&comment)?;

        if self.repo.find_article(comment.article_id).await?.is_none() {
            return Err(BlogError::ArticleNotFound(comment.article_id));
        }

        if let Some(parent_id) = comment.parent_id {
            let parent = self.repo.find_comment(parent_id).await?;
            if parent.is_none_or(|p| p.article_id != comment.article_id) {
                return Err(BlogError::CommentNotFound(parent_id));
            }
        }

        let saved = self.repo.insert_comment(&comment).await?;
        tracing::info!(
            comment_id = %saved.id,
            article_id = %saved.article_id,
            "Comment submitted"
        );
        Ok(saved)
    }

    /// Delete a comment with every reply beneath it; returns rows removed.
    pub async fn delete_recursive(&self, id: CommentId) -> BlogResult<u64> {
        let root = self
            .repo
            .find_comment(id)
            .await?
            .ok_or(BlogError::CommentNotFound(id))?;

        let links = self.repo.list_comment_links(root.article_id).await?;
        let ids = collect_subtree_post_order(id, &links);
        let deleted = self.repo.delete_comments(&ids).await?;

        tracing::info!(comment_id = %id, deleted = deleted, "Comment subtree deleted");
        Ok(deleted)
    }

    /// Edit content and visibility
    pub async fn moderate(&self, id: CommentId, content: &str, is_public: bool) -> BlogResult<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BlogError::InvalidInput("content must not be empty".into()));
        }
        if !self.repo.update_comment(id, content, is_public).await? {
            return Err(BlogError::CommentNotFound(id));
        }
        tracing::info!(comment_id = %id, is_public = is_public, "Comment moderated");
        Ok(())
    }
}

fn validate(comment: &NewComment) -> BlogResult<()> {
    if comment.author.is_empty() {
        return Err(BlogError::InvalidInput("author must not be empty".into()));
    }
    if comment.author.chars().count() > MAX_AUTHOR_CHARS {
        return Err(BlogError::InvalidInput(format!(
            "author must be at most {MAX_AUTHOR_CHARS} characters"
        )));
    }
    if comment.content.is_empty() {
        return Err(BlogError::InvalidInput("content must not be empty".into()));
    }
    if comment.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(BlogError::InvalidInput(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

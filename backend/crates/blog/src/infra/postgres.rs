//! PostgreSQL Repository Implementations

use crate::domain::entities::{
    AccessLog, Article, ArticleDraft, ArticleLock, ArticleThumbnail, Comment, CommentLink, IpBan, NewComment,
    Tag,
};
use crate::domain::repository::{
    AccessLogRepository, ArticleRepository, CommentRepository, IpBanRepository,
};
use crate::error::BlogResult;
use chrono::{DateTime, Utc};
use kernel::id::{ArticleId, CommentId, TagId};
use sqlx::{PgConnection, PgPool};

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgBlogRepository {
    pool: PgPool,
}

impl PgBlogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drop expired blacklist rows
    pub async fn cleanup_expired_bans(&self) -> BlogResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM ip_blacklist WHERE expire_time IS NOT NULL AND expire_time <= now()",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::info!(deleted = deleted, "Cleaned up expired IP bans");
        Ok(deleted)
    }
}

/// Re-link an article to exactly `names`, creating tags that do not exist yet
async fn replace_tags(conn: &mut PgConnection, article_id: i64, names: &[String]) -> BlogResult<()> {
    sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
        .bind(article_id)
        .execute(&mut *conn)
        .await?;

    for name in names {
        let tag_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(article_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

impl ArticleRepository for PgBlogRepository {
    async fn find_article(&self, id: ArticleId) -> BlogResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, content, category_id, views, word_num,
                   thumbnail_url, is_locked, created_at, updated_at
            FROM articles
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ArticleRow::into_article))
    }

    async fn find_article_tags(&self, id: ArticleId) -> BlogResult<Vec<Tag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN article_tags at ON at.tag_id = t.id
            WHERE at.article_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TagRow::into_tag).collect())
    }

    async fn find_article_lock(&self, id: ArticleId) -> BlogResult<Option<ArticleLock>> {
        let row = sqlx::query_as::<_, (bool, Option<String>)>(
            "SELECT is_locked, lock_password_hash FROM articles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(is_locked, password_hash)| ArticleLock {
            is_locked,
            password_hash,
        }))
    }

    async fn update_article_views(&self, id: ArticleId, views: i64) -> BlogResult<()> {
        sqlx::query("UPDATE articles SET views = $2 WHERE id = $1")
            .bind(id.get())
            .bind(views)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_published_thumbnails(&self) -> BlogResult<Vec<ArticleThumbnail>> {
        let rows = sqlx::query_as::<_, ThumbnailRow>(
            r#"
            SELECT id, title, thumbnail_url, created_at, views, word_num, is_locked
            FROM articles
            WHERE deleted_at IS NULL
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ThumbnailRow::into_thumbnail).collect())
    }

    async fn insert_article(
        &self,
        draft: &ArticleDraft,
        word_num: i64,
        lock_hash: Option<&str>,
    ) -> BlogResult<ArticleId> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO articles (
                title, content, category_id, word_num,
                thumbnail_url, is_locked, lock_password_hash
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.category_id)
        .bind(word_num)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_locked)
        .bind(lock_hash)
        .fetch_one(&mut *tx)
        .await?;

        replace_tags(&mut tx, id, &draft.normalized_tag_names()).await?;
        tx.commit().await?;

        Ok(ArticleId::new(id))
    }

    async fn update_article(
        &self,
        id: ArticleId,
        draft: &ArticleDraft,
        word_num: i64,
        lock_hash: Option<&str>,
    ) -> BlogResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET title = $2, content = $3, category_id = $4, word_num = $5,
                thumbnail_url = $6, is_locked = $7, lock_password_hash = $8,
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.get())
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.category_id)
        .bind(word_num)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_locked)
        .bind(lock_hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        replace_tags(&mut tx, id.get(), &draft.normalized_tag_names()).await?;
        tx.commit().await?;

        Ok(true)
    }
}

impl CommentRepository for PgBlogRepository {
    async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (
                article_id, author, email, content, is_public,
                parent_id, user_agent, is_admin
            ) VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
            RETURNING id, article_id, author, email, content, is_public,
                      parent_id, user_agent, is_admin, created_at
            "#,
        )
        .bind(comment.article_id.get())
        .bind(&comment.author)
        .bind(&comment.email)
        .bind(&comment.content)
        .bind(comment.parent_id.map(|p| p.get()))
        .bind(&comment.user_agent)
        .bind(comment.is_admin)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_comment())
    }

    async fn find_comment(&self, id: CommentId) -> BlogResult<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, article_id, author, email, content, is_public,
                   parent_id, user_agent, is_admin, created_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CommentRow::into_comment))
    }

    async fn list_public_comments(&self, article_id: ArticleId) -> BlogResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, article_id, author, email, content, is_public,
                   parent_id, user_agent, is_admin, created_at
            FROM comments
            WHERE article_id = $1 AND is_public
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(article_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    async fn list_comment_links(&self, article_id: ArticleId) -> BlogResult<Vec<CommentLink>> {
        let rows = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT id, parent_id FROM comments WHERE article_id = $1",
        )
        .bind(article_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, parent_id)| CommentLink {
                id: CommentId::new(id),
                parent_id: parent_id.map(CommentId::new),
            })
            .collect())
    }

    async fn delete_comments(&self, ids: &[CommentId]) -> BlogResult<u64> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn update_comment(
        &self,
        id: CommentId,
        content: &str,
        is_public: bool,
    ) -> BlogResult<bool> {
        let updated = sqlx::query(
            "UPDATE comments SET content = $2, is_public = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id.get())
        .bind(content)
        .bind(is_public)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }
}

impl AccessLogRepository for PgBlogRepository {
    async fn insert_access_log(&self, log: &AccessLog) -> BlogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_logs (ip_address, user_agent, request_url, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&log.ip_address)
        .bind(log.user_agent.as_deref())
        .bind(&log.request_url)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl IpBanRepository for PgBlogRepository {
    async fn is_ip_banned(&self, ip: &str, now: DateTime<Utc>) -> BlogResult<bool> {
        let banned = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM ip_blacklist
                WHERE ip_address = $1 AND (expire_time IS NULL OR expire_time > $2)
            )
            "#,
        )
        .bind(ip)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(banned)
    }

    async fn insert_ip_ban(&self, ban: &IpBan) -> BlogResult<()> {
        sqlx::query(
            "INSERT INTO ip_blacklist (ip_address, ban_reason, expire_time) VALUES ($1, $2, $3)",
        )
        .bind(&ban.ip_address)
        .bind(&ban.reason)
        .bind(ban.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_ip_bans(&self, ip: &str) -> BlogResult<u64> {
        let deleted = sqlx::query("DELETE FROM ip_blacklist WHERE ip_address = $1")
            .bind(ip)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}

// Row types for SQLx

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    content: String,
    category_id: Option<i64>,
    views: i64,
    word_num: i64,
    thumbnail_url: String,
    is_locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ArticleRow {
    fn into_article(self) -> Article {
        Article {
            id: ArticleId::new(self.id),
            title: self.title,
            content: self.content,
            category_id: self.category_id,
            views: self.views,
            word_num: self.word_num,
            thumbnail_url: self.thumbnail_url,
            is_locked: self.is_locked,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tags: Vec::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ThumbnailRow {
    id: i64,
    title: String,
    thumbnail_url: String,
    created_at: DateTime<Utc>,
    views: i64,
    word_num: i64,
    is_locked: bool,
}

impl ThumbnailRow {
    fn into_thumbnail(self) -> ArticleThumbnail {
        ArticleThumbnail {
            id: ArticleId::new(self.id),
            title: self.title,
            thumbnail_url: self.thumbnail_url,
            created_at: self.created_at,
            views: self.views,
            word_num: self.word_num,
            is_locked: self.is_locked,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
}

impl TagRow {
    fn into_tag(self) -> Tag {
        Tag {
            id: TagId::new(self.id),
            name: self.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: i64,
    author: String,
    email: String,
    content: String,
    is_public: bool,
    parent_id: Option<i64>,
    user_agent: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_comment(self) -> Comment {
        Comment {
            id: CommentId::new(self.id),
            article_id: ArticleId::new(self.article_id),
            author: self.author,
            email: self.email,
            content: self.content,
            is_public: self.is_public,
            parent_id: self.parent_id.map(CommentId::new),
            user_agent: self.user_agent,
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }
}

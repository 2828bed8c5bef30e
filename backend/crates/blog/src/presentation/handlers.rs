//! HTTP Handlers

use crate::application::article_cache::ArticleCache;
use crate::application::comments::CommentUseCase;
use crate::application::config::BlogConfig;
use crate::application::ip_guard::IpGuardUseCase;
use crate::application::unlock_article::UnlockArticleUseCase;
use crate::domain::entities::NewComment;
use crate::domain::repository::BlogRepository;
use crate::error::BlogResult;
use crate::presentation::dto::{
    ArticleResponse, CommentResponse, SubmitCommentRequest, ThumbnailPageQuery,
    ThumbnailPageResponse, UnlockArticleRequest,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use kernel::id::ArticleId;
use platform::kv::KeyValueStore;
use std::sync::Arc;

/// Shared state for blog handlers and middleware
pub struct BlogAppState<S, R> {
    pub store: Arc<S>,
    pub repo: Arc<R>,
    pub config: Arc<BlogConfig>,
}

impl<S, R> Clone for BlogAppState<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            repo: Arc::clone(&self.repo),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, R> BlogAppState<S, R>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    pub fn article_cache(&self) -> ArticleCache<S, R> {
        ArticleCache::new(self.store.clone(), self.repo.clone(), self.config.clone())
    }

    pub fn unlock_article(&self) -> UnlockArticleUseCase<S, R> {
        UnlockArticleUseCase::new(self.repo.clone(), self.article_cache())
    }

    pub fn comments(&self) -> CommentUseCase<R> {
        CommentUseCase::new(self.repo.clone())
    }

    pub fn ip_guard(&self) -> IpGuardUseCase<R> {
        IpGuardUseCase::new(self.repo.clone())
    }
}

/// GET /api/articles?page=&size=
pub async fn list_thumbnails<S, R>(
    State(state): State<BlogAppState<S, R>>,
    Query(query): Query<ThumbnailPageQuery>,
) -> BlogResult<Json<ThumbnailPageResponse>>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let page = state
        .article_cache()
        .get_thumbnail_page(query.size, query.page)
        .await?;

    Ok(Json(ThumbnailPageResponse::new(page, &query)))
}

/// GET /api/articles/{id}
pub async fn get_article<S, R>(
    State(state): State<BlogAppState<S, R>>,
    Path(id): Path<ArticleId>,
) -> BlogResult<Json<ArticleResponse>>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let article = state.article_cache().get_article(id).await?;
    Ok(Json(article.into()))
}

/// POST /api/articles/{id}/unlock
pub async fn unlock_article<S, R>(
    State(state): State<BlogAppState<S, R>>,
    Path(id): Path<ArticleId>,
    Json(req): Json<UnlockArticleRequest>,
) -> BlogResult<Json<ArticleResponse>>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let article = state.unlock_article().unlock(id, req.password).await?;
    Ok(Json(ArticleResponse::unlocked(article)))
}

/// GET /api/articles/{id}/comments
pub async fn list_comments<S, R>(
    State(state): State<BlogAppState<S, R>>,
    Path(article_id): Path<ArticleId>,
) -> BlogResult<Json<Vec<CommentResponse>>>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let tree = state.comments().list_tree(article_id).await?;
    Ok(Json(tree.into_iter().map(CommentResponse::from).collect()))
}

/// POST /api/articles/{id}/comments
pub async fn submit_comment<S, R>(
    State(state): State<BlogAppState<S, R>>,
    Path(article_id): Path<ArticleId>,
    headers: HeaderMap,
    Json(req): Json<SubmitCommentRequest>,
) -> BlogResult<(StatusCode, Json<CommentResponse>)>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let comment = state
        .comments()
        .submit(NewComment {
            article_id,
            author: req.author,
            email: req.email,
            content: req.content,
            parent_id: req.parent_id,
            user_agent,
            is_admin: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

//! Article Cache Use Case
//!
//! Cache-aside reads for article detail and the paginated thumbnail listing.
//!
//! An article is cached as a hash under `{prefix}{id}`. Every read bumps the
//! cached `views` field and writes the same value to the database, so the
//! database count stays authoritative. The listing lives in one sorted set
//! scored by article id, rebuilt from the database whenever it is missing.

use crate::application::config::{BlogConfig, CacheFailureMode};
use crate::domain::entities::{Article, ArticleThumbnail};
use crate::domain::repository::ArticleRepository;
use crate::error::{BlogError, BlogResult};
use kernel::id::ArticleId;
use platform::kv::KeyValueStore;
use std::sync::Arc;

/// One page of the listing
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailPage {
    pub items: Vec<ArticleThumbnail>,
    pub total_pages: u64,
}

/// Inclusive rank range covering page `page_num` (1-based)
fn page_bounds(page_size: u64, page_num: u64) -> BlogResult<(u64, u64)> {
    if page_size == 0 || page_num == 0 {
        return Err(BlogError::InvalidPage);
    }
    let end = page_num
        .checked_mul(page_size)
        .ok_or(BlogError::InvalidPage)?;
    Ok((end - page_size, end - 1))
}

fn rank(value: u64) -> BlogResult<isize> {
    isize::try_from(value).map_err(|_| BlogError::InvalidPage)
}

pub struct ArticleCache<S, R> {
    store: Arc<S>,
    repo: Arc<R>,
    config: Arc<BlogConfig>,
}

impl<S, R> Clone for ArticleCache<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            repo: Arc::clone(&self.repo),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, R> ArticleCache<S, R>
where
    S: KeyValueStore + Sync,
    R: ArticleRepository + Sync,
{
    pub fn new(store: Arc<S>, repo: Arc<R>, config: Arc<BlogConfig>) -> Self {
        Self {
            store,
            repo,
            config,
        }
    }

    /// Article detail with its view counted.
    ///
    /// Returns the article with `views` already incremented for this call.
    pub async fn get_article(&self, id: ArticleId) -> BlogResult<Article> {
        match self.get_article_cached(id).await {
            Err(BlogError::CacheUnavailable(e))
                if self.config.cache_failure == CacheFailureMode::BypassToDatabase =>
            {
                tracing::warn!(article_id = %id, error = %e, "Cache unavailable, reading article from database");
                let mut article = self.load_article(id).await?;
                article.views += 1;
                self.repo.update_article_views(id, article.views).await?;
                Ok(article)
            }
            result => result,
        }
    }

    async fn get_article_cached(&self, id: ArticleId) -> BlogResult<Article> {
        let key = self.config.article_key(id);
        let mut article = self.cached_article(id, &key).await?;

        article.views += 1;
        let views = article.views.to_string();
        self.store.hash_set(&key, "views", &views).await?;
        self.repo.update_article_views(id, article.views).await?;

        Ok(article)
    }

    /// Article detail without counting a view
    pub async fn read_article(&self, id: ArticleId) -> BlogResult<Article> {
        let key = self.config.article_key(id);
        match self.cached_article(id, &key).await {
            Err(BlogError::CacheUnavailable(e))
                if self.config.cache_failure == CacheFailureMode::BypassToDatabase =>
            {
                tracing::warn!(article_id = %id, error = %e, "Cache unavailable, reading article from database");
                self.load_article(id).await
            }
            result => result,
        }
    }

    async fn cached_article(&self, id: ArticleId, key: &str) -> BlogResult<Article> {
        match self.read_cached_article(key).await? {
            Some(article) => Ok(article),
            None => self.populate_article(id, key).await,
        }
    }

    /// A hash that no longer decodes is dropped so the caller repopulates it
    async fn read_cached_article(&self, key: &str) -> BlogResult<Option<Article>> {
        let fields = self.store.hash_get_all(key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        match Article::from_fields(&fields) {
            Ok(article) => Ok(Some(article)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                self.store.delete(&[key]).await?;
                Ok(None)
            }
        }
    }

    async fn populate_article(&self, id: ArticleId, key: &str) -> BlogResult<Article> {
        let article = self.load_article(id).await?;
        self.store.hash_set_all(key, &article.to_fields()?).await?;
        tracing::debug!(article_id = %id, "Article cached");
        Ok(article)
    }

    async fn load_article(&self, id: ArticleId) -> BlogResult<Article> {
        let mut article = self
            .repo
            .find_article(id)
            .await?
            .ok_or(BlogError::ArticleNotFound(id))?;
        article.tags = self.repo.find_article_tags(id).await?;
        Ok(article)
    }

    /// Page `page_num` (1-based) of the listing, newest article first.
    pub async fn get_thumbnail_page(&self, page_size: u64, page_num: u64) -> BlogResult<ThumbnailPage> {
        let bounds = page_bounds(page_size, page_num)?;

        match self.thumbnail_page_cached(page_size, bounds).await {
            Err(BlogError::CacheUnavailable(e))
                if self.config.cache_failure == CacheFailureMode::BypassToDatabase =>
            {
                tracing::warn!(error = %e, "Cache unavailable, listing articles from database");
                let all = self.repo.list_published_thumbnails().await?;
                let total_pages = (all.len() as u64).div_ceil(page_size);
                let items = all
                    .into_iter()
                    .skip(bounds.0 as usize)
                    .take(page_size as usize)
                    .collect();
                Ok(ThumbnailPage { items, total_pages })
            }
            result => result,
        }
    }

    async fn thumbnail_page_cached(
        &self,
        page_size: u64,
        (start, stop): (u64, u64),
    ) -> BlogResult<ThumbnailPage> {
        let key = &self.config.thumbnail_index_key;

        if !self.store.exists(key).await? {
            self.rebuild_thumbnail_index().await?;
        }

        let total_pages = self.store.sorted_set_card(key).await?.div_ceil(page_size);
        let members = self
            .store
            .sorted_set_rev_range(key, rank(start)?, rank(stop)?)
            .await?;
        let items = match members
            .iter()
            .map(|member| serde_json::from_str(member))
            .collect::<Result<Vec<ArticleThumbnail>, _>>()
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable thumbnail index");
                self.store.delete(&[key.as_str()]).await?;
                return Err(BlogError::CacheCorrupted(key.clone()));
            }
        };

        Ok(ThumbnailPage { items, total_pages })
    }

    async fn rebuild_thumbnail_index(&self) -> BlogResult<()> {
        let thumbnails = self.repo.list_published_thumbnails().await?;
        let members = thumbnails
            .iter()
            .map(|t| Ok((t.id.get() as f64, serde_json::to_string(t)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        self.store
            .sorted_set_add_all(
                &self.config.thumbnail_index_key,
                &members,
                Some(self.config.thumbnail_ttl),
            )
            .await?;

        tracing::info!(count = members.len(), "Thumbnail index rebuilt");
        Ok(())
    }

    /// Drop the article entry and the listing; the next reads rebuild both.
    pub async fn invalidate_article(&self, id: ArticleId) -> BlogResult<()> {
        let key = self.config.article_key(id);
        let deleted = self
            .store
            .delete(&[key.as_str(), self.config.thumbnail_index_key.as_str()])
            .await?;
        tracing::debug!(article_id = %id, deleted = deleted, "Article cache invalidated");
        Ok(())
    }
}

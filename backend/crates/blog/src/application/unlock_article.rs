//! Unlock Article Use Case

use crate::application::article_cache::ArticleCache;
use crate::domain::entities::Article;
use crate::domain::repository::ArticleRepository;
use crate::error::{BlogError, BlogResult};
use kernel::id::ArticleId;
use platform::kv::KeyValueStore;
use platform::password::{ClearTextPassword, HashedPassword};
use std::sync::Arc;

/// Reveals a locked article to callers holding its password
pub struct UnlockArticleUseCase<S, R> {
    repo: Arc<R>,
    cache: ArticleCache<S, R>,
}

impl<S, R> UnlockArticleUseCase<S, R>
where
    S: KeyValueStore + Sync,
    R: ArticleRepository + Sync,
{
    pub fn new(repo: Arc<R>, cache: ArticleCache<S, R>) -> Self {
        Self { repo, cache }
    }

    /// The full article when `password` matches the stored lock hash.
    ///
    /// Does not count a view.
    pub async fn unlock(&self, id: ArticleId, password: String) -> BlogResult<Article> {
        let lock = self
            .repo
            .find_article_lock(id)
            .await?
            .ok_or(BlogError::ArticleNotFound(id))?;
        if !lock.is_locked {
            return Err(BlogError::ArticleNotLocked(id));
        }

        let Ok(password) = ClearTextPassword::new(password) else {
            return Err(BlogError::WrongArticlePassword);
        };
        let verified = match lock.password_hash {
            Some(hash) => HashedPassword::from_phc_string(hash)
                .map_err(|e| BlogError::Internal(format!("article {id} lock hash: {e}")))?
                .verify(&password),
            None => {
                tracing::warn!(article_id = %id, "Locked article has no password hash");
                false
            }
        };
        if !verified {
            return Err(BlogError::WrongArticlePassword);
        }

        tracing::info!(article_id = %id, "Article unlocked");
        self.cache.read_article(id).await
    }
}

//! Publish Article Use Case

use crate::application::article_cache::ArticleCache;
use crate::domain::entities::{ArticleDraft, count_words};
use crate::domain::repository::ArticleRepository;
use crate::error::{BlogError, BlogResult};
use kernel::id::ArticleId;
use platform::kv::KeyValueStore;
use platform::password::ClearTextPassword;
use std::sync::Arc;

/// Creates and edits articles, keeping the cache coherent with each write
pub struct PublishArticleUseCase<S, R> {
    repo: Arc<R>,
    cache: ArticleCache<S, R>,
}

impl<S, R> PublishArticleUseCase<S, R>
where
    S: KeyValueStore + Sync,
    R: ArticleRepository + Sync,
{
    pub fn new(repo: Arc<R>, cache: ArticleCache<S, R>) -> Self {
        Self { repo, cache }
    }

    pub async fn create_article(&self, draft: ArticleDraft) -> BlogResult<ArticleId> {
        validate(&draft)?;
        let lock_hash = hash_lock_password(&draft)?;

        let id = self
            .repo
            .insert_article(&draft, count_words(&draft.content), lock_hash.as_deref())
            .await?;
        self.cache.invalidate_article(id).await?;

        tracing::info!(article_id = %id, title = %draft.title, "Article published");
        Ok(id)
    }

    pub async fn update_article(&self, id: ArticleId, draft: ArticleDraft) -> BlogResult<()> {
        validate(&draft)?;
        let lock_hash = hash_lock_password(&draft)?;

        let found = self
            .repo
            .update_article(id, &draft, count_words(&draft.content), lock_hash.as_deref())
            .await?;
        if !found {
            return Err(BlogError::ArticleNotFound(id));
        }
        self.cache.invalidate_article(id).await?;

        tracing::info!(article_id = %id, "Article updated");
        Ok(())
    }
}

fn validate(draft: &ArticleDraft) -> BlogResult<()> {
    if draft.title.trim().is_empty() {
        return Err(BlogError::InvalidInput("title must not be empty".into()));
    }
    if draft.is_locked && draft.lock_password.as_deref().is_none_or(str::is_empty) {
        return Err(BlogError::InvalidInput(
            "locked articles need a password".into(),
        ));
    }
    Ok(())
}

/// Argon2id PHC string for a locked draft; unlocked drafts store none
fn hash_lock_password(draft: &ArticleDraft) -> BlogResult<Option<String>> {
    let Some(raw) = draft.lock_password.as_ref().filter(|_| draft.is_locked) else {
        return Ok(None);
    };

    let password = ClearTextPassword::new(raw.clone())
        .map_err(|e| BlogError::InvalidInput(format!("lock password: {e}")))?;
    let hashed = password
        .hash()
        .map_err(|e| BlogError::Internal(e.to_string()))?;

    Ok(Some(hashed.as_phc_string().to_string()))
}

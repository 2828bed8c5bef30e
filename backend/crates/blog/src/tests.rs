//! Unit tests for blog crate
//!
//! Use cases and the router run against `MemoryStore` and the in-memory
//! repository below.

#[cfg(test)]
mod support {
    use crate::domain::entities::{
        AccessLog, Article, ArticleDraft, ArticleLock, ArticleThumbnail, Comment, CommentLink,
        IpBan, NewComment, Tag,
    };
    use crate::domain::repository::{
        AccessLogRepository, ArticleRepository, CommentRepository, IpBanRepository,
    };
    use crate::error::BlogResult;
    use chrono::{DateTime, Utc};
    use kernel::id::{ArticleId, CommentId, TagId};
    use platform::kv::{KeyValueStore, StoreError, StoreResult};
    use platform::password::ClearTextPassword;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    pub struct StoredArticle {
        pub article: Article,
        pub published: bool,
        pub lock_hash: Option<String>,
    }

    #[derive(Default)]
    pub struct Data {
        pub articles: HashMap<i64, StoredArticle>,
        pub comments: Vec<Comment>,
        pub access_logs: Vec<AccessLog>,
        pub bans: Vec<IpBan>,
        /// `find_article` calls
        pub article_loads: usize,
        pub next_comment_id: i64,
    }

    #[derive(Default)]
    pub struct FakeRepo {
        pub data: Mutex<Data>,
        /// Signalled after every access log insert
        pub access_logged: Notify,
    }

    pub fn article(id: i64) -> Article {
        let now = Utc::now();
        Article {
            id: ArticleId::new(id),
            title: format!("Article {id}"),
            content: "some words here".to_string(),
            category_id: Some(1),
            views: 10,
            word_num: 3,
            thumbnail_url: format!("https://cdn.example/{id}.png"),
            is_locked: false,
            created_at: now,
            updated_at: now,
            tags: vec![Tag {
                id: TagId::new(1),
                name: "rust".to_string(),
            }],
        }
    }

    impl FakeRepo {
        pub fn with_articles(count: i64) -> Self {
            let repo = Self::default();
            for id in 1..=count {
                repo.insert_stored(article(id), true);
            }
            repo
        }

        pub fn insert_stored(&self, article: Article, published: bool) {
            self.data.lock().unwrap().articles.insert(
                article.id.get(),
                StoredArticle {
                    article,
                    published,
                    lock_hash: None,
                },
            );
        }

        /// Published article locked behind `password`
        pub fn insert_locked(&self, id: i64, password: &str) {
            let hash = ClearTextPassword::new(password.to_string())
                .unwrap()
                .hash()
                .unwrap();
            self.data.lock().unwrap().articles.insert(
                id,
                StoredArticle {
                    article: Article {
                        is_locked: true,
                        content: "members only".to_string(),
                        ..article(id)
                    },
                    published: true,
                    lock_hash: Some(hash.as_phc_string().to_string()),
                },
            );
        }

        pub fn lock_hash(&self, id: i64) -> Option<String> {
            self.data.lock().unwrap().articles[&id].lock_hash.clone()
        }

        pub fn stored(&self, id: i64) -> Article {
            self.data.lock().unwrap().articles[&id].article.clone()
        }

        pub fn article_loads(&self) -> usize {
            self.data.lock().unwrap().article_loads
        }

        pub fn access_log_count(&self) -> usize {
            self.data.lock().unwrap().access_logs.len()
        }

        pub fn add_ban(&self, ip: &str, expires_at: Option<DateTime<Utc>>) {
            self.data.lock().unwrap().bans.push(IpBan {
                ip_address: ip.to_string(),
                reason: "test".to_string(),
                expires_at,
            });
        }
    }

    fn tags_for(names: Vec<String>) -> Vec<Tag> {
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Tag {
                id: TagId::new(i as i64 + 1),
                name,
            })
            .collect()
    }

    impl ArticleRepository for FakeRepo {
        async fn find_article(&self, id: ArticleId) -> BlogResult<Option<Article>> {
            let mut data = self.data.lock().unwrap();
            data.article_loads += 1;
            Ok(data
                .articles
                .get(&id.get())
                .filter(|s| s.published)
                .map(|s| Article {
                    tags: Vec::new(),
                    ..s.article.clone()
                }))
        }

        async fn find_article_tags(&self, id: ArticleId) -> BlogResult<Vec<Tag>> {
            let data = self.data.lock().unwrap();
            Ok(data
                .articles
                .get(&id.get())
                .map(|s| s.article.tags.clone())
                .unwrap_or_default())
        }

        async fn find_article_lock(&self, id: ArticleId) -> BlogResult<Option<ArticleLock>> {
            let data = self.data.lock().unwrap();
            Ok(data
                .articles
                .get(&id.get())
                .filter(|s| s.published)
                .map(|s| ArticleLock {
                    is_locked: s.article.is_locked,
                    password_hash: s.lock_hash.clone(),
                }))
        }

        async fn update_article_views(&self, id: ArticleId, views: i64) -> BlogResult<()> {
            if let Some(stored) = self.data.lock().unwrap().articles.get_mut(&id.get()) {
                stored.article.views = views;
            }
            Ok(())
        }

        async fn list_published_thumbnails(&self) -> BlogResult<Vec<ArticleThumbnail>> {
            let data = self.data.lock().unwrap();
            let mut thumbnails: Vec<ArticleThumbnail> = data
                .articles
                .values()
                .filter(|s| s.published)
                .map(|s| ArticleThumbnail {
                    id: s.article.id,
                    title: s.article.title.clone(),
                    thumbnail_url: s.article.thumbnail_url.clone(),
                    created_at: s.article.created_at,
                    views: s.article.views,
                    word_num: s.article.word_num,
                    is_locked: s.article.is_locked,
                })
                .collect();
            thumbnails.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(thumbnails)
        }

        async fn insert_article(
            &self,
            draft: &ArticleDraft,
            word_num: i64,
            lock_hash: Option<&str>,
        ) -> BlogResult<ArticleId> {
            let mut data = self.data.lock().unwrap();
            let id = data.articles.keys().max().copied().unwrap_or(0) + 1;
            let now = Utc::now();
            let article = Article {
                id: ArticleId::new(id),
                title: draft.title.clone(),
                content: draft.content.clone(),
                category_id: draft.category_id,
                views: 0,
                word_num,
                thumbnail_url: draft.thumbnail_url.clone(),
                is_locked: draft.is_locked,
                created_at: now,
                updated_at: now,
                tags: tags_for(draft.normalized_tag_names()),
            };
            data.articles.insert(
                id,
                StoredArticle {
                    article,
                    published: true,
                    lock_hash: lock_hash.map(str::to_string),
                },
            );
            Ok(ArticleId::new(id))
        }

        async fn update_article(
            &self,
            id: ArticleId,
            draft: &ArticleDraft,
            word_num: i64,
            lock_hash: Option<&str>,
        ) -> BlogResult<bool> {
            let mut data = self.data.lock().unwrap();
            let Some(stored) = data.articles.get_mut(&id.get()).filter(|s| s.published) else {
                return Ok(false);
            };
            let article = &mut stored.article;
            article.title = draft.title.clone();
            article.content = draft.content.clone();
            article.category_id = draft.category_id;
            article.word_num = word_num;
            article.thumbnail_url = draft.thumbnail_url.clone();
            article.is_locked = draft.is_locked;
            article.updated_at = Utc::now();
            article.tags = tags_for(draft.normalized_tag_names());
            stored.lock_hash = lock_hash.map(str::to_string);
            Ok(true)
        }
    }

    impl CommentRepository for FakeRepo {
        async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment> {
            let mut data = self.data.lock().unwrap();
            data.next_comment_id += 1;
            let saved = Comment {
                id: CommentId::new(data.next_comment_id),
                article_id: comment.article_id,
                author: comment.author.clone(),
                email: comment.email.clone(),
                content: comment.content.clone(),
                is_public: true,
                parent_id: comment.parent_id,
                user_agent: comment.user_agent.clone(),
                is_admin: comment.is_admin,
                created_at: Utc::now(),
            };
            data.comments.push(saved.clone());
            Ok(saved)
        }

        async fn find_comment(&self, id: CommentId) -> BlogResult<Option<Comment>> {
            let data = self.data.lock().unwrap();
            Ok(data.comments.iter().find(|c| c.id == id).cloned())
        }

        async fn list_public_comments(&self, article_id: ArticleId) -> BlogResult<Vec<Comment>> {
            let data = self.data.lock().unwrap();
            let mut comments: Vec<Comment> = data
                .comments
                .iter()
                .filter(|c| c.article_id == article_id && c.is_public)
                .cloned()
                .collect();
            comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(comments)
        }

        async fn list_comment_links(&self, article_id: ArticleId) -> BlogResult<Vec<CommentLink>> {
            let data = self.data.lock().unwrap();
            Ok(data
                .comments
                .iter()
                .filter(|c| c.article_id == article_id)
                .map(|c| CommentLink {
                    id: c.id,
                    parent_id: c.parent_id,
                })
                .collect())
        }

        async fn delete_comments(&self, ids: &[CommentId]) -> BlogResult<u64> {
            let mut data = self.data.lock().unwrap();
            let before = data.comments.len();
            data.comments.retain(|c| !ids.contains(&c.id));
            Ok((before - data.comments.len()) as u64)
        }

        async fn update_comment(
            &self,
            id: CommentId,
            content: &str,
            is_public: bool,
        ) -> BlogResult<bool> {
            let mut data = self.data.lock().unwrap();
            match data.comments.iter_mut().find(|c| c.id == id) {
                Some(comment) => {
                    comment.content = content.to_string();
                    comment.is_public = is_public;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    impl AccessLogRepository for FakeRepo {
        async fn insert_access_log(&self, log: &AccessLog) -> BlogResult<()> {
            self.data.lock().unwrap().access_logs.push(log.clone());
            self.access_logged.notify_one();
            Ok(())
        }
    }

    impl IpBanRepository for FakeRepo {
        async fn is_ip_banned(&self, ip: &str, now: DateTime<Utc>) -> BlogResult<bool> {
            let data = self.data.lock().unwrap();
            Ok(data
                .bans
                .iter()
                .any(|b| b.ip_address == ip && b.is_active(now)))
        }

        async fn insert_ip_ban(&self, ban: &IpBan) -> BlogResult<()> {
            self.data.lock().unwrap().bans.push(ban.clone());
            Ok(())
        }

        async fn delete_ip_bans(&self, ip: &str) -> BlogResult<u64> {
            let mut data = self.data.lock().unwrap();
            let before = data.bans.len();
            data.bans.retain(|b| b.ip_address != ip);
            Ok((before - data.bans.len()) as u64)
        }
    }

    /// Store whose every call fails like a dropped Redis connection
    pub struct DownStore;

    fn down() -> StoreError {
        StoreError::Backend(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(down())
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<()> {
            Err(down())
        }

        async fn delete(&self, _keys: &[&str]) -> StoreResult<u64> {
            Err(down())
        }

        async fn exists(&self, _key: &str) -> StoreResult<bool> {
            Err(down())
        }

        async fn incr_if_exists(&self, _key: &str) -> StoreResult<Option<i64>> {
            Err(down())
        }

        async fn hash_set_all(&self, _key: &str, _fields: &[(String, String)]) -> StoreResult<()> {
            Err(down())
        }

        async fn hash_get_all(&self, _key: &str) -> StoreResult<HashMap<String, String>> {
            Err(down())
        }

        async fn hash_set(&self, _key: &str, _field: &str, _value: &str) -> StoreResult<()> {
            Err(down())
        }

        async fn sorted_set_add_all(
            &self,
            _key: &str,
            _members: &[(f64, String)],
            _ttl: Option<Duration>,
        ) -> StoreResult<()> {
            Err(down())
        }

        async fn sorted_set_card(&self, _key: &str) -> StoreResult<u64> {
            Err(down())
        }

        async fn sorted_set_rev_range(
            &self,
            _key: &str,
            _start: isize,
            _stop: isize,
        ) -> StoreResult<Vec<String>> {
            Err(down())
        }
    }
}

#[cfg(test)]
mod article_cache_tests {
    use super::support::*;
    use crate::application::article_cache::ArticleCache;
    use crate::application::config::{BlogConfig, CacheFailureMode};
    use crate::application::publish_article::PublishArticleUseCase;
    use crate::domain::entities::{Article, ArticleDraft};
    use crate::error::BlogError;
    use kernel::id::ArticleId;
    use platform::kv::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn cache(repo: &Arc<FakeRepo>) -> (Arc<MemoryStore>, ArticleCache<MemoryStore, FakeRepo>) {
        let store = Arc::new(MemoryStore::new());
        let cache = ArticleCache::new(
            store.clone(),
            repo.clone(),
            Arc::new(BlogConfig::default()),
        );
        (store, cache)
    }

    fn same_except_views(a: &Article, b: &Article) -> bool {
        Article { views: 0, ..a.clone() } == Article { views: 0, ..b.clone() }
    }

    #[tokio::test]
    async fn test_detail_counts_every_view_and_loads_once() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let (_, cache) = cache(&repo);
        let stored = repo.stored(1);

        let first = cache.get_article(ArticleId::new(1)).await.unwrap();
        let second = cache.get_article(ArticleId::new(1)).await.unwrap();

        assert_eq!(first.views, stored.views + 1);
        assert_eq!(second.views, stored.views + 2);
        assert!(same_except_views(&first, &stored));
        assert!(same_except_views(&second, &stored));
        assert_eq!(repo.article_loads(), 1, "second read must be served from cache");
        assert_eq!(repo.stored(1).views, stored.views + 2);
    }

    #[tokio::test]
    async fn test_missing_and_unpublished_articles() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let mut hidden = article(2);
        hidden.title = "Draft".into();
        repo.insert_stored(hidden, false);
        let (store, cache) = cache(&repo);

        let err = cache.get_article(ArticleId::new(99)).await.unwrap_err();
        assert!(matches!(err, BlogError::ArticleNotFound(id) if id.get() == 99));

        let err = cache.get_article(ArticleId::new(2)).await.unwrap_err();
        assert!(matches!(err, BlogError::ArticleNotFound(_)));
        assert!(!store.exists("article:2").await.unwrap());
    }

    #[tokio::test]
    async fn test_edit_is_visible_after_invalidation() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let (_, cache) = cache(&repo);
        let publish = PublishArticleUseCase::new(repo.clone(), cache.clone());

        cache.get_article(ArticleId::new(1)).await.unwrap();
        publish
            .update_article(
                ArticleId::new(1),
                ArticleDraft {
                    title: "Rewritten".into(),
                    content: "a b c d e".into(),
                    tag_names: vec!["redis".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let article = cache.get_article(ArticleId::new(1)).await.unwrap();
        assert_eq!(article.title, "Rewritten");
        assert_eq!(article.word_num, 5);
        assert_eq!(article.tags.len(), 1);
        assert_eq!(article.tags[0].name, "redis");
        assert_eq!(repo.article_loads(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_repopulated() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let (store, cache) = cache(&repo);

        cache.get_article(ArticleId::new(1)).await.unwrap();
        store.hash_set("article:1", "views", "lots").await.unwrap();

        let article = cache.get_article(ArticleId::new(1)).await.unwrap();
        assert_eq!(article.views, 12);
        assert_eq!(repo.article_loads(), 2);
    }

    #[tokio::test]
    async fn test_thumbnail_pages_cover_listing_once() {
        let repo = Arc::new(FakeRepo::with_articles(25));
        let (_, cache) = cache(&repo);

        let mut seen = Vec::new();
        for page_num in 1..=3 {
            let page = cache.get_thumbnail_page(10, page_num).await.unwrap();
            assert_eq!(page.total_pages, 3);
            seen.extend(page.items.iter().map(|t| t.id.get()));
        }
        assert_eq!(seen, (1..=25).rev().collect::<Vec<_>>());

        let beyond = cache.get_thumbnail_page(10, 4).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_pages, 3);
    }

    #[tokio::test]
    async fn test_thumbnail_page_validation_and_empty_listing() {
        let repo = Arc::new(FakeRepo::default());
        let (_, cache) = cache(&repo);

        assert!(matches!(
            cache.get_thumbnail_page(0, 1).await,
            Err(BlogError::InvalidPage)
        ));
        assert!(matches!(
            cache.get_thumbnail_page(10, 0).await,
            Err(BlogError::InvalidPage)
        ));

        let page = cache.get_thumbnail_page(10, 1).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_new_article_tops_listing() {
        let repo = Arc::new(FakeRepo::with_articles(3));
        let (store, cache) = cache(&repo);
        let publish = PublishArticleUseCase::new(repo.clone(), cache.clone());

        let before = cache.get_thumbnail_page(10, 1).await.unwrap();
        assert_eq!(before.items.len(), 3);
        assert!(store.exists("article:thumbnails").await.unwrap());

        let id = publish
            .create_article(ArticleDraft {
                title: "Fresh".into(),
                content: "brand new post".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!store.exists("article:thumbnails").await.unwrap());

        let after = cache.get_thumbnail_page(10, 1).await.unwrap();
        assert_eq!(after.items.len(), 4);
        assert_eq!(after.items[0].id, id);
        assert_eq!(after.items[0].word_num, 3);
    }

    #[tokio::test]
    async fn test_corrupt_thumbnail_index_is_dropped_and_rebuilt() {
        let repo = Arc::new(FakeRepo::with_articles(2));
        let (store, cache) = cache(&repo);
        store
            .sorted_set_add_all("article:thumbnails", &[(9.0, "not json".to_string())], None)
            .await
            .unwrap();

        let err = cache.get_thumbnail_page(10, 1).await.unwrap_err();
        assert!(matches!(err, BlogError::CacheCorrupted(_)));
        assert!(!store.exists("article:thumbnails").await.unwrap());

        let page = cache.get_thumbnail_page(10, 1).await.unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_by_default() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let cache = ArticleCache::new(
            Arc::new(DownStore),
            repo.clone(),
            Arc::new(BlogConfig::default()),
        );

        let err = cache.get_article(ArticleId::new(1)).await.unwrap_err();
        assert!(matches!(err, BlogError::CacheUnavailable(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_store_failure_bypasses_to_database_when_configured() {
        let repo = Arc::new(FakeRepo::with_articles(12));
        let config = BlogConfig {
            cache_failure: CacheFailureMode::BypassToDatabase,
            ..Default::default()
        };
        let cache = ArticleCache::new(Arc::new(DownStore), repo.clone(), Arc::new(config));

        let article = cache.get_article(ArticleId::new(1)).await.unwrap();
        assert_eq!(article.views, 11);
        assert_eq!(article.tags.len(), 1);
        assert_eq!(repo.stored(1).views, 11);

        let page = cache.get_thumbnail_page(5, 3).await.unwrap();
        assert_eq!(page.total_pages, 3);
        let ids: Vec<i64> = page.items.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}

#[cfg(test)]
mod publish_tests {
    use super::support::*;
    use crate::application::article_cache::ArticleCache;
    use crate::application::config::BlogConfig;
    use crate::application::publish_article::PublishArticleUseCase;
    use crate::domain::entities::ArticleDraft;
    use crate::error::BlogError;
    use kernel::id::ArticleId;
    use platform::kv::MemoryStore;
    use std::sync::Arc;

    fn publish(repo: &Arc<FakeRepo>) -> PublishArticleUseCase<MemoryStore, FakeRepo> {
        let cache = ArticleCache::new(
            Arc::new(MemoryStore::new()),
            repo.clone(),
            Arc::new(BlogConfig::default()),
        );
        PublishArticleUseCase::new(repo.clone(), cache)
    }

    #[tokio::test]
    async fn test_create_counts_words_and_dedupes_tags() {
        let repo = Arc::new(FakeRepo::default());
        let id = publish(&repo)
            .create_article(ArticleDraft {
                title: "Hello".into(),
                content: "  one two\tthree\n".into(),
                tag_names: vec!["rust".into(), " rust ".into(), "axum".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let stored = repo.stored(id.get());
        assert_eq!(stored.word_num, 3);
        let names: Vec<&str> = stored.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "axum"]);
    }

    #[tokio::test]
    async fn test_invalid_drafts_are_rejected() {
        let repo = Arc::new(FakeRepo::default());
        let publish = publish(&repo);

        let blank = publish
            .create_article(ArticleDraft {
                title: "   ".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(blank, Err(BlogError::InvalidInput(_))));

        let locked = publish
            .create_article(ArticleDraft {
                title: "Secret".into(),
                is_locked: true,
                ..Default::default()
            })
            .await;
        assert!(matches!(locked, Err(BlogError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_lock_password_is_stored_hashed() {
        let repo = Arc::new(FakeRepo::default());
        let publish = publish(&repo);

        let id = publish
            .create_article(ArticleDraft {
                title: "Secret".into(),
                is_locked: true,
                lock_password: Some("open sesame".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let hash = repo.lock_hash(id.get()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("open sesame"));

        publish
            .update_article(
                id,
                ArticleDraft {
                    title: "Public now".into(),
                    lock_password: Some("ignored".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(repo.lock_hash(id.get()), None);
    }

    #[tokio::test]
    async fn test_update_missing_article() {
        let repo = Arc::new(FakeRepo::default());
        let err = publish(&repo)
            .update_article(
                ArticleId::new(404),
                ArticleDraft {
                    title: "Nope".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::ArticleNotFound(_)));
    }
}

#[cfg(test)]
mod unlock_tests {
    use super::support::*;
    use crate::application::article_cache::ArticleCache;
    use crate::application::config::BlogConfig;
    use crate::application::unlock_article::UnlockArticleUseCase;
    use crate::error::BlogError;
    use kernel::id::ArticleId;
    use platform::kv::MemoryStore;
    use std::sync::Arc;

    fn unlocker(repo: &Arc<FakeRepo>) -> UnlockArticleUseCase<MemoryStore, FakeRepo> {
        let cache = ArticleCache::new(
            Arc::new(MemoryStore::new()),
            repo.clone(),
            Arc::new(BlogConfig::default()),
        );
        UnlockArticleUseCase::new(repo.clone(), cache)
    }

    #[tokio::test]
    async fn test_right_password_reveals_article_without_counting_a_view() {
        let repo = Arc::new(FakeRepo::default());
        repo.insert_locked(1, "open sesame");

        let article = unlocker(&repo)
            .unlock(ArticleId::new(1), "open sesame".into())
            .await
            .unwrap();
        assert_eq!(article.content, "members only");
        assert!(article.is_locked);
        assert_eq!(article.views, 10);
        assert_eq!(repo.stored(1).views, 10);
    }

    #[tokio::test]
    async fn test_wrong_or_blank_password_is_refused() {
        let repo = Arc::new(FakeRepo::default());
        repo.insert_locked(1, "open sesame");
        let unlocker = unlocker(&repo);

        for attempt in ["open sesame!", "OPEN SESAME", ""] {
            let err = unlocker
                .unlock(ArticleId::new(1), attempt.into())
                .await
                .unwrap_err();
            assert!(matches!(err, BlogError::WrongArticlePassword), "{attempt:?}");
        }
    }

    #[tokio::test]
    async fn test_unlocking_open_or_missing_articles() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let unlocker = unlocker(&repo);

        assert!(matches!(
            unlocker.unlock(ArticleId::new(1), "anything".into()).await,
            Err(BlogError::ArticleNotLocked(_))
        ));
        assert!(matches!(
            unlocker.unlock(ArticleId::new(7), "anything".into()).await,
            Err(BlogError::ArticleNotFound(_))
        ));
    }
}

#[cfg(test)]
mod comment_tests {
    use super::support::*;
    use crate::application::comments::CommentUseCase;
    use crate::domain::entities::{Comment, NewComment};
    use crate::error::BlogError;
    use kernel::id::{ArticleId, CommentId};
    use std::sync::Arc;

    fn new_comment(article: i64, parent: Option<&Comment>, text: &str) -> NewComment {
        NewComment {
            article_id: ArticleId::new(article),
            author: "reader".into(),
            email: "reader@example.com".into(),
            content: text.into(),
            parent_id: parent.map(|p| p.id),
            user_agent: "test".into(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_submitted_replies_form_a_tree() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let comments = CommentUseCase::new(repo);

        let root = comments.submit(new_comment(1, None, "first")).await.unwrap();
        let reply = comments
            .submit(new_comment(1, Some(&root), "reply"))
            .await
            .unwrap();
        comments
            .submit(new_comment(1, Some(&reply), "nested"))
            .await
            .unwrap();

        let tree = comments.list_tree(ArticleId::new(1)).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.content, "first");
        assert_eq!(tree[0].children[0].comment.content, "reply");
        assert_eq!(tree[0].children[0].children[0].comment.content, "nested");
    }

    #[tokio::test]
    async fn test_reply_parent_must_exist_on_same_article() {
        let repo = Arc::new(FakeRepo::with_articles(2));
        let comments = CommentUseCase::new(repo);

        let other = comments.submit(new_comment(2, None, "elsewhere")).await.unwrap();
        let err = comments
            .submit(new_comment(1, Some(&other), "cross-thread"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::CommentNotFound(_)));

        let mut orphan = new_comment(1, None, "orphan");
        orphan.parent_id = Some(CommentId::new(999));
        assert!(matches!(
            comments.submit(orphan).await,
            Err(BlogError::CommentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_needs_published_article() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        repo.insert_stored(article(2), false);
        let comments = CommentUseCase::new(repo);

        for missing in [2, 3] {
            assert!(matches!(
                comments.submit(new_comment(missing, None, "hello")).await,
                Err(BlogError::ArticleNotFound(id)) if id.get() == missing
            ));
        }
        assert!(comments.submit(new_comment(1, None, "hello")).await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_fields_are_rejected() {
        let comments = CommentUseCase::new(Arc::new(FakeRepo::default()));

        let mut blank_author = new_comment(1, None, "text");
        blank_author.author = "  ".into();
        assert!(matches!(
            comments.submit(blank_author).await,
            Err(BlogError::InvalidInput(_))
        ));

        assert!(matches!(
            comments.submit(new_comment(1, None, " \n ")).await,
            Err(BlogError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_recursive_delete_removes_only_the_subtree() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let comments = CommentUseCase::new(repo.clone());

        let root = comments.submit(new_comment(1, None, "root")).await.unwrap();
        let keep = comments.submit(new_comment(1, None, "keep")).await.unwrap();
        let child = comments
            .submit(new_comment(1, Some(&root), "child"))
            .await
            .unwrap();
        comments
            .submit(new_comment(1, Some(&child), "grandchild"))
            .await
            .unwrap();
        comments
            .submit(new_comment(1, Some(&keep), "kept reply"))
            .await
            .unwrap();

        let deleted = comments.delete_recursive(root.id).await.unwrap();
        assert_eq!(deleted, 3);

        let tree = comments.list_tree(ArticleId::new(1)).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, keep.id);
        assert_eq!(tree[0].children.len(), 1);

        assert!(matches!(
            comments.delete_recursive(root.id).await,
            Err(BlogError::CommentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_moderation_hides_comment() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let comments = CommentUseCase::new(repo);

        let spam = comments.submit(new_comment(1, None, "buy now")).await.unwrap();
        comments.moderate(spam.id, "[removed]", false).await.unwrap();
        assert!(comments.list_tree(ArticleId::new(1)).await.unwrap().is_empty());

        assert!(matches!(
            comments.moderate(CommentId::new(999), "x", true).await,
            Err(BlogError::CommentNotFound(_))
        ));
    }
}

#[cfg(test)]
mod ip_guard_tests {
    use super::support::*;
    use crate::application::ip_guard::IpGuardUseCase;
    use crate::error::BlogError;
    use chrono::{Duration, Utc};
    use std::net::IpAddr;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let guard = IpGuardUseCase::new(Arc::new(FakeRepo::default()));

        guard.ban(ip("1.2.3.4"), "spam", None).await.unwrap();
        guard
            .ban(ip("5.6.7.8"), "flood", Some(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert!(guard.is_banned(ip("1.2.3.4")).await.unwrap());
        assert!(guard.is_banned(ip("5.6.7.8")).await.unwrap());
        assert!(!guard.is_banned(ip("9.9.9.9")).await.unwrap());

        assert_eq!(guard.unban(ip("1.2.3.4")).await.unwrap(), 1);
        assert!(!guard.is_banned(ip("1.2.3.4")).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_ban_no_longer_applies() {
        let repo = Arc::new(FakeRepo::default());
        repo.add_ban("1.2.3.4", Some(Utc::now() - Duration::minutes(5)));
        let guard = IpGuardUseCase::new(repo);

        assert!(!guard.is_banned(ip("1.2.3.4")).await.unwrap());
    }

    #[tokio::test]
    async fn test_ban_expiry_must_be_in_future() {
        let guard = IpGuardUseCase::new(Arc::new(FakeRepo::default()));
        let err = guard
            .ban(ip("1.2.3.4"), "late", Some(Utc::now() - Duration::seconds(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::InvalidInput(_)));
    }
}

#[cfg(test)]
mod error_tests {
    use crate::error::BlogError;
    use axum::http::StatusCode;
    use kernel::error::{app_error::AppError, kind::ErrorKind};
    use kernel::id::ArticleId;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BlogError::ArticleNotFound(ArticleId::new(1)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(BlogError::InvalidPage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            BlogError::RateLimitExceeded("slow down".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(BlogError::IpBanned.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BlogError::WrongArticlePassword.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            BlogError::ArticleNotLocked(ArticleId::new(1)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BlogError::ClientIpUnresolved.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BlogError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limit_message_reaches_caller() {
        let app: AppError = BlogError::RateLimitExceeded("Commenting too fast".into()).into();
        assert_eq!(app.kind(), ErrorKind::TooManyRequests);
        assert_eq!(app.message(), "Commenting too fast");
        assert!(app.action().is_some());
    }

    #[test]
    fn test_wrong_article_password_is_forbidden() {
        let app: AppError = BlogError::WrongArticlePassword.into();
        assert_eq!(app.kind(), ErrorKind::Forbidden);
        assert!(app.action().is_some());
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let app: AppError = BlogError::Internal("db password wrong".into()).into();
        assert!(!app.message().contains("password"));
    }
}

#[cfg(test)]
mod router_tests {
    use super::support::*;
    use crate::application::config::BlogConfig;
    use crate::presentation::router::blog_router_generic;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use platform::kv::MemoryStore;
    use platform::rate_limit::RateLimitConfig;
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(repo: FakeRepo, config: BlogConfig) -> Router {
        blog_router_generic(Arc::new(MemoryStore::new()), Arc::new(repo), config)
    }

    fn get(uri: &str, ip: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(ip) = ip {
            builder = builder.header("x-forwarded-for", ip);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_comment(article: i64, ip: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/articles/{article}/comments"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "router-test");
        if let Some(ip) = ip {
            builder = builder.header("x-forwarded-for", ip);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post_unlock(article: i64, ip: Option<&str>, password: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/articles/{article}/unlock"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(ip) = ip {
            builder = builder.header("x-forwarded-for", ip);
        }
        let body = serde_json::json!({ "password": password }).to_string();
        builder.body(Body::from(body)).unwrap()
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_article_detail_and_not_found() {
        let app = app(FakeRepo::with_articles(1), BlogConfig::default());

        let response = app.clone().oneshot(get("/articles/1", Some("1.1.1.1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["views"], 11);
        assert_eq!(body["tags"][0]["name"], "rust");

        let response = app.oneshot(get("/articles/42", Some("1.1.1.1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_locked_article_content_needs_password() {
        let repo = FakeRepo::default();
        repo.insert_locked(1, "open sesame");
        let app = app(repo, BlogConfig::default());

        let response = app.clone().oneshot(get("/articles/1", Some("1.1.1.1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["isLocked"], true);
        assert!(body["content"].is_null());

        let response = app
            .clone()
            .oneshot(post_unlock(1, Some("1.1.1.1"), "guess"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(post_unlock(1, None, "open sesame"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_unlock(1, Some("1.1.1.1"), "open sesame"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["content"], "members only");
    }

    #[tokio::test]
    async fn test_unlock_attempts_are_rate_limited() {
        let mut config = BlogConfig::default();
        config.rate_limits.article_unlock.limit = RateLimitConfig::new(2, 60);
        let repo = FakeRepo::default();
        repo.insert_locked(1, "open sesame");
        let app = app(repo, config);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_unlock(1, Some("9.9.9.9"), "guess"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        let response = app
            .oneshot(post_unlock(1, Some("9.9.9.9"), "open sesame"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_listing_pagination() {
        let app = app(FakeRepo::with_articles(12), BlogConfig::default());

        let response = app
            .clone()
            .oneshot(get("/articles?page=2&size=5", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["items"][0]["id"], 7);
        assert_eq!(body["items"].as_array().unwrap().len(), 5);

        let response = app.oneshot(get("/articles?page=0", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rate_limit_per_ip() {
        let mut config = BlogConfig::default();
        config.rate_limits.article_detail.limit = RateLimitConfig::new(2, 60);
        let app = app(FakeRepo::with_articles(1), config);

        for _ in 0..2 {
            let response = app.clone().oneshot(get("/articles/1", Some("2.2.2.2"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(get("/articles/1", Some("2.2.2.2"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app.oneshot(get("/articles/1", Some("3.3.3.3"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_banned_ip_is_refused() {
        let repo = FakeRepo::with_articles(1);
        repo.add_ban("6.6.6.6", None);
        let app = app(repo, BlogConfig::default());

        let response = app.clone().oneshot(get("/articles/1", Some("6.6.6.6"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(get("/articles/1", Some("7.7.7.7"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_comment_submit_requires_client_ip() {
        let app = app(FakeRepo::with_articles(1), BlogConfig::default());
        let body = r#"{"author":"ann","content":"nice post"}"#;

        let response = app.clone().oneshot(post_comment(1, None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(post_comment(1, Some("4.4.4.4"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json(response).await;
        assert_eq!(created["author"], "ann");
        assert!(created.get("email").is_none());

        let response = app.oneshot(get("/articles/1/comments", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tree = json(response).await;
        assert_eq!(tree.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_comment_on_missing_article() {
        let app = app(FakeRepo::default(), BlogConfig::default());
        let response = app
            .oneshot(post_comment(9, Some("4.4.4.4"), r#"{"author":"a","content":"b"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_limit_is_separate_from_listing() {
        let mut config = BlogConfig::default();
        config.rate_limits.comment_submit.limit = RateLimitConfig::new(1, 60);
        let app = app(FakeRepo::with_articles(1), config);
        let body = r#"{"author":"ann","content":"hi"}"#;

        let response = app.clone().oneshot(post_comment(1, Some("5.5.5.5"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = app.clone().oneshot(post_comment(1, Some("5.5.5.5"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app
            .oneshot(get("/articles/1/comments", Some("5.5.5.5")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_socket_address_is_used_without_proxy_headers() {
        let mut config = BlogConfig::default();
        config.rate_limits.article_detail.limit = RateLimitConfig::new(1, 60);
        let app = app(FakeRepo::with_articles(1), config);

        let with_peer = |port: u16| {
            let mut req = get("/articles/1", None);
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], port))));
            req
        };

        let response = app.clone().oneshot(with_peer(40000)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Same host, different source port: same client
        let response = app.oneshot(with_peer(40001)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_access_is_logged_in_background() {
        let repo = Arc::new(FakeRepo::with_articles(1));
        let store = Arc::new(MemoryStore::new());
        let app = blog_router_generic(store, repo.clone(), BlogConfig::default());

        let response = app.oneshot(get("/articles/1", Some("8.8.8.8"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::timeout(Duration::from_secs(5), repo.access_logged.notified())
            .await
            .expect("access log was never written");
        assert_eq!(repo.access_log_count(), 1);
    }
}

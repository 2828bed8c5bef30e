//! Blog Router

use crate::application::config::{BlogConfig, RateLimitRule};
use crate::domain::repository::BlogRepository;
use crate::infra::postgres::PgBlogRepository;
use crate::presentation::handlers::{self, BlogAppState};
use crate::presentation::middleware::{self, RateLimitState};
use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use platform::kv::KeyValueStore;
use platform::rate_limit::FixedWindowLimiter;
use std::sync::Arc;

/// Create the blog router with PostgreSQL repository
pub fn blog_router<S>(store: Arc<S>, repo: PgBlogRepository, config: BlogConfig) -> Router
where
    S: KeyValueStore + Send + Sync + 'static,
{
    blog_router_generic(store, Arc::new(repo), config)
}

fn limit<S>(limiter: &FixedWindowLimiter<S>, rule: &RateLimitRule) -> RateLimitState<S> {
    RateLimitState {
        limiter: limiter.clone(),
        rule: Arc::new(rule.clone()),
    }
}

/// Create a generic blog router for any store and repository implementation
pub fn blog_router_generic<S, R>(store: Arc<S>, repo: Arc<R>, config: BlogConfig) -> Router
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    let limiter = FixedWindowLimiter::new(store.clone(), config.rate_limit_namespace.clone());
    let rules = config.rate_limits.clone();
    let state = BlogAppState {
        store,
        repo,
        config: Arc::new(config),
    };

    Router::new()
        .route(
            "/articles",
            get(handlers::list_thumbnails::<S, R>).route_layer(from_fn_with_state(
                limit(&limiter, &rules.article_list),
                middleware::rate_limit::<S>,
            )),
        )
        .route(
            "/articles/{id}",
            get(handlers::get_article::<S, R>).route_layer(from_fn_with_state(
                limit(&limiter, &rules.article_detail),
                middleware::rate_limit::<S>,
            )),
        )
        .route(
            "/articles/{id}/unlock",
            post(handlers::unlock_article::<S, R>).route_layer(from_fn_with_state(
                limit(&limiter, &rules.article_unlock),
                middleware::rate_limit::<S>,
            )),
        )
        .route(
            "/articles/{id}/comments",
            get(handlers::list_comments::<S, R>)
                .route_layer(from_fn_with_state(
                    limit(&limiter, &rules.comment_list),
                    middleware::rate_limit::<S>,
                ))
                .merge(post(handlers::submit_comment::<S, R>).route_layer(
                    from_fn_with_state(
                        limit(&limiter, &rules.comment_submit),
                        middleware::rate_limit::<S>,
                    ),
                )),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::record_access::<S, R>,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::reject_banned_ip::<S, R>,
        ))
        .layer(from_fn(middleware::resolve_client_ip))
        .with_state(state)
}

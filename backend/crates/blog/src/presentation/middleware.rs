//! Blog Middleware
//!
//! Global chain, outermost first: resolve client IP, reject banned IPs,
//! record access. Rate limiting is attached per route.

use crate::application::config::{RateLimitRule, UnresolvedIpPolicy};
use crate::domain::entities::AccessLog;
use crate::domain::repository::BlogRepository;
use crate::error::BlogError;
use crate::presentation::handlers::BlogAppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use platform::kv::KeyValueStore;
use platform::rate_limit::FixedWindowLimiter;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Client address resolved once per request; `None` when nothing usable was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

fn client_ip(req: &Request) -> Option<IpAddr> {
    match req.extensions().get::<ClientIp>() {
        Some(ClientIp(ip)) => *ip,
        None => {
            let remote = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip());
            platform::client::resolve_client_ip(req.headers(), remote)
        }
    }
}

/// Attach [`ClientIp`] for everything further down the stack
pub async fn resolve_client_ip(mut req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}

/// 403 for blacklisted addresses
pub async fn reject_banned_ip<S, R>(
    State(state): State<BlogAppState<S, R>>,
    req: Request,
    next: Next,
) -> Result<Response, BlogError>
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    if let Some(ip) = client_ip(&req) {
        if state.ip_guard().is_banned(ip).await? {
            tracing::warn!(ip = %ip, path = %req.uri().path(), "Banned IP refused");
            return Err(BlogError::IpBanned);
        }
    }
    Ok(next.run(req).await)
}

/// Store an access log row in the background; never delays or fails the request
pub async fn record_access<S, R>(
    State(state): State<BlogAppState<S, R>>,
    req: Request,
    next: Next,
) -> Response
where
    S: KeyValueStore + Send + Sync + 'static,
    R: BlogRepository,
{
    if state.config.access_log_enabled {
        let log = AccessLog {
            ip_address: client_ip(&req)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            user_agent: req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            request_url: req.uri().to_string(),
            created_at: Utc::now(),
        };
        let guard = state.ip_guard();
        tokio::spawn(async move {
            if let Err(e) = guard.record_access(&log).await {
                tracing::warn!(error = %e, url = %log.request_url, "Failed to record access");
            }
        });
    }
    next.run(req).await
}

/// Per-route rate limiting state
pub struct RateLimitState<S> {
    pub limiter: FixedWindowLimiter<S>,
    pub rule: Arc<RateLimitRule>,
}

impl<S> Clone for RateLimitState<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            rule: Arc::clone(&self.rule),
        }
    }
}

/// 429 once the caller used up the rule's window
pub async fn rate_limit<S>(
    State(state): State<RateLimitState<S>>,
    req: Request,
    next: Next,
) -> Result<Response, BlogError>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    let rule = &state.rule;

    let Some(ip) = client_ip(&req) else {
        return match rule.on_unresolved_ip {
            UnresolvedIpPolicy::Allow => {
                tracing::warn!(operation = rule.operation, "Client IP unresolved, rate limit skipped");
                Ok(next.run(req).await)
            }
            UnresolvedIpPolicy::Deny => {
                tracing::warn!(operation = rule.operation, "Client IP unresolved, request refused");
                Err(BlogError::ClientIpUnresolved)
            }
        };
    };

    let result = state
        .limiter
        .check(rule.operation, &ip.to_string(), &rule.limit)
        .await?;
    if !result.allowed {
        return Err(BlogError::RateLimitExceeded(rule.message.clone()));
    }

    Ok(next.run(req).await)
}

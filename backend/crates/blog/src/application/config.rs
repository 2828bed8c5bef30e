//! Application Configuration
//!
//! Cache layout, rate-limit rules and request logging for the blog.

use platform::config::{env_bool, env_or, env_parse, env_secs};
use platform::rate_limit::RateLimitConfig;
use std::borrow::Cow;
use std::time::Duration;

use kernel::id::ArticleId;

/// Operation names, used as the middle segment of rate-limit keys
pub mod operations {
    pub const ARTICLE_DETAIL: &str = "article:detail";
    pub const ARTICLE_LIST: &str = "article:list";
    pub const ARTICLE_UNLOCK: &str = "article:unlock";
    pub const COMMENT_LIST: &str = "comment:list";
    pub const COMMENT_SUBMIT: &str = "comment:submit";
}

/// What to do when the key-value store fails during a cached read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFailureMode {
    /// Surface the failure as 503
    Propagate,
    /// Log it and serve straight from the database
    BypassToDatabase,
}

/// What to do when the client IP cannot be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedIpPolicy {
    /// Skip rate limiting for this request
    Allow,
    /// Refuse the request
    Deny,
}

#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub operation: &'static str,
    pub limit: RateLimitConfig,
    pub on_unresolved_ip: UnresolvedIpPolicy,
    /// Shown to the caller on rejection
    pub message: Cow<'static, str>,
}

impl RateLimitRule {
    fn new(
        operation: &'static str,
        max_requests: u32,
        window_secs: u64,
        on_unresolved_ip: UnresolvedIpPolicy,
        message: &'static str,
    ) -> Self {
        Self {
            operation,
            limit: RateLimitConfig::new(max_requests, window_secs),
            on_unresolved_ip,
            message: Cow::Borrowed(message),
        }
    }

    /// `{prefix}_RATE_LIMIT_MAX` and `{prefix}_RATE_LIMIT_WINDOW_SECS` override the limit
    fn with_env_overrides(mut self, prefix: &str) -> Self {
        self.limit.max_requests = env_parse(
            &format!("{prefix}_RATE_LIMIT_MAX"),
            self.limit.max_requests,
        );
        self.limit.window = env_secs(
            &format!("{prefix}_RATE_LIMIT_WINDOW_SECS"),
            self.limit.window.as_secs(),
        );
        self
    }
}

/// One rule per rate-limited route
#[derive(Debug, Clone)]
pub struct RateLimitRules {
    pub article_detail: RateLimitRule,
    pub article_list: RateLimitRule,
    pub article_unlock: RateLimitRule,
    pub comment_list: RateLimitRule,
    pub comment_submit: RateLimitRule,
}

impl Default for RateLimitRules {
    fn default() -> Self {
        use UnresolvedIpPolicy::{Allow, Deny};
        Self {
            article_detail: RateLimitRule::new(
                operations::ARTICLE_DETAIL,
                30,
                60,
                Allow,
                "Too many article requests, please slow down",
            ),
            article_list: RateLimitRule::new(
                operations::ARTICLE_LIST,
                60,
                60,
                Allow,
                "Too many listing requests, please slow down",
            ),
            article_unlock: RateLimitRule::new(
                operations::ARTICLE_UNLOCK,
                5,
                60,
                Deny,
                "Too many unlock attempts, please try again later",
            ),
            comment_list: RateLimitRule::new(
                operations::COMMENT_LIST,
                60,
                60,
                Allow,
                "Too many comment requests, please slow down",
            ),
            comment_submit: RateLimitRule::new(
                operations::COMMENT_SUBMIT,
                5,
                60,
                Deny,
                "Commenting too frequently, please try again later",
            ),
        }
    }
}

/// Blog application configuration
#[derive(Debug, Clone)]
pub struct BlogConfig {
    /// Article hash key is `{prefix}{id}`
    pub article_key_prefix: String,
    /// Sorted set holding the thumbnail listing
    pub thumbnail_index_key: String,
    pub thumbnail_ttl: Duration,
    pub cache_failure: CacheFailureMode,
    /// Prefix of every rate-limit counter key
    pub rate_limit_namespace: String,
    pub rate_limits: RateLimitRules,
    pub access_log_enabled: bool,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            article_key_prefix: "article:".to_string(),
            thumbnail_index_key: "article:thumbnails".to_string(),
            thumbnail_ttl: Duration::from_secs(24 * 60 * 60),
            cache_failure: CacheFailureMode::Propagate,
            rate_limit_namespace: "rate_limit:".to_string(),
            rate_limits: RateLimitRules::default(),
            access_log_enabled: true,
        }
    }
}

impl BlogConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cache_failure = if env_bool("CACHE_FAIL_OPEN", false) {
            CacheFailureMode::BypassToDatabase
        } else {
            CacheFailureMode::Propagate
        };

        Self {
            article_key_prefix: env_or("ARTICLE_CACHE_PREFIX", &defaults.article_key_prefix),
            thumbnail_index_key: env_or("THUMBNAIL_CACHE_KEY", &defaults.thumbnail_index_key),
            thumbnail_ttl: env_secs(
                "THUMBNAIL_CACHE_TTL_SECS",
                defaults.thumbnail_ttl.as_secs(),
            ),
            cache_failure,
            rate_limit_namespace: env_or("RATE_LIMIT_NAMESPACE", &defaults.rate_limit_namespace),
            rate_limits: RateLimitRules {
                article_detail: defaults
                    .rate_limits
                    .article_detail
                    .with_env_overrides("ARTICLE_DETAIL"),
                article_list: defaults
                    .rate_limits
                    .article_list
                    .with_env_overrides("ARTICLE_LIST"),
                article_unlock: defaults
                    .rate_limits
                    .article_unlock
                    .with_env_overrides("ARTICLE_UNLOCK"),
                comment_list: defaults
                    .rate_limits
                    .comment_list
                    .with_env_overrides("COMMENT_LIST"),
                comment_submit: defaults
                    .rate_limits
                    .comment_submit
                    .with_env_overrides("COMMENT_SUBMIT"),
            },
            access_log_enabled: env_bool("ACCESS_LOG_ENABLED", defaults.access_log_enabled),
        }
    }

    pub fn article_key(&self, id: ArticleId) -> String {
        format!("{}{}", self.article_key_prefix, id)
    }
}

//! Domain Entities
//!
//! Core business entities for the blog domain.

use chrono::{DateTime, Utc};
use kernel::id::{ArticleId, CommentId, TagId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Tag attached to articles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Article with its tags joined in
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub views: i64,
    pub word_num: i64,
    pub thumbnail_url: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Field map entry could not be decoded back into an [`Article`]
#[derive(Debug, thiserror::Error)]
pub enum FieldMapError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str, FieldMapError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or(FieldMapError::Missing(name))
}

fn parse_field<T>(fields: &HashMap<String, String>, name: &'static str) -> Result<T, FieldMapError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    field(fields, name)?
        .parse()
        .map_err(|e: T::Err| FieldMapError::Invalid {
            field: name,
            reason: e.to_string(),
        })
}

fn parse_time(fields: &HashMap<String, String>, name: &'static str) -> Result<DateTime<Utc>, FieldMapError> {
    DateTime::parse_from_rfc3339(field(fields, name)?)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FieldMapError::Invalid {
            field: name,
            reason: e.to_string(),
        })
}

impl Article {
    /// Flatten into hash fields for the cache. Tags travel as one JSON field.
    pub fn to_fields(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        Ok(vec![
            ("id".into(), self.id.to_string()),
            ("title".into(), self.title.clone()),
            ("content".into(), self.content.clone()),
            (
                "category_id".into(),
                self.category_id.map(|c| c.to_string()).unwrap_or_default(),
            ),
            ("views".into(), self.views.to_string()),
            ("word_num".into(), self.word_num.to_string()),
            ("thumbnail_url".into(), self.thumbnail_url.clone()),
            ("is_locked".into(), self.is_locked.to_string()),
            ("created_at".into(), self.created_at.to_rfc3339()),
            ("updated_at".into(), self.updated_at.to_rfc3339()),
            ("tags".into(), serde_json::to_string(&self.tags)?),
        ])
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, FieldMapError> {
        let category_id = match field(fields, "category_id")? {
            "" => None,
            _ => Some(parse_field(fields, "category_id")?),
        };
        let tags = serde_json::from_str(field(fields, "tags")?).map_err(|e| {
            FieldMapError::Invalid {
                field: "tags",
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            id: parse_field(fields, "id")?,
            title: field(fields, "title")?.to_string(),
            content: field(fields, "content")?.to_string(),
            category_id,
            views: parse_field(fields, "views")?,
            word_num: parse_field(fields, "word_num")?,
            thumbnail_url: field(fields, "thumbnail_url")?.to_string(),
            is_locked: parse_field(fields, "is_locked")?,
            created_at: parse_time(fields, "created_at")?,
            updated_at: parse_time(fields, "updated_at")?,
            tags,
        })
    }
}

/// Home-page listing projection, stored as a sorted-set member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleThumbnail {
    pub id: ArticleId,
    pub title: String,
    pub thumbnail_url: String,
    pub created_at: DateTime<Utc>,
    pub views: i64,
    pub word_num: i64,
    pub is_locked: bool,
}

/// Lock state of a published article, as stored
#[derive(Clone, PartialEq)]
pub struct ArticleLock {
    pub is_locked: bool,
    /// Argon2id PHC string
    pub password_hash: Option<String>,
}

impl std::fmt::Debug for ArticleLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleLock")
            .field("is_locked", &self.is_locked)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[HASH]"))
            .finish()
    }
}

/// Input for creating or replacing an article
#[derive(Clone, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub thumbnail_url: String,
    pub is_locked: bool,
    /// Clear text; hashed before it reaches storage
    pub lock_password: Option<String>,
    pub tag_names: Vec<String>,
}

impl std::fmt::Debug for ArticleDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleDraft")
            .field("title", &self.title)
            .field("category_id", &self.category_id)
            .field("thumbnail_url", &self.thumbnail_url)
            .field("is_locked", &self.is_locked)
            .field("lock_password", &self.lock_password.as_ref().map(|_| "[REDACTED]"))
            .field("tag_names", &self.tag_names)
            .finish_non_exhaustive()
    }
}

impl ArticleDraft {
    /// Trimmed, non-empty, first occurrence wins
    pub fn normalized_tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.tag_names.len());
        for name in self.tag_names.iter().map(|n| n.trim()) {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// Whitespace-separated token count
pub fn count_words(content: &str) -> i64 {
    content.split_whitespace().count() as i64
}

/// Comment as stored; `parent_id` is fixed at creation
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub article_id: ArticleId,
    pub author: String,
    pub email: String,
    pub content: String,
    pub is_public: bool,
    pub parent_id: Option<CommentId>,
    pub user_agent: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: ArticleId,
    pub author: String,
    pub email: String,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub user_agent: String,
    pub is_admin: bool,
}

/// Parent link only, enough to walk a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentLink {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
}

/// Comment with its replies attached
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

#[derive(Debug, Clone)]
pub struct AccessLog {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub request_url: String,
    pub created_at: DateTime<Utc>,
}

/// Blacklist entry; `expires_at == None` bans permanently
#[derive(Debug, Clone)]
pub struct IpBan {
    pub ip_address: String,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IpBan {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

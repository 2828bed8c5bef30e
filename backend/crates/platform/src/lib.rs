//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Key-value store abstraction (Redis, in-memory)
//! - Fixed-window rate limiting
//! - Client IP resolution
//! - Argon2id password hashing
//! - Environment configuration helpers

pub mod client;
pub mod config;
pub mod kv;
pub mod password;
pub mod rate_limit;

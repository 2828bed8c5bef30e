//! IP Guard Use Case
//!
//! Blacklist checks and access logging.

use crate::domain::entities::{AccessLog, IpBan};
use crate::domain::repository::{AccessLogRepository, IpBanRepository};
use crate::error::{BlogError, BlogResult};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;

pub struct IpGuardUseCase<R> {
    repo: Arc<R>,
}

impl<R> Clone for IpGuardUseCase<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R> IpGuardUseCase<R>
where
    R: IpBanRepository + AccessLogRepository + Sync,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn is_banned(&self, ip: IpAddr) -> BlogResult<bool> {
        self.repo.is_ip_banned(&ip.to_string(), Utc::now()).await
    }

    /// `expires_at == None` bans permanently
    pub async fn ban(
        &self,
        ip: IpAddr,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> BlogResult<()> {
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(BlogError::InvalidInput(
                "ban expiry must be in the future".into(),
            ));
        }

        let ban = IpBan {
            ip_address: ip.to_string(),
            reason: reason.trim().to_string(),
            expires_at,
        };
        self.repo.insert_ip_ban(&ban).await?;

        tracing::info!(ip = %ip, reason = %ban.reason, expires_at = ?expires_at, "IP banned");
        Ok(())
    }

    /// Lift every ban on `ip`; returns how many were removed
    pub async fn unban(&self, ip: IpAddr) -> BlogResult<u64> {
        let removed = self.repo.delete_ip_bans(&ip.to_string()).await?;
        tracing::info!(ip = %ip, removed = removed, "IP unbanned");
        Ok(removed)
    }

    pub async fn record_access(&self, log: &AccessLog) -> BlogResult<()> {
        self.repo.insert_access_log(log).await
    }
}

//! Redis-backed [`KeyValueStore`]

use redis::Client;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::{KeyValueStore, StoreResult};

/// `INCR` guarded by `EXISTS`, evaluated atomically on the server.
/// Lua `false` comes back as nil.
const INCR_IF_EXISTS_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCR', KEYS[1])
end
return false
"#;

/// Redis/Dragonfly store over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: Arc<ConnectionManager>,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).inspect_err(|e| {
            error!(error = %e, "Failed to create Redis client");
        })?;

        let connection_manager = ConnectionManager::new(client).await.inspect_err(|e| {
            error!(error = %e, "Failed to create Redis connection manager");
        })?;

        let mut conn = connection_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        debug!("Connected to Redis");

        Ok(Self {
            connection_manager: Arc::new(connection_manager),
        })
    }

    fn conn(&self) -> ConnectionManager {
        (*self.connection_manager).clone()
    }
}

/// Redis expiries are whole seconds and must be positive
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let deleted = redis::cmd("DEL")
            .arg(keys)
            .query_async::<u64>(&mut conn)
            .await?;
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let exists = redis::cmd("EXISTS")
            .arg(key)
            .query_async::<bool>(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn incr_if_exists(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut conn = self.conn();
        let value = redis::cmd("EVAL")
            .arg(INCR_IF_EXISTS_SCRIPT)
            .arg(1)
            .arg(key)
            .query_async::<Option<i64>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn();
        let fields = redis::cmd("HGETALL")
            .arg(key)
            .query_async::<HashMap<String, String>>(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn sorted_set_add_all(
        &self,
        key: &str,
        members: &[(f64, String)],
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();

        let mut pipe = redis::pipe();
        pipe.atomic();
        let zadd = pipe.cmd("ZADD").arg(key);
        for (score, member) in members {
            zadd.arg(*score).arg(member);
        }
        zadd.ignore();
        if let Some(ttl) = ttl {
            pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        debug!(key = key, members = members.len(), "Sorted set populated");
        Ok(())
    }

    async fn sorted_set_card(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn();
        let card = redis::cmd("ZCARD")
            .arg(key)
            .query_async::<u64>(&mut conn)
            .await?;
        Ok(card)
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let members = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async::<Vec<String>>(&mut conn)
            .await?;
        Ok(members)
    }
}

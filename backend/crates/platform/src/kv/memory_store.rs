//! In-memory [`KeyValueStore`]
//!
//! Mirrors the Redis semantics the blog relies on (lazy expiry, hash fields,
//! descending sorted-set ranges). Expiry uses `tokio::time::Instant`, so tests
//! running on a paused clock can jump across rate-limit windows.
//!
//! Keys that are never read again are reclaimed by a sweep that runs on
//! writes, at most once per [`SWEEP_INTERVAL`].

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyValueStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, String>),
    Sorted(Vec<(f64, String)>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Minimum time between two sweeps of expired keys
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Keyspace {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Keyspace {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    /// Drop every expired key once [`SWEEP_INTERVAL`] has passed since the last sweep
    fn sweep_if_due(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        self.last_sweep = now;

        let swept = before - self.map.len();
        if swept > 0 {
            tracing::debug!(swept = swept, remaining = self.map.len(), "Swept expired keys");
        }
    }
}

/// Process-local store, one mutex around all keys
#[derive(Debug)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the entry if its expiry has passed, then hand out what is left.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Malformed {
        key: key.to_string(),
        reason: "operation against a key holding the wrong kind of value".to_string(),
    }
}

/// Redis-style inclusive range with negative indexes counting from the end
fn rank_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        match live(entries, key) {
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut keyspace = self.keyspace.lock().await;
        keyspace.sweep_if_due();
        let entries = &mut keyspace.map;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> StoreResult<u64> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        let mut deleted = 0;
        for key in keys {
            if live(entries, key).is_some() {
                entries.remove(*key);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        Ok(live(entries, key).is_some())
    }

    async fn incr_if_exists(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        let Some(entry) = live(entries, key) else {
            return Ok(None);
        };
        let Value::Text(text) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current = text.parse::<i64>().map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let next = current + 1;
        *text = next.to_string();
        Ok(Some(next))
    }

    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut keyspace = self.keyspace.lock().await;
        keyspace.sweep_if_due();
        let entries = &mut keyspace.map;
        if live(entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        let Some(Entry {
            value: Value::Hash(hash),
            ..
        }) = entries.get_mut(key)
        else {
            return Err(wrong_type(key));
        };
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        match live(entries, key) {
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.hash_set_all(key, &[(field.to_string(), value.to_string())])
            .await
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
        let mut keyspace = self.keyspace.lock().await;
        keyspace.sweep_if_due();
        let entries = &mut keyspace.map;
        if live(entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Sorted(Vec::new()),
                    expires_at: None,
                },
            );
        }
        let Some(entry) = entries.get_mut(key) else {
            return Err(wrong_type(key));
        };
        let Value::Sorted(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        for (score, member) in members {
            match set.iter_mut().find(|(_, m)| m == member) {
                Some(existing) => existing.0 = *score,
                None => set.push((*score, member.clone())),
            }
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn sorted_set_card(&self, key: &str) -> StoreResult<u64> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        match live(entries, key) {
            Some(Entry {
                value: Value::Sorted(set),
                ..
            }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> StoreResult<Vec<String>> {
        let mut keyspace = self.keyspace.lock().await;
        let entries = &mut keyspace.map;
        let mut ranked = match live(entries, key) {
            Some(Entry {
                value: Value::Sorted(set),
                ..
            }) => set.clone(),
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(Vec::new()),
        };
        // Score descending, ties broken by member descending (as ZREVRANGE)
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        Ok(match rank_window(ranked.len(), start, stop) {
            Some((from, to)) => ranked[from..=to].iter().map(|(_, m)| m.clone()).collect(),
            None => Vec::new(),
        })
    }
}

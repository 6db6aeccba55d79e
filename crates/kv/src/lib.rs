//! Thin abstraction over an external key-value + pub/sub server (C3).
//!
//! Maintains two connections — one for commands, one for blocking
//! subscribe — reconnects with the `storage` backoff profile, and
//! fails fast through a [`CircuitBreaker`] during outages.

mod pubsub;

pub use pubsub::Subscription;

use std::sync::Arc;
use std::time::Duration;

use art_domain::backoff::BackoffPolicy;
use art_domain::breaker::{BreakerState, CircuitBreaker, UpstreamUnavailable};
use art_domain::error::{Error, Result};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

const WRITE_BUFFER_CAP: usize = 1_000;

/// A write deferred while the store was unreachable, replayed on recovery.
#[derive(Debug, Clone)]
enum BufferedWrite {
    Set {
        key: String,
        value: String,
        ttl_ms: Option<u64>,
    },
    HSet {
        key: String,
        field: String,
        value: String,
    },
    LPush {
        key: String,
        value: String,
    },
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },
    Publish {
        channel: String,
        payload: String,
    },
    Del {
        key: String,
    },
}

/// Client for the KV & pub/sub store.
pub struct KvClient {
    manager: Mutex<Option<ConnectionManager>>,
    url: String,
    breaker: Arc<CircuitBreaker>,
    backoff: BackoffPolicy,
    write_buffer: Mutex<Vec<BufferedWrite>>,
}

impl KvClient {
    /// Connect eagerly; returns `StorageUnavailable` if the initial
    /// connection cannot be established (callers may retry in the
    /// background via [`KvClient::reconnect_loop`]).
    pub async fn connect(url: &str) -> Result<Self> {
        let manager = Self::dial(url).await?;
        Ok(Self {
            manager: Mutex::new(Some(manager)),
            url: url.to_string(),
            breaker: Arc::new(CircuitBreaker::with_params("kv", 5, 30_000, 3)),
            backoff: BackoffPolicy::STORAGE,
            write_buffer: Mutex::new(Vec::new()),
        })
    }

    async fn dial(url: &str) -> Result<ConnectionManager> {
        let client = redis::Client::open(url).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        client
            .get_connection_manager()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }

    fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }

    fn take_manager(&self) -> Option<ConnectionManager> {
        self.manager.lock().clone()
    }

    /// Background task: while the breaker is open or the connection is
    /// absent, retry dialing on the `storage` backoff profile and replay
    /// any buffered writes once reconnected.
    pub async fn reconnect_loop(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if self.breaker().state() != BreakerState::Open && self.manager.lock().is_some() {
                attempt = 0;
                continue;
            }
            attempt += 1;
            let delay = self.backoff.delay_for_attempt(attempt);
            tokio::time::sleep(delay).await;
            match Self::dial(&self.url).await {
                Ok(mgr) => {
                    *self.manager.lock() = Some(mgr);
                    self.breaker().record_success();
                    self.flush_buffer().await;
                    attempt = 0;
                    tracing::info!("kv store reconnected");
                }
                Err(e) => {
                    self.breaker().record_failure();
                    tracing::warn!(error = %e, attempt, "kv reconnect attempt failed");
                }
            }
        }
    }

    async fn flush_buffer(&self) {
        let pending: Vec<BufferedWrite> = std::mem::take(&mut *self.write_buffer.lock());
        for write in pending {
            let result = match write {
                BufferedWrite::Set { key, value, ttl_ms } => self.set(&key, &value, ttl_ms).await,
                BufferedWrite::HSet { key, field, value } => self.hset(&key, &field, &value).await,
                BufferedWrite::LPush { key, value } => self.lpush(&key, &value).await.map(|_| ()),
                BufferedWrite::ZAdd { key, member, score } => self.zadd(&key, &member, score).await,
                BufferedWrite::Publish { channel, payload } => self.publish(&channel, &payload).await,
                BufferedWrite::Del { key } => self.del(&key).await,
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to replay buffered kv write after reconnect");
            }
        }
    }

    fn buffer_write(&self, write: BufferedWrite) {
        let mut buf = self.write_buffer.lock();
        if buf.len() >= WRITE_BUFFER_CAP {
            buf.remove(0);
        }
        buf.push(write);
    }

    async fn guarded<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        if !self.breaker().is_call_permitted() {
            return Err(Error::StorageUnavailable("circuit breaker open".into()));
        }
        let Some(mgr) = self.take_manager() else {
            self.breaker().record_failure();
            return Err(Error::StorageUnavailable("not connected".into()));
        };
        match op(mgr).await {
            Ok(v) => {
                self.breaker().record_success();
                Ok(v)
            }
            Err(e) => {
                self.breaker().record_failure();
                *self.manager.lock() = None;
                Err(Error::StorageUnavailable(e.to_string()))
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.guarded(|mut mgr| async move { mgr.get(&key).await })
            .await
    }

    pub async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<()> {
        let result = {
            let k = key.to_string();
            let v = value.to_string();
            self.guarded(move |mut mgr| async move {
                match ttl_ms {
                    Some(ms) => {
                        let secs = ms.max(1).div_ceil(1000);
                        mgr.set_ex::<_, _, ()>(&k, &v, secs).await
                    }
                    None => mgr.set::<_, _, ()>(&k, &v).await,
                }
            })
            .await
        };
        if result.is_err() {
            self.buffer_write(BufferedWrite::Set {
                key: key.to_string(),
                value: value.to_string(),
                ttl_ms,
            });
        }
        result
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let k = key.to_string();
        let result = self
            .guarded(move |mut mgr| async move { mgr.del::<_, ()>(&k).await })
            .await;
        if result.is_err() {
            self.buffer_write(BufferedWrite::Del { key: key.to_string() });
        }
        result
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let result = {
            let k = key.to_string();
            let f = field.to_string();
            let v = value.to_string();
            self.guarded(move |mut mgr| async move { mgr.hset::<_, _, _, ()>(&k, &f, &v).await })
                .await
        };
        if result.is_err() {
            self.buffer_write(BufferedWrite::HSet {
                key: key.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        result
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let k = key.to_string();
        let f = field.to_string();
        self.guarded(move |mut mgr| async move { mgr.hget(&k, &f).await })
            .await
    }

    pub async fn hgetall(&self, key: &str) -> Result<std::collections::HashMap<String, String>> {
        let k = key.to_string();
        self.guarded(move |mut mgr| async move { mgr.hgetall(&k).await })
            .await
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<i64> {
        let result = {
            let k = key.to_string();
            let v = value.to_string();
            self.guarded(move |mut mgr| async move { mgr.lpush(&k, &v).await })
                .await
        };
        if result.is_err() {
            self.buffer_write(BufferedWrite::LPush {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        result
    }

    /// Blocking pop with the given timeout; `None` means the timeout
    /// elapsed with no item.
    pub async fn brpop(&self, key: &str, timeout_secs: f64) -> Result<Option<String>> {
        let k = key.to_string();
        let item: Option<(String, String)> = self
            .guarded(move |mut mgr| async move { mgr.brpop(&k, timeout_secs).await })
            .await?;
        Ok(item.map(|(_, v)| v))
    }

    /// Add or update a member's score in a sorted set.
    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let result = {
            let k = key.to_string();
            let m = member.to_string();
            self.guarded(move |mut mgr| async move { mgr.zadd::<_, _, _, ()>(&k, &m, score).await })
                .await
        };
        if result.is_err() {
            self.buffer_write(BufferedWrite::ZAdd {
                key: key.to_string(),
                member: member.to_string(),
                score,
            });
        }
        result
    }

    /// Blocking pop of the lowest-scoring member; `None` means the timeout
    /// elapsed with no item. Callers encode priority as the low-order bits
    /// of the score so the set doubles as a priority queue.
    pub async fn bzpopmin(&self, key: &str, timeout_secs: f64) -> Result<Option<String>> {
        let k = key.to_string();
        let item: Option<(String, String, f64)> = self
            .guarded(move |mut mgr| async move { mgr.bzpopmin(&k, timeout_secs).await })
            .await?;
        Ok(item.map(|(_, member, _)| member))
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let result = {
            let c = channel.to_string();
            let p = payload.to_string();
            self.guarded(move |mut mgr| async move { mgr.publish::<_, _, ()>(&c, &p).await })
                .await
        };
        if result.is_err() {
            self.buffer_write(BufferedWrite::Publish {
                channel: channel.to_string(),
                payload: payload.to_string(),
            });
        }
        result
    }

    /// Subscribe to a glob pattern (e.g. `notify:*`) on a dedicated
    /// blocking connection.
    pub async fn psubscribe(&self, pattern: &str) -> Result<Subscription> {
        pubsub::psubscribe(&self.url, pattern).await
    }

    /// Advisory lock: `SET key 1 NX PX ttl_ms`. Returns `true` if the lock
    /// was acquired, `false` if another holder already owns it.
    pub async fn try_lock(&self, key: &str, ttl_ms: u64) -> Result<bool> {
        let k = key.to_string();
        let secs = ttl_ms.max(1).div_ceil(1000);
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(secs));
        let acquired: Option<String> = self
            .guarded(move |mut mgr| async move { mgr.set_options(&k, "1", opts).await })
            .await?;
        Ok(acquired.is_some())
    }

    /// Release an advisory lock taken with [`KvClient::try_lock`].
    pub async fn unlock(&self, key: &str) -> Result<()> {
        self.del(key).await
    }

    /// Publish a structured event as the JSON-RPC Notification Bus does.
    pub async fn publish_json(&self, channel: &str, event: &Value) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.publish(channel, &payload).await
    }
}

/// Convenience re-export so callers that only need breaker introspection
/// (e.g. health checks) don't have to depend on `art-domain` directly.
pub fn breaker_state(client: &KvClient) -> BreakerState {
    client.breaker.state()
}

pub type KvResult<T> = std::result::Result<T, UpstreamUnavailable>;

//! Per-user fixed-window request limiter
//!
//! Each user gets one record per window: the first accepted request opens the
//! window, every accepted request increments the count, and requests beyond
//! the limit are rejected with the seconds left until the window closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

/// Milliseconds since the Unix epoch
pub type Millis = i64;

/// Run a sweep of expired records every this many checks
const SWEEP_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_at: Millis,
}

impl RateLimitRecord {
    pub fn is_expired(&self, now: Millis) -> bool {
        now > self.reset_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Where window records live
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<RateLimitRecord>>;

    async fn set(&self, user_id: &str, record: RateLimitRecord) -> anyhow::Result<()>;

    /// Drop records whose window closed before `now`, returning how many went
    async fn sweep_expired(&self, now: Millis) -> anyhow::Result<usize>;
}

/// Process-local store; records are lost on restart
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, user_id: &str) -> anyhow::Result<Option<RateLimitRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limit table poisoned"))?;
        Ok(records.get(user_id).copied())
    }

    async fn set(&self, user_id: &str, record: RateLimitRecord) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limit table poisoned"))?;
        records.insert(user_id.to_string(), record);
        Ok(())
    }

    async fn sweep_expired(&self, now: Millis) -> anyhow::Result<usize> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limit table poisoned"))?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> Millis;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        chrono::Utc::now().timestamp_millis()
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    max_requests: u32,
    window_ms: Millis,
    // Serialises read-modify-write so one instance never overshoots the limit
    guard: tokio::sync::Mutex<()>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            max_requests,
            window_ms: window.as_millis() as Millis,
            guard: tokio::sync::Mutex::new(()),
            checks: AtomicU64::new(0),
        }
    }

    pub fn in_memory(max_requests: u32, window: Duration) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), max_requests, window)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request against `user_id`'s window
    ///
    /// A store failure admits the request; the limiter never blocks chat on
    /// its own bookkeeping.
    pub async fn check(&self, user_id: &str) -> RateLimitDecision {
        let decision = {
            let _guard = self.guard.lock().await;
            let now = self.clock.now_millis();

            match self.decide(user_id, now).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(user_id, "Rate limit store failed, admitting request: {}", e);
                    RateLimitDecision::Allowed
                }
            }
        };

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_expired().await;
        }

        decision
    }

    async fn decide(&self, user_id: &str, now: Millis) -> anyhow::Result<RateLimitDecision> {
        match self.store.get(user_id).await? {
            Some(record) if !record.is_expired(now) => {
                if record.count >= self.max_requests {
                    let retry_after_secs = ceil_secs(record.reset_at - now);
                    tracing::debug!(user_id, count = record.count, retry_after_secs, "Rate limit hit");
                    return Ok(RateLimitDecision::Denied { retry_after_secs });
                }

                self.store
                    .set(
                        user_id,
                        RateLimitRecord {
                            count: record.count + 1,
                            reset_at: record.reset_at,
                        },
                    )
                    .await?;
            }
            _ => {
                self.store
                    .set(
                        user_id,
                        RateLimitRecord {
                            count: 1,
                            reset_at: now + self.window_ms,
                        },
                    )
                    .await?;
            }
        }

        Ok(RateLimitDecision::Allowed)
    }

    /// Prune records whose window has closed
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        match self.store.sweep_expired(now).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired rate limit records");
                }
                removed
            }
            Err(e) => {
                tracing::warn!("Rate limit sweep failed: {}", e);
                0
            }
        }
    }
}

/// Whole seconds left, at least 1
fn ceil_secs(ms: Millis) -> u64 {
    (ms.max(0) as u64).div_ceil(1000).max(1)
}

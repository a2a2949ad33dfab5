use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde_json::Value;

/// The backing key-value collaborator.
///
/// Exactly two operations; the wire protocol behind them is opaque to the
/// façade. Implementations handle their own synchronization: the façade is
/// called concurrently from in-flight requests and adds no locking of its own.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
}

/// Cache façade with bounded-retry reads and best-effort writes.
///
/// Stateless apart from the retry configuration: entries live in the backend
/// and expire there passively via TTL. Values round-trip through JSON.
pub struct Store {
    backend: Box<dyn KvBackend>,
    retry_counts: u32,
    retry_backoff: Duration,
}

pub const DEFAULT_RETRY_COUNTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

impl Store {
    pub fn new(backend: Box<dyn KvBackend>, retry_counts: u32, retry_backoff: Duration) -> Self {
        Store {
            backend,
            retry_counts: retry_counts.max(1),
            retry_backoff,
        }
    }

    /// An in-process store with default retry settings.
    pub fn in_memory() -> Self {
        Store::new(
            Box::new(MemoryBackend::new()),
            DEFAULT_RETRY_COUNTS,
            DEFAULT_RETRY_BACKOFF,
        )
    }

    /// Read a key, retrying transient backend failures with a fixed backoff
    /// between attempts. Exhausting the attempts surfaces the failure to the
    /// caller; a plain miss is not retried.
    ///
    /// The backoff sleep blocks only the calling request's execution path.
    pub fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let mut last_error = None;
        for attempt in 1..=self.retry_counts {
            match self.backend.get(key) {
                Ok(Some(raw)) => {
                    let value = serde_json::from_str(&raw)
                        .with_context(|| format!("undecodable store value for key {key}"))?;
                    return Ok(Some(value));
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    log::warn!(
                        "store read failed for {key} (attempt {attempt}/{}): {e:#}",
                        self.retry_counts
                    );
                    last_error = Some(e);
                    if attempt < self.retry_counts {
                        thread::sleep(self.retry_backoff);
                    }
                }
            }
        }
        Err(last_error
            .expect("at least one attempt was made")
            .context(format!(
                "key-value store unreachable after {} attempts",
                self.retry_counts
            )))
    }

    /// Single tolerant read for cache-aside lookups: any failure is logged
    /// and reported as a miss.
    pub fn cache_get(&self, key: &str) -> Option<Value> {
        match self.backend.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("undecodable cached value for {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("cache read failed for {key}: {e:#}");
                None
            }
        }
    }

    /// Single best-effort write. Failures are logged and suppressed: a missed
    /// cache population is indistinguishable from an absent value.
    pub fn cache_set(&self, key: &str, value: &Value, ttl: Duration) {
        if let Err(e) = self.backend.set(key, &value.to_string(), Some(ttl)) {
            log::warn!("cache write failed for {key}: {e:#}");
        }
    }
}

/// In-process TTL map backend. Expired entries are dropped on read.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().expect("memory backend poisoned");
        if let Some(entry) = entries.get(key) {
            if let Some(expires_at) = entry.expires_at {
                if Instant::now() >= expires_at {
                    entries.remove(key);
                    return Ok(None);
                }
            }
            return Ok(Some(entries[key].value.clone()));
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .lock()
            .expect("memory backend poisoned")
            .insert(key.to_string(), entry);
        Ok(())
    }
}

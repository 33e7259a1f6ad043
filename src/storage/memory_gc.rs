//! In-memory storage with key expiry and garbage collection.
//!
//! This storage backend uses `DashMap` for thread-safe concurrent access. Expired
//! keys are invisible to readers immediately and are physically removed by a
//! configurable garbage collector, so tracked clients cannot grow without bound.
//!
//! It serves both as a single-node store and as the deterministic test double
//! for the strategies: time comes from an injected [`Clock`], and
//! [`MemoryStorage::set_unavailable`] simulates a store outage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::storage::Storage;

/// Garbage collection interval configuration.
#[derive(Debug, Clone)]
pub enum GcInterval {
    /// Run GC every N operations.
    Requests(u64),
    /// Run GC at fixed time intervals.
    Duration(Duration),
    /// Disable automatic GC.
    Manual,
}

impl Default for GcInterval {
    fn default() -> Self {
        Self::Requests(10000)
    }
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Default)]
pub struct GcConfig {
    /// When to trigger GC.
    pub interval: GcInterval,
}

impl GcConfig {
    /// Create config with operation-count GC.
    pub fn on_requests(count: u64) -> Self {
        Self {
            interval: GcInterval::Requests(count.max(1)),
        }
    }

    /// Create config with time-based GC.
    pub fn on_duration(interval: Duration) -> Self {
        Self {
            interval: GcInterval::Duration(interval),
        }
    }

    /// Create config with manual GC only.
    pub fn manual() -> Self {
        Self {
            interval: GcInterval::Manual,
        }
    }
}

/// Stored value with expiration tracking.
#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<u64>,
}

impl Slot {
    fn persistent(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory storage with garbage collection.
///
/// # Example
///
/// ```ignore
/// use ipgate::storage::{MemoryStorage, GcConfig};
/// use std::time::Duration;
///
/// // Default GC (every 10000 operations)
/// let storage = MemoryStorage::new();
///
/// // Custom GC interval
/// let storage = MemoryStorage::with_gc(GcConfig::on_duration(Duration::from_secs(60)));
///
/// // Manual GC only
/// let storage = MemoryStorage::with_gc(GcConfig::manual());
/// storage.run_gc();
/// ```
pub struct MemoryStorage {
    data: Arc<DashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
    gc_config: GcConfig,
    op_count: AtomicU64,
    gc_lock: Mutex<()>,
    shutdown: Arc<Notify>,
    unavailable: AtomicBool,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.data.len())
            .field("gc_config", &self.gc_config)
            .finish()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create a new memory storage with default GC configuration.
    pub fn new() -> Self {
        Self::with_gc(GcConfig::default())
    }

    /// Create a new memory storage with custom GC configuration.
    pub fn with_gc(gc_config: GcConfig) -> Self {
        Self::with_clock_and_gc(Arc::new(SystemClock), gc_config)
    }

    /// Create a memory storage whose TTLs follow `clock`.
    pub fn with_clock(clock: impl Clock) -> Self {
        Self::with_clock_and_gc(Arc::new(clock), GcConfig::default())
    }

    /// Create a memory storage with both a custom clock and GC configuration.
    pub fn with_clock_and_gc(clock: Arc<dyn Clock>, gc_config: GcConfig) -> Self {
        let storage = Self {
            data: Arc::new(DashMap::new()),
            clock,
            gc_config: gc_config.clone(),
            op_count: AtomicU64::new(0),
            gc_lock: Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
            unavailable: AtomicBool::new(false),
        };

        // Start background GC task if duration-based
        if let GcInterval::Duration(interval) = gc_config.interval {
            storage.start_gc_task(interval);
        }

        storage
    }

    /// Start background GC task.
    fn start_gc_task(&self, interval: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime, background GC disabled; call run_gc manually");
            return;
        };

        let data = Arc::clone(&self.data);
        let clock = Arc::clone(&self.clock);
        let shutdown = Arc::clone(&self.shutdown);

        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        run_gc_on_map(&data, clock.now_ms());
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });
    }

    /// Manually trigger garbage collection. Returns the number of keys removed.
    pub fn run_gc(&self) -> usize {
        run_gc_on_map(&self.data, self.clock.now_ms())
    }

    /// Get the number of keys currently stored, including expired keys not yet
    /// collected.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Remaining time-to-live of a live key, `None` if the key is absent or
    /// has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.data
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .and_then(|slot| slot.expires_at)
            .map(|at| Duration::from_millis(at - now))
    }

    /// Simulate a store outage: while set, every operation fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Common preamble for every operation.
    fn begin(&self) -> Result<u64> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("memory store marked unavailable", true).into());
        }
        self.maybe_run_gc();
        Ok(self.clock.now_ms())
    }

    /// Check if GC should run and run it if needed.
    fn maybe_run_gc(&self) {
        if let GcInterval::Requests(threshold) = self.gc_config.interval {
            let count = self.op_count.fetch_add(1, Ordering::Relaxed);
            if count % threshold.max(1) == 0 && count > 0 {
                // Try to acquire GC lock (non-blocking)
                if let Some(_guard) = self.gc_lock.try_lock() {
                    let removed = run_gc_on_map(&self.data, self.clock.now_ms());
                    tracing::trace!(removed, "memory store gc");
                }
            }
        }
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

/// Drop every expired key from the map.
fn run_gc_on_map(data: &DashMap<String, Slot>, now: u64) -> usize {
    let before = data.len();
    data.retain(|_, slot| !slot.is_expired(now));
    before.saturating_sub(data.len())
}

fn ttl_ms(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.begin()?;

        if let Some(slot) = self.data.get(key) {
            if !slot.is_expired(now) {
                return Ok(Some(slot.value.clone()));
            }
            // Entry expired, remove it
            drop(slot);
            self.data.remove_if(key, |_, slot| slot.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.begin()?;
        self.data.insert(key.to_string(), Slot::persistent(value));
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let now = self.begin()?;

        let mut slot = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Slot::persistent("0"));
        if slot.is_expired(now) {
            *slot = Slot::persistent("0");
        }

        let current: i64 = slot
            .value
            .parse()
            .map_err(|_| StoreError::malformed(key, slot.value.clone()))?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::unavailable("increment would overflow", false))?;
        slot.value = next.to_string();

        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.begin()?;

        match self.data.get_mut(key) {
            Some(mut slot) if !slot.is_expired(now) => {
                slot.expires_at = Some(now + ttl_ms(ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = self.begin()?;
        let new_expiry = ttl.map(|ttl| now + ttl_ms(ttl));

        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let live = !occupied.get().is_expired(now);
                let current = live.then(|| occupied.get().value.as_str());
                if current != expected {
                    return Ok(false);
                }

                let expires_at = match new_expiry {
                    Some(at) => Some(at),
                    None if live => occupied.get().expires_at,
                    None => None,
                };
                occupied.insert(Slot {
                    value: new.to_string(),
                    expires_at,
                });
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(Slot {
                    value: new.to_string(),
                    expires_at: new_expiry,
                });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.begin()?;
        self.data.remove(key);
        Ok(())
    }
}

//! Thresholding cache contract and its backends.
//!
//! The event-level calls (`check_threshold`, `set_threshold`, `threshold_event`) reduce
//! `(event, source)` to a [`CacheKey`] and forward to the key-level calls each backend
//! implements. Backends only differ in where windows live and how keys are derived.

mod memory;
mod noop;
mod persistent;

pub use memory::MemoryCache;
pub use noop::NoThresholdingCache;
pub use persistent::PersistentCache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, ThresholdError};
use crate::event::Event;
use crate::key;
use crate::types::{CacheKey, CleanupStats, RelapsedEvent, Severity};

#[async_trait]
pub trait ThresholdingCache: Send + Sync {
  /// Key for `(event, source)`. Backends may bind the source differently.
  fn cache_key(&self, event: &Event, source: &str) -> CacheKey {
    key::compute(event, source)
  }

  /// Whether a live window exists for `key` at `ttl`.
  async fn check(&mut self, key: &CacheKey, ttl: DateTime<Utc>) -> Result<bool>;

  /// Open a window for `key`; no-op when one is already live.
  async fn set(
    &mut self,
    key: &CacheKey,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<()>;

  /// Register one suppressed occurrence; saving the same `(event_id, key)` again is fine.
  async fn save(
    &mut self,
    event_id: &str,
    key: &CacheKey,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<()>;

  async fn relapses(
    &self,
    group_name: &str,
    severity: Severity,
    ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>>;

  /// Evict windows expired at `cutoff` and occurrences that no longer belong to one.
  async fn cleanup(&mut self, cutoff: DateTime<Utc>) -> Result<CleanupStats>;

  async fn check_threshold(
    &mut self,
    event: &Event,
    source: &str,
    ttl: DateTime<Utc>,
  ) -> Result<bool> {
    let key = self.cache_key(event, source);
    self.check(&key, ttl).await
  }

  async fn set_threshold(
    &mut self,
    event: &Event,
    source: &str,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<()> {
    let key = self.cache_key(event, source);
    self.set(&key, threshold_time, relapse_time, ttl).await
  }

  async fn threshold_event(
    &mut self,
    event: &Event,
    source: &str,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<()> {
    let event_id = event
      .id()
      .ok_or_else(|| ThresholdError::validation("ID", "event has no string ID"))?;
    let key = self.cache_key(event, source);
    self.save(event_id, &key, group_name, severity, created_time).await
  }
}

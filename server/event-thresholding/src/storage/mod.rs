//! Durable thresholding storage shared between reporting workers.
//!
//! Two tables' worth of state: threshold windows keyed by cache key, and suppressed
//! occurrences keyed by `(event_id, key)`. Both inserts report a lost race as
//! [`InsertOutcome::AlreadyExists`] instead of failing, which is what keeps concurrent
//! workers correct without any other coordination.

mod memory;
mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{RelapsedEvent, Severity};

/// Result of a uniqueness-constrained insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
  Created,
  AlreadyExists,
}

#[async_trait]
pub trait EventStorage: Send + Sync {
  /// Whether a threshold record for `key` is live at `ttl`.
  async fn threshold_check(&self, key: &str, ttl: DateTime<Utc>) -> Result<bool>;

  /// Open a threshold window for `key`.
  ///
  /// `AlreadyExists` when a record for `key` ends after `threshold_time`. A record with
  /// `ttl <= threshold_time` has expired, as in relapse search, and is replaced even if
  /// cleanup has not removed it yet.
  async fn threshold_set(
    &self,
    key: &str,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<InsertOutcome>;

  /// Record one suppressed occurrence. `AlreadyExists` on duplicate `(event_id, key)`.
  async fn threshold_save(
    &self,
    event_id: &str,
    key: &str,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<InsertOutcome>;

  /// Events of `group_name`/`severity` suppressed during the relapse tail of a window
  /// that has expired by `ttl`, with the keys they were suppressed under.
  async fn search_relapsed_events(
    &self,
    group_name: &str,
    severity: Severity,
    ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>>;

  /// Remove threshold records with ttl at or before `cutoff`.
  async fn thresholds_clean(&self, cutoff: DateTime<Utc>) -> Result<u64>;

  /// Remove occurrences whose window is gone or which predate their window.
  async fn thresholded_events_clean(&self) -> Result<u64>;

  async fn thresholds_count(&self) -> Result<u64>;

  async fn thresholded_events_count(&self) -> Result<u64>;
}

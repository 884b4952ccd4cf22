//! Cache backed by shared [`EventStorage`]; the only backend safe across workers.
//!
//! A per-instance existence map saves store round-trips for keys already seen in this
//! run. It is never shared between instances and is dropped on every cleanup.
//!
//! Only windows this instance opened itself skip the store on `set`. A key that `check`
//! reported live may still be expiring at exactly the run time, and the store decides
//! whether such a window is renewed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::ThresholdingCache;
use crate::error::Result;
use crate::storage::{EventStorage, InsertOutcome};
use crate::types::{CacheKey, CleanupStats, RelapsedEvent, Severity};

pub struct PersistentCache {
  store: Arc<dyn EventStorage>,
  memcache: HashMap<String, bool>,
  opened: HashSet<String>,
}

impl PersistentCache {
  pub fn new(store: Arc<dyn EventStorage>) -> Self {
    Self {
      store,
      memcache: HashMap::new(),
      opened: HashSet::new(),
    }
  }

  /// Number of keys whose existence is remembered locally.
  pub fn cached_keys(&self) -> usize {
    self.memcache.len()
  }
}

#[async_trait]
impl ThresholdingCache for PersistentCache {
  async fn check(&mut self, key: &CacheKey, ttl: DateTime<Utc>) -> Result<bool> {
    if let Some(&live) = self.memcache.get(key.as_str()) {
      return Ok(live);
    }
    let live = self.store.threshold_check(key.as_str(), ttl).await?;
    self.memcache.insert(key.0.clone(), live);
    Ok(live)
  }

  async fn set(
    &mut self,
    key: &CacheKey,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<()> {
    if self.opened.contains(key.as_str()) {
      return Ok(());
    }

    let outcome = self
      .store
      .threshold_set(key.as_str(), threshold_time, relapse_time, ttl)
      .await?;
    match outcome {
      InsertOutcome::Created => info!(
        ttl = %ttl.to_rfc3339(),
        relapse = %relapse_time.to_rfc3339(),
        threshold = %threshold_time.to_rfc3339(),
        key = %key,
        "updated thresholding cache with record"
      ),
      // Another worker opened this window first.
      InsertOutcome::AlreadyExists => info!(
        ttl = %ttl.to_rfc3339(),
        relapse = %relapse_time.to_rfc3339(),
        threshold = %threshold_time.to_rfc3339(),
        key = %key,
        "prolonged thresholding cache record"
      ),
    }
    self.memcache.insert(key.0.clone(), true);
    self.opened.insert(key.0.clone());
    Ok(())
  }

  async fn save(
    &mut self,
    event_id: &str,
    key: &CacheKey,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<()> {
    let outcome = self
      .store
      .threshold_save(event_id, key.as_str(), group_name, severity, created_time)
      .await?;
    match outcome {
      InsertOutcome::Created => info!(
        created = %created_time.to_rfc3339(),
        key = %key,
        event_id,
        group = group_name,
        severity = %severity,
        "recorded thresholded event"
      ),
      InsertOutcome::AlreadyExists => info!(
        created = %created_time.to_rfc3339(),
        key = %key,
        event_id,
        group = group_name,
        severity = %severity,
        "event is already thresholded"
      ),
    }
    Ok(())
  }

  async fn relapses(
    &self,
    group_name: &str,
    severity: Severity,
    ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>> {
    self.store.search_relapsed_events(group_name, severity, ttl).await
  }

  async fn cleanup(&mut self, cutoff: DateTime<Utc>) -> Result<CleanupStats> {
    self.memcache.clear();
    self.opened.clear();

    let thresholds = self.store.thresholds_clean(cutoff).await?;
    info!(
      count = thresholds,
      cutoff = %cutoff.to_rfc3339(),
      "cleaned records from thresholding cache"
    );
    let events = self.store.thresholded_events_clean().await?;
    info!(count = events, "cleaned records from registry of thresholded events");

    Ok(CleanupStats { thresholds, events })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Event;
  use crate::storage::MemoryEventStore;
  use chrono::{Duration, TimeZone};
  use serde_json::json;

  fn t(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
  }

  fn scanning(id: &str) -> Event {
    Event::new(json!({"ID": id, "Category": ["Recon.Scanning"]}))
  }

  fn cache_over(store: &Arc<MemoryEventStore>) -> PersistentCache {
    PersistentCache::new(store.clone())
  }

  #[tokio::test]
  async fn set_then_check_then_cleanup() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    let event = scanning("e1");

    assert!(!cache.check_threshold(&event, "198.51.100.7", t(10)).await.unwrap());
    cache.set_threshold(&event, "198.51.100.7", t(10), t(11), t(12)).await.unwrap();

    // Fresh instance so the answer comes from the store, not the local map.
    let mut other = cache_over(&store);
    assert!(other.check_threshold(&event, "198.51.100.7", t(12)).await.unwrap());

    let stats = other.cleanup(t(13)).await.unwrap();
    assert_eq!(stats.thresholds, 1);
    assert_eq!(other.cached_keys(), 0);
    assert!(!other.check_threshold(&event, "198.51.100.7", t(12)).await.unwrap());
  }

  #[tokio::test]
  async fn check_remembers_store_answer() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    let event = scanning("e1");

    assert!(!cache.check_threshold(&event, "s", t(10)).await.unwrap());
    // Another worker opens the window; this run keeps its earlier answer.
    store
      .threshold_set("Recon.Scanning+++s", t(10), t(11), t(12))
      .await
      .unwrap();
    assert!(!cache.check_threshold(&event, "s", t(10)).await.unwrap());
    assert_eq!(cache.cached_keys(), 1);
  }

  #[tokio::test]
  async fn set_after_lost_race_is_ok_and_keeps_first_window() {
    let store = Arc::new(MemoryEventStore::new());
    let mut a = cache_over(&store);
    let mut b = cache_over(&store);
    let event = scanning("e1");

    assert!(!a.check_threshold(&event, "s", t(10)).await.unwrap());
    assert!(!b.check_threshold(&event, "s", t(10)).await.unwrap());

    a.set_threshold(&event, "s", t(10), t(11), t(12)).await.unwrap();
    b.set_threshold(&event, "s", t(10), t(13), t(14)).await.unwrap();

    assert_eq!(store.thresholds_count().await.unwrap(), 1);
    assert_eq!(store.threshold_record("Recon.Scanning+++s").unwrap().ttl, t(12));
  }

  #[tokio::test]
  async fn set_renews_window_checked_live_at_its_ttl() {
    let store = Arc::new(MemoryEventStore::new());
    let event = scanning("e1");
    store
      .threshold_set("Recon.Scanning+++s", t(10), t(11), t(12))
      .await
      .unwrap();

    let mut cache = cache_over(&store);
    assert!(cache.check_threshold(&event, "s", t(12)).await.unwrap());
    cache.set_threshold(&event, "s", t(12), t(13), t(14)).await.unwrap();
    assert_eq!(store.threshold_record("Recon.Scanning+++s").unwrap().ttl, t(14));

    // Opened by this instance: further sets stay local.
    cache.set_threshold(&event, "s", t(12), t(15), t(16)).await.unwrap();
    assert_eq!(store.threshold_record("Recon.Scanning+++s").unwrap().ttl, t(14));
  }

  #[tokio::test]
  async fn duplicate_save_is_not_an_error() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    let event = scanning("e1");

    cache.threshold_event(&event, "s", "grp", Severity::High, t(10)).await.unwrap();
    cache.threshold_event(&event, "s", "grp", Severity::High, t(10)).await.unwrap();
    assert_eq!(store.thresholded_events_count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn threshold_event_without_id_is_rejected() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    let event = Event::new(json!({"Category": ["Recon.Scanning"]}));
    let err = cache
      .threshold_event(&event, "s", "grp", Severity::Low, t(10))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("ID"));
  }

  #[tokio::test]
  async fn relapses_come_from_store() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    let event = scanning("e1");
    store.insert_event(event.clone()).unwrap();

    cache.set_threshold(&event, "s", t(10), t(11), t(12)).await.unwrap();
    cache
      .threshold_event(&event, "s", "grp", Severity::Medium, t(11) + Duration::minutes(5))
      .await
      .unwrap();

    let relapsed = cache.relapses("grp", Severity::Medium, t(12)).await.unwrap();
    assert_eq!(relapsed.len(), 1);
    assert_eq!(relapsed[0].keys, vec!["Recon.Scanning+++s"]);
  }

  #[tokio::test]
  async fn cleanup_with_nothing_to_remove_returns_zeros() {
    let store = Arc::new(MemoryEventStore::new());
    let mut cache = cache_over(&store);
    assert_eq!(cache.cleanup(t(10)).await.unwrap(), CleanupStats::default());
  }
}

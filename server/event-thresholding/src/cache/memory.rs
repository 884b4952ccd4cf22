//! Process-local cache: remembers which keys were thresholded during this process.
//!
//! No ttl tracking and no relapse support. The single-source variant is the same
//! cache with a fixed [`SourceBinding`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ThresholdingCache;
use crate::error::Result;
use crate::event::Event;
use crate::key::SourceBinding;
use crate::types::{CacheKey, CleanupStats, RelapsedEvent, Severity};

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
  binding: SourceBinding,
  memcache: HashSet<String>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cache for runs where every event is known to come from `source`.
  pub fn single_source(source: impl Into<String>) -> Self {
    Self {
      binding: SourceBinding::Fixed(source.into()),
      memcache: HashSet::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.memcache.len()
  }

  pub fn is_empty(&self) -> bool {
    self.memcache.is_empty()
  }
}

#[async_trait]
impl ThresholdingCache for MemoryCache {
  fn cache_key(&self, event: &Event, source: &str) -> CacheKey {
    self.binding.derive(event, source)
  }

  async fn check(&mut self, key: &CacheKey, _ttl: DateTime<Utc>) -> Result<bool> {
    Ok(self.memcache.contains(key.as_str()))
  }

  async fn set(
    &mut self,
    key: &CacheKey,
    _threshold_time: DateTime<Utc>,
    _relapse_time: DateTime<Utc>,
    _ttl: DateTime<Utc>,
  ) -> Result<()> {
    self.memcache.insert(key.0.clone());
    Ok(())
  }

  async fn save(
    &mut self,
    _event_id: &str,
    _key: &CacheKey,
    _group_name: &str,
    _severity: Severity,
    _created_time: DateTime<Utc>,
  ) -> Result<()> {
    Ok(())
  }

  async fn relapses(
    &self,
    _group_name: &str,
    _severity: Severity,
    _ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>> {
    Ok(Vec::new())
  }

  async fn cleanup(&mut self, _cutoff: DateTime<Utc>) -> Result<CleanupStats> {
    let stats = CleanupStats {
      thresholds: self.memcache.len() as u64,
      events: 0,
    };
    self.memcache.clear();
    Ok(stats)
  }
}

//! Cache that never suppresses anything; for ad-hoc report runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ThresholdingCache;
use crate::error::Result;
use crate::types::{CacheKey, CleanupStats, RelapsedEvent, Severity};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoThresholdingCache;

#[async_trait]
impl ThresholdingCache for NoThresholdingCache {
  async fn check(&mut self, _key: &CacheKey, _ttl: DateTime<Utc>) -> Result<bool> {
    Ok(false)
  }

  async fn set(
    &mut self,
    _key: &CacheKey,
    _threshold_time: DateTime<Utc>,
    _relapse_time: DateTime<Utc>,
    _ttl: DateTime<Utc>,
  ) -> Result<()> {
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
    Ok(CleanupStats::default())
  }
}

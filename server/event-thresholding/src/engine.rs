//! Core engine: one abuse group's thresholding state across report runs.

use chrono::{DateTime, Utc};

use crate::cache::ThresholdingCache;
use crate::error::Result;
use crate::event::Event;
use crate::pipeline::{self, EventsBySource};
use crate::timing::{TimingPolicy, TimingSettings};
use crate::types::{CleanupStats, Severity};

/// What a report run should send, before anything is committed to the cache.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
  pub regular: Vec<Event>,
  pub regular_by_source: EventsBySource,
  pub relapsed: Vec<Event>,
  pub relapsed_by_source: EventsBySource,
  /// Events suppressed in this run.
  pub blocked: usize,
}

impl Evaluation {
  /// Nothing to report: no regular and no relapsed events.
  pub fn is_empty(&self) -> bool {
    self.regular.is_empty() && self.relapsed.is_empty()
  }

  pub fn reported_count(&self) -> usize {
    self.regular.len() + self.relapsed.len()
  }
}

/// Thresholding engine for one abuse group. The timing policy is resolved once.
pub struct Engine {
  cache: Box<dyn ThresholdingCache>,
  group_name: String,
  policy: TimingPolicy,
}

impl Engine {
  pub fn new(
    cache: Box<dyn ThresholdingCache>,
    group_name: impl Into<String>,
    policy: TimingPolicy,
  ) -> Self {
    Self {
      cache,
      group_name: group_name.into(),
      policy,
    }
  }

  pub fn for_group(
    cache: Box<dyn ThresholdingCache>,
    group_name: impl Into<String>,
    settings: &TimingSettings,
  ) -> Self {
    Self::new(cache, group_name, TimingPolicy::resolve(settings))
  }

  pub fn group_name(&self) -> &str {
    &self.group_name
  }

  pub fn policy(&self) -> &TimingPolicy {
    &self.policy
  }

  /// Threshold a batch and collect relapses for `severity` at `time_h`.
  ///
  /// Suppressed occurrences are registered immediately; windows for the reported
  /// events are only opened by [`Engine::commit`], once the report went out.
  pub async fn evaluate(
    &mut self,
    severity: Severity,
    events_by_source: &EventsBySource,
    time_h: DateTime<Utc>,
  ) -> Result<Evaluation> {
    let thresholded = pipeline::threshold_events(
      &mut *self.cache,
      events_by_source,
      &self.group_name,
      severity,
      time_h,
    )
    .await?;

    let relapsed =
      pipeline::relapse_events(&*self.cache, &self.group_name, severity, time_h).await?;
    let (relapsed, relapsed_by_source) = pipeline::aggregate_relapsed_events(relapsed);

    Ok(Evaluation {
      regular: thresholded.passed,
      regular_by_source: thresholded.passed_by_source,
      relapsed,
      relapsed_by_source,
      blocked: thresholded.blocked,
    })
  }

  /// Open threshold windows for everything an evaluation reported.
  pub async fn commit(
    &mut self,
    severity: Severity,
    evaluation: &Evaluation,
    time_h: DateTime<Utc>,
  ) -> Result<()> {
    let entry = *self.policy.get(severity);
    for reported in [&evaluation.regular_by_source, &evaluation.relapsed_by_source] {
      pipeline::update_thresholding_cache(&mut *self.cache, reported, &entry, time_h).await?;
    }
    Ok(())
  }

  pub async fn cleanup(&mut self, cutoff: DateTime<Utc>) -> Result<CleanupStats> {
    self.cache.cleanup(cutoff).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryCache, NoThresholdingCache};
  use crate::timing::{EntryOverrides, TimingMode};
  use chrono::{Duration, TimeZone};
  use serde_json::json;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
  }

  fn batch() -> EventsBySource {
    let mut batch = EventsBySource::new();
    batch.insert(
      "198.51.100.7".into(),
      vec![Event::new(json!({"ID": "e1", "Category": ["Recon.Scanning"]}))],
    );
    batch
  }

  #[tokio::test]
  async fn evaluate_commit_evaluate_suppresses() {
    let mut engine = Engine::new(Box::new(MemoryCache::new()), "grp", TimingPolicy::defaults());

    let first = engine.evaluate(Severity::High, &batch(), now()).await.unwrap();
    assert_eq!(first.reported_count(), 1);
    engine.commit(Severity::High, &first, now()).await.unwrap();

    let second = engine
      .evaluate(Severity::High, &batch(), now() + Duration::minutes(10))
      .await
      .unwrap();
    assert!(second.is_empty());
    assert_eq!(second.blocked, 1);
  }

  #[tokio::test]
  async fn without_commit_nothing_is_suppressed() {
    let mut engine = Engine::new(Box::new(MemoryCache::new()), "grp", TimingPolicy::defaults());
    engine.evaluate(Severity::Low, &batch(), now()).await.unwrap();
    let again = engine.evaluate(Severity::Low, &batch(), now()).await.unwrap();
    assert_eq!(again.regular.len(), 1);
  }

  #[tokio::test]
  async fn noop_cache_never_suppresses() {
    let mut engine = Engine::new(Box::new(NoThresholdingCache), "grp", TimingPolicy::defaults());
    let first = engine.evaluate(Severity::Critical, &batch(), now()).await.unwrap();
    engine.commit(Severity::Critical, &first, now()).await.unwrap();
    let second = engine.evaluate(Severity::Critical, &batch(), now()).await.unwrap();
    assert_eq!(second.regular.len(), 1);
    assert_eq!(engine.cleanup(now()).await.unwrap(), CleanupStats::default());
  }

  #[test]
  fn for_group_resolves_policy_once() {
    let settings = TimingSettings {
      mode: Some(TimingMode::Custom),
      medium: EntryOverrides {
        period: Some(120),
        ..Default::default()
      },
      ..Default::default()
    };
    let engine = Engine::for_group(Box::new(NoThresholdingCache), "grp", &settings);
    assert_eq!(engine.policy().get(Severity::Medium).period, Duration::minutes(2));
    assert_eq!(engine.group_name(), "grp");
  }
}

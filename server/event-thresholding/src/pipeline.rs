//! Report-run steps built on a [`ThresholdingCache`].
//!
//! One run for an abuse group and severity goes: [`threshold_events`] over the
//! candidate events, [`relapse_events`] + [`aggregate_relapsed_events`] for windows that
//! expired, report, then [`update_thresholding_cache`] for everything reported.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cache::ThresholdingCache;
use crate::error::{Result, ThresholdError};
use crate::event::Event;
use crate::key::source_from_cache_key;
use crate::timing::TimingEntry;
use crate::types::{RelapsedEvent, Severity};

/// Events grouped by the source they are reported for.
pub type EventsBySource = BTreeMap<String, Vec<Event>>;

/// Result of thresholding one batch.
#[derive(Debug, Clone, Default)]
pub struct ThresholdOutcome {
  /// Events that passed for at least one source, each once, in first-seen order.
  pub passed: Vec<Event>,
  pub passed_by_source: EventsBySource,
  /// Distinct events blocked for every source they appeared under.
  pub blocked: usize,
}

fn require_id(event: &Event) -> Result<&str> {
  event
    .id()
    .ok_or_else(|| ThresholdError::validation("ID", "event has no string ID"))
}

/// Split a batch into passed and suppressed; suppressed occurrences are registered
/// with the cache for later relapse search.
pub async fn threshold_events<C>(
  cache: &mut C,
  events_by_source: &EventsBySource,
  group_name: &str,
  severity: Severity,
  time_h: DateTime<Utc>,
) -> Result<ThresholdOutcome>
where
  C: ThresholdingCache + ?Sized,
{
  let mut outcome = ThresholdOutcome::default();
  let mut passed_ids: HashSet<String> = HashSet::new();
  let mut blocked_ids: HashSet<String> = HashSet::new();

  for (source, events) in events_by_source {
    for event in events {
      let id = require_id(event)?;
      if !cache.check_threshold(event, source, time_h).await? {
        outcome
          .passed_by_source
          .entry(source.clone())
          .or_default()
          .push(event.clone());
        if passed_ids.insert(id.to_string()) {
          outcome.passed.push(event.clone());
        }
      } else {
        blocked_ids.insert(id.to_string());
        cache
          .threshold_event(event, source, group_name, severity, time_h)
          .await?;
      }
    }
  }

  outcome.blocked = blocked_ids.difference(&passed_ids).count();
  if outcome.passed.is_empty() {
    info!(
      group = group_name,
      blocked = outcome.blocked,
      "thresholds blocked all events, nothing to report"
    );
  } else {
    info!(
      group = group_name,
      passed = outcome.passed.len(),
      blocked = outcome.blocked,
      "thresholds let events through"
    );
  }
  Ok(outcome)
}

/// Events of this group/severity that relapsed by `time_h`.
pub async fn relapse_events<C>(
  cache: &C,
  group_name: &str,
  severity: Severity,
  time_h: DateTime<Utc>,
) -> Result<Vec<RelapsedEvent>>
where
  C: ThresholdingCache + ?Sized,
{
  let events = cache.relapses(group_name, severity, time_h).await?;
  if events.is_empty() {
    debug!(
      group = group_name,
      severity = %severity,
      ttl = %time_h.to_rfc3339(),
      "no relapsed events"
    );
  } else {
    info!(
      group = group_name,
      count = events.len(),
      severity = %severity,
      ttl = %time_h.to_rfc3339(),
      "found relapsed events"
    );
  }
  Ok(events)
}

/// Flatten relapsed events and regroup them by the source recovered from each key.
pub fn aggregate_relapsed_events(relapsed: Vec<RelapsedEvent>) -> (Vec<Event>, EventsBySource) {
  let mut events = Vec::with_capacity(relapsed.len());
  let mut by_source = EventsBySource::new();
  for RelapsedEvent { event, keys } in relapsed {
    for key in &keys {
      by_source
        .entry(source_from_cache_key(key).to_string())
        .or_default()
        .push(event.clone());
    }
    events.push(event);
  }
  (events, by_source)
}

/// Open a threshold window for every reported `(event, source)` pair.
pub async fn update_thresholding_cache<C>(
  cache: &mut C,
  reported: &EventsBySource,
  entry: &TimingEntry,
  time_h: DateTime<Utc>,
) -> Result<()>
where
  C: ThresholdingCache + ?Sized,
{
  let (ttl, relapse_time) = entry.window(time_h);
  for (source, events) in reported {
    for event in events {
      cache
        .set_threshold(event, source, time_h, relapse_time, ttl)
        .await?;
    }
  }
  Ok(())
}

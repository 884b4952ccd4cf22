//! In-process event storage. Same constraints as the PostgreSQL tables, one mutex.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{EventStorage, InsertOutcome};
use crate::error::{Result, ThresholdError};
use crate::event::Event;
use crate::types::{RelapsedEvent, Severity, ThresholdRecord, ThresholdedEventRecord};

#[derive(Debug, Default)]
struct State {
  thresholds: HashMap<String, ThresholdRecord>,
  /// Keyed by `(event_id, key)`, which is also the uniqueness constraint.
  thresholded: BTreeMap<(String, String), ThresholdedEventRecord>,
  /// Event bodies by id, needed to answer relapse searches.
  events: HashMap<String, Event>,
}

/// Event storage held in process memory; share between workers with `Arc`.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
  state: Mutex<State>,
}

impl MemoryEventStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store an event body so relapse searches can return it.
  pub fn insert_event(&self, event: Event) -> Result<()> {
    let id = event
      .id()
      .ok_or_else(|| ThresholdError::validation("ID", "event has no string ID"))?
      .to_string();
    self.state.lock().events.insert(id, event);
    Ok(())
  }

  pub fn threshold_record(&self, key: &str) -> Option<ThresholdRecord> {
    self.state.lock().thresholds.get(key).cloned()
  }

  pub fn thresholded_records(&self) -> Vec<ThresholdedEventRecord> {
    self.state.lock().thresholded.values().cloned().collect()
  }
}

#[async_trait]
impl EventStorage for MemoryEventStore {
  async fn threshold_check(&self, key: &str, ttl: DateTime<Utc>) -> Result<bool> {
    let state = self.state.lock();
    Ok(state.thresholds.get(key).is_some_and(|rec| rec.is_live(ttl)))
  }

  async fn threshold_set(
    &self,
    key: &str,
    threshold_time: DateTime<Utc>,
    relapse_time: DateTime<Utc>,
    ttl: DateTime<Utc>,
  ) -> Result<InsertOutcome> {
    let mut state = self.state.lock();
    // A window ending exactly at `threshold_time` has expired for relapse search too.
    if let Some(existing) = state.thresholds.get(key) {
      if existing.ttl > threshold_time {
        return Ok(InsertOutcome::AlreadyExists);
      }
    }
    state.thresholds.insert(
      key.to_string(),
      ThresholdRecord {
        key: key.to_string(),
        threshold_time,
        relapse_time,
        ttl,
      },
    );
    Ok(InsertOutcome::Created)
  }

  async fn threshold_save(
    &self,
    event_id: &str,
    key: &str,
    group_name: &str,
    severity: Severity,
    created_time: DateTime<Utc>,
  ) -> Result<InsertOutcome> {
    let mut state = self.state.lock();
    let pk = (event_id.to_string(), key.to_string());
    if state.thresholded.contains_key(&pk) {
      return Ok(InsertOutcome::AlreadyExists);
    }
    state.thresholded.insert(
      pk,
      ThresholdedEventRecord {
        event_id: event_id.to_string(),
        key: key.to_string(),
        group_name: group_name.to_string(),
        severity,
        created_time,
      },
    );
    Ok(InsertOutcome::Created)
  }

  async fn search_relapsed_events(
    &self,
    group_name: &str,
    severity: Severity,
    ttl: DateTime<Utc>,
  ) -> Result<Vec<RelapsedEvent>> {
    let state = self.state.lock();

    // Ordered by event id, like the GROUP BY on the relational side.
    let mut keys_by_event: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for rec in state.thresholded.values() {
      if rec.group_name != group_name || rec.severity != severity {
        continue;
      }
      let Some(window) = state.thresholds.get(&rec.key) else {
        continue;
      };
      if window.ttl <= ttl && rec.created_time >= window.relapse_time {
        keys_by_event
          .entry(rec.event_id.as_str())
          .or_default()
          .push(rec.key.clone());
      }
    }

    Ok(
      keys_by_event
        .into_iter()
        .filter_map(|(event_id, keys)| {
          state.events.get(event_id).map(|event| RelapsedEvent {
            event: event.clone(),
            keys,
          })
        })
        .collect(),
    )
  }

  async fn thresholds_clean(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let mut state = self.state.lock();
    let before = state.thresholds.len();
    state.thresholds.retain(|_, rec| rec.ttl > cutoff);
    Ok((before - state.thresholds.len()) as u64)
  }

  async fn thresholded_events_clean(&self) -> Result<u64> {
    let mut state = self.state.lock();
    let State {
      thresholds,
      thresholded,
      ..
    } = &mut *state;

    let before = thresholded.len();
    thresholded.retain(|_, rec| {
      thresholds
        .get(&rec.key)
        .is_some_and(|window| rec.created_time >= window.threshold_time)
    });
    Ok((before - thresholded.len()) as u64)
  }

  async fn thresholds_count(&self) -> Result<u64> {
    Ok(self.state.lock().thresholds.len() as u64)
  }

  async fn thresholded_events_count(&self) -> Result<u64> {
    Ok(self.state.lock().thresholded.len() as u64)
  }
}

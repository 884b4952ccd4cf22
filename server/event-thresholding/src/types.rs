//! Core types for the thresholding cache (records, keys, output contracts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::Event;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

  /// Name used in storage (`events_thresholded.eventseverity`).
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Cache key
// ---------------------------------------------------------------------------

/// Thresholding cache key: event class and source joined by [`crate::key::KEY_DELIMITER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Source the key was derived from.
  pub fn source(&self) -> &str {
    crate::key::source_from_cache_key(&self.0)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// One suppression window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdRecord {
  pub key: String,
  /// Start of the window (the report run that opened it).
  pub threshold_time: DateTime<Utc>,
  /// Occurrences at or after this time count as relapses once the window expires.
  pub relapse_time: DateTime<Utc>,
  /// End of the window.
  pub ttl: DateTime<Utc>,
}

impl ThresholdRecord {
  /// Live for a check at `at` while its ttl has not passed.
  pub fn is_live(&self, at: DateTime<Utc>) -> bool {
    self.ttl >= at
  }
}

/// One suppressed occurrence of an event under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdedEventRecord {
  pub event_id: String,
  pub key: String,
  pub group_name: String,
  pub severity: Severity,
  pub created_time: DateTime<Utc>,
}

/// An event whose suppression window expired while it kept recurring.
#[derive(Debug, Clone, PartialEq)]
pub struct RelapsedEvent {
  pub event: Event,
  /// Threshold keys the event was suppressed under.
  pub keys: Vec<String>,
}

/// Number of records removed by one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
  pub thresholds: u64,
  pub events: u64,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for the maintenance binary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}

//! Per-severity reporting timing: how often windows roll over, how long a
//! threshold suppresses, and how far back relapses are searched.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Severity;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Abuse group timing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingMode {
  #[default]
  Default,
  Custom,
}

impl TimingMode {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "default" | "" => Some(Self::Default),
      "custom" => Some(Self::Custom),
      _ => None,
    }
  }
}

/// Timing triple for one severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingEntry {
  /// How often a reporting window rolls over.
  pub period: Duration,
  /// How long a threshold suppresses equivalent events.
  pub threshold: Duration,
  /// Tail of the threshold window in which suppressed events count as relapses.
  pub relapse: Duration,
}

impl TimingEntry {
  fn from_secs(period: i64, threshold: i64, relapse: i64) -> Self {
    Self {
      period: Duration::seconds(period),
      threshold: Duration::seconds(threshold),
      relapse: Duration::seconds(relapse),
    }
  }

  /// Built-in timing for a severity.
  pub fn system_default(severity: Severity) -> Self {
    match severity {
      Severity::Low => Self::from_secs(DAY, 6 * DAY, 2 * DAY),
      Severity::Medium => Self::from_secs(HOUR, 2 * DAY, DAY),
      Severity::High => Self::from_secs(10 * MINUTE, DAY, 12 * HOUR),
      Severity::Critical => Self::from_secs(10 * MINUTE, 2 * HOUR, HOUR),
    }
  }

  /// Window opened by a report run at `time_h`: `(ttl, relapse_time)`.
  ///
  /// The window lasts `threshold`; its last `relapse` is the relapse tail.
  pub fn window(&self, time_h: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let ttl = time_h + self.threshold;
    (ttl, ttl - self.relapse)
  }
}

/// Optional overrides for one severity, in seconds. Zero counts as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOverrides {
  #[serde(default)]
  pub period: Option<u32>,
  #[serde(default)]
  pub threshold: Option<u32>,
  #[serde(default)]
  pub relapse: Option<u32>,
}

impl EntryOverrides {
  fn apply(&self, base: TimingEntry) -> TimingEntry {
    TimingEntry {
      period: pick(self.period, base.period),
      threshold: pick(self.threshold, base.threshold),
      relapse: pick(self.relapse, base.relapse),
    }
  }
}

fn pick(value: Option<u32>, fallback: Duration) -> Duration {
  match value {
    Some(secs) if secs > 0 => Duration::seconds(i64::from(secs)),
    _ => fallback,
  }
}

/// Timing part of an abuse group's reporting settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSettings {
  #[serde(default)]
  pub mode: Option<TimingMode>,
  #[serde(default)]
  pub low: EntryOverrides,
  #[serde(default)]
  pub medium: EntryOverrides,
  #[serde(default)]
  pub high: EntryOverrides,
  #[serde(default)]
  pub critical: EntryOverrides,
}

impl TimingSettings {
  pub fn overrides(&self, severity: Severity) -> &EntryOverrides {
    match severity {
      Severity::Low => &self.low,
      Severity::Medium => &self.medium,
      Severity::High => &self.high,
      Severity::Critical => &self.critical,
    }
  }
}

/// Fully resolved timing for all four severities. Build once per abuse group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
  low: TimingEntry,
  medium: TimingEntry,
  high: TimingEntry,
  critical: TimingEntry,
}

impl TimingPolicy {
  pub fn defaults() -> Self {
    Self {
      low: TimingEntry::system_default(Severity::Low),
      medium: TimingEntry::system_default(Severity::Medium),
      high: TimingEntry::system_default(Severity::High),
      critical: TimingEntry::system_default(Severity::Critical),
    }
  }

  /// Resolve from the group's settings.
  pub fn resolve(settings: &TimingSettings) -> Self {
    Self::resolve_forced(settings, None)
  }

  /// Resolve with an optional mode forced by the caller (ad-hoc runs).
  ///
  /// Precedence: forced mode, then group mode, then `default`.
  pub fn resolve_forced(settings: &TimingSettings, forced: Option<TimingMode>) -> Self {
    let mode = forced.or(settings.mode).unwrap_or_default();
    if mode == TimingMode::Default {
      return Self::defaults();
    }

    let entry = |severity| settings.overrides(severity).apply(TimingEntry::system_default(severity));
    Self {
      low: entry(Severity::Low),
      medium: entry(Severity::Medium),
      high: entry(Severity::High),
      critical: entry(Severity::Critical),
    }
  }

  pub fn get(&self, severity: Severity) -> &TimingEntry {
    match severity {
      Severity::Low => &self.low,
      Severity::Medium => &self.medium,
      Severity::High => &self.high,
      Severity::Critical => &self.critical,
    }
  }
}

impl Default for TimingPolicy {
  fn default() -> Self {
    Self::defaults()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn default_mode_uses_system_defaults() {
    let settings = TimingSettings {
      mode: Some(TimingMode::Default),
      high: EntryOverrides {
        threshold: Some(60),
        ..Default::default()
      },
      ..Default::default()
    };
    let policy = TimingPolicy::resolve(&settings);
    for severity in Severity::ALL {
      assert_eq!(*policy.get(severity), TimingEntry::system_default(severity));
    }
  }

  #[test]
  fn unset_mode_is_default() {
    assert_eq!(TimingPolicy::resolve(&TimingSettings::default()), TimingPolicy::defaults());
  }

  #[test]
  fn custom_single_override() {
    let settings = TimingSettings {
      mode: Some(TimingMode::Custom),
      high: EntryOverrides {
        threshold: Some(7200),
        ..Default::default()
      },
      ..Default::default()
    };
    let policy = TimingPolicy::resolve(&settings);

    let high = policy.get(Severity::High);
    let dflt = TimingEntry::system_default(Severity::High);
    assert_eq!(high.threshold, Duration::hours(2));
    assert_eq!(high.period, dflt.period);
    assert_eq!(high.relapse, dflt.relapse);

    for severity in [Severity::Low, Severity::Medium, Severity::Critical] {
      assert_eq!(*policy.get(severity), TimingEntry::system_default(severity));
    }
  }

  #[test]
  fn zero_override_falls_back() {
    let settings = TimingSettings {
      mode: Some(TimingMode::Custom),
      low: EntryOverrides {
        period: Some(0),
        threshold: Some(0),
        relapse: Some(3600),
      },
      ..Default::default()
    };
    let low = *TimingPolicy::resolve(&settings).get(Severity::Low);
    let dflt = TimingEntry::system_default(Severity::Low);
    assert_eq!(low.period, dflt.period);
    assert_eq!(low.threshold, dflt.threshold);
    assert_eq!(low.relapse, Duration::hours(1));
  }

  #[test]
  fn forced_mode_overrides_group_mode() {
    let settings = TimingSettings {
      mode: Some(TimingMode::Custom),
      critical: EntryOverrides {
        period: Some(30),
        ..Default::default()
      },
      ..Default::default()
    };
    let forced = TimingPolicy::resolve_forced(&settings, Some(TimingMode::Default));
    assert_eq!(forced, TimingPolicy::defaults());
  }

  #[test]
  fn settings_deserialize_from_group_json() {
    let settings: TimingSettings = serde_json::from_str(
      r#"{"mode": "custom", "medium": {"relapse": 600}}"#,
    )
    .unwrap();
    assert_eq!(settings.mode, Some(TimingMode::Custom));
    assert_eq!(settings.medium.relapse, Some(600));
    assert_eq!(settings.low, EntryOverrides::default());
  }

  #[test]
  fn window_arithmetic() {
    let time_h = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    let (ttl, relapse) = TimingEntry::system_default(Severity::Critical).window(time_h);
    assert_eq!(ttl, Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap());
    assert_eq!(relapse, Utc.with_ymd_and_hms(2025, 1, 15, 11, 0, 0).unwrap());
  }

  #[test]
  fn mode_parsing() {
    assert_eq!(TimingMode::from_str_loose("CUSTOM"), Some(TimingMode::Custom));
    assert_eq!(TimingMode::from_str_loose("default"), Some(TimingMode::Default));
    assert_eq!(TimingMode::from_str_loose("weekly"), None);
  }
}

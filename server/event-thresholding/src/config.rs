//! Maintenance configuration, read from the environment.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, ThresholdError};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const CLEANUP_GRACE_SECS: &str = "THRESHOLD_CLEANUP_GRACE_SECS";
pub const INIT_SCHEMA: &str = "THRESHOLD_INIT_SCHEMA";

/// Settings for the cleanup sweep.
#[derive(Debug, Clone)]
pub struct Config {
  /// PostgreSQL connection string for the event database.
  pub database_url: String,
  /// Windows must have been expired at least this long before they are removed.
  pub cleanup_grace: Duration,
  /// Create the thresholding tables before sweeping.
  pub init_schema: bool,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Build from any variable lookup (the process environment in production).
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let database_url = lookup(DATABASE_URL)
      .filter(|v| !v.trim().is_empty())
      .ok_or_else(|| ThresholdError::config(format!("{} must be set", DATABASE_URL)))?;

    let cleanup_grace = match lookup(CLEANUP_GRACE_SECS) {
      Some(raw) => {
        let secs: u32 = raw.trim().parse().map_err(|_| {
          ThresholdError::validation(CLEANUP_GRACE_SECS, "must be a non-negative number of seconds")
        })?;
        Duration::seconds(i64::from(secs))
      }
      None => Duration::zero(),
    };

    let init_schema = match lookup(INIT_SCHEMA) {
      Some(raw) => parse_bool(&raw)
        .ok_or_else(|| ThresholdError::validation(INIT_SCHEMA, "must be true or false"))?,
      None => false,
    };

    Ok(Self {
      database_url,
      cleanup_grace,
      init_schema,
    })
  }

  /// Cutoff for a sweep started at `now`.
  pub fn cleanup_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - self.cleanup_grace
  }
}

fn parse_bool(raw: &str) -> Option<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" | "" => Some(false),
    _ => None,
  }
}

//! Structured error types for the thresholding cache.
//!
//! Duplicate-key outcomes from the store are not errors; they come back as
//! [`InsertOutcome::AlreadyExists`](crate::storage::InsertOutcome). Everything here is
//! meant to propagate to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThresholdError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("config: {0}")]
  Config(String),

  #[error("storage: {0}")]
  Storage(#[from] sqlx_core::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl ThresholdError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, ThresholdError>;

//! Binary entrypoint: sweep expired thresholding records from the event database.
//!
//! Meant to be run by an external scheduler (e.g. daily). Writes exactly one JSON line
//! to stdout:
//! - CleanupStats (`{"thresholds": n, "events": m}`) on success
//! - An ErrorOutput when configuration or storage fails (exit status 1)

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;
use event_thresholding::logging::init_logging;
use event_thresholding::types::ErrorOutput;
use event_thresholding::{
  CleanupStats, Config, PersistentCache, PgEventStore, ThresholdError, ThresholdingCache,
};
use tracing::{error, info};

async fn run(config: &Config) -> Result<CleanupStats, ThresholdError> {
  let store = PgEventStore::connect(&config.database_url).await?;
  if config.init_schema {
    store.create_schema().await?;
  }

  let cutoff = config.cleanup_cutoff(Utc::now());
  info!(cutoff = %cutoff.to_rfc3339(), "starting thresholding cleanup");

  let mut cache = PersistentCache::new(Arc::new(store));
  cache.cleanup(cutoff).await
}

fn emit<T: serde::Serialize>(value: &T) {
  let stdout = io::stdout();
  let mut out = stdout.lock();
  let _ = serde_json::to_writer(&mut out, value);
  let _ = writeln!(out);
  let _ = out.flush();
}

#[tokio::main]
async fn main() {
  init_logging();

  let result = match Config::from_env() {
    Ok(config) => run(&config).await,
    Err(e) => Err(e),
  };

  match result {
    Ok(stats) => emit(&stats),
    Err(e) => {
      error!("thresholding cleanup failed: {}", e);
      let err = match &e {
        ThresholdError::Validation { field, reason } => {
          ErrorOutput::new(reason.clone()).with_field(field.clone())
        }
        _ => ErrorOutput::new(e.to_string()),
      };
      emit(&err);
      std::process::exit(1);
    }
  }
}

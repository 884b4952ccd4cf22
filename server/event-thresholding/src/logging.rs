//! Logging initialization for the maintenance binary.

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_logging() {
  // Write to STDERR so STDOUT stays a clean JSON-lines stream.
  // Uses RUST_LOG env var for filtering, defaults to "info" if not set.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  match dotenvy::dotenv() {
    Ok(path) => info!("Read dotenv file from: {}", path.display()),
    Err(dotenvy::Error::Io(io_error)) if io_error.kind() == std::io::ErrorKind::NotFound => {
      info!("Couldn't find a dotenv file")
    }
    Err(err) => warn!("Ignoring unreadable dotenv file: {err}"),
  }
}

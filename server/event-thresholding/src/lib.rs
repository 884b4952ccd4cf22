//! Event thresholding cache for periodic security event reporting.
//!
//! Decides which events are suppressed because an equivalent one was reported within
//! a live window, registers the suppressed occurrences, and finds the ones that kept
//! recurring ("relapsed") once the window expired.
//!
//! Backends range from no-op and process memory to shared storage that stays correct
//! when several reporting workers race on the same keys.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod key;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod timing;
pub mod types;

pub use cache::{MemoryCache, NoThresholdingCache, PersistentCache, ThresholdingCache};
pub use config::Config;
pub use engine::{Engine, Evaluation};
pub use error::{Result, ThresholdError};
pub use event::Event;
pub use storage::{EventStorage, InsertOutcome, MemoryEventStore, PgEventStore};
pub use timing::{TimingEntry, TimingMode, TimingPolicy, TimingSettings};
pub use types::{CacheKey, CleanupStats, RelapsedEvent, Severity};

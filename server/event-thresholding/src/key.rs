//! Stable cache key derivation for grouping events into threshold windows.

use crate::event::Event;
use crate::types::CacheKey;

/// Separator between event class and source in a cache key.
pub const KEY_DELIMITER: &str = "+++";

/// Custom field carrying an explicit event class.
pub const EVENT_CLASS_PATH: &str = "_CESNET.EventClass";

/// Fallback when no explicit class is set; values are joined with `/`.
pub const CATEGORY_PATH: &str = "Category";

/// Resolve the event class: explicit class if non-empty, otherwise joined categories.
pub fn event_class(event: &Event) -> String {
  match event.jpath_string(EVENT_CLASS_PATH) {
    Some(class) if !class.is_empty() => class,
    _ => event.jpath_strings(CATEGORY_PATH).join("/"),
  }
}

/// Compute the cache key for an event reported because of `source`.
///
/// Key components: event class + source. Neither may contain [`KEY_DELIMITER`]
/// if the source is to be recovered from the key.
pub fn compute(event: &Event, source: &str) -> CacheKey {
  CacheKey(format!("{}{}{}", event_class(event), KEY_DELIMITER, source))
}

/// Return the source a key was generated from.
///
/// Keys without the delimiter come back unchanged.
pub fn source_from_cache_key(key: &str) -> &str {
  let mut parts = key.split(KEY_DELIMITER);
  match (parts.next(), parts.next()) {
    (Some(_), Some(source)) if !key.is_empty() => source,
    _ => key,
  }
}

/// Which source a backend feeds into key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceBinding {
  /// Use the source supplied with each call.
  #[default]
  PerCall,
  /// Ignore the caller's source; every key uses this one.
  Fixed(String),
}

impl SourceBinding {
  pub fn derive(&self, event: &Event, source: &str) -> CacheKey {
    match self {
      Self::PerCall => compute(event, source),
      Self::Fixed(fixed) => compute(event, fixed),
    }
  }
}

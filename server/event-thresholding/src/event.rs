//! Read-only view over a security event document.
//!
//! The concrete event schema is owned by the wider pipeline, so fields are reached
//! through dotted paths (`_CESNET.EventClass`, `Source.IP4`). Arrays met along a path
//! are flattened: `Source.IP4` on an event with two sources yields every address.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event, as stored in the event database (IDEA-style JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(pub Value);

impl Event {
  pub fn new(value: Value) -> Self {
    Self(value)
  }

  /// Event identifier (`ID`), if present and a string.
  pub fn id(&self) -> Option<&str> {
    self.0.get("ID").and_then(Value::as_str)
  }

  /// All values reachable through `path`, in document order.
  pub fn jpath_values(&self, path: &str) -> Vec<&Value> {
    let mut current: Vec<&Value> = vec![&self.0];
    for segment in path.split('.').filter(|s| !s.is_empty()) {
      let mut next = Vec::new();
      for node in current {
        collect_child(node, segment, &mut next);
      }
      if next.is_empty() {
        return next;
      }
      current = next;
    }

    // Flatten a terminal array so `Category` yields its members, not the array.
    let mut out = Vec::with_capacity(current.len());
    for node in current {
      match node {
        Value::Array(items) => out.extend(items.iter()),
        Value::Null => {}
        other => out.push(other),
      }
    }
    out
  }

  /// First value reachable through `path`.
  pub fn jpath_value(&self, path: &str) -> Option<&Value> {
    self.jpath_values(path).into_iter().next()
  }

  /// String rendering of every value at `path`. Non-scalar values are skipped.
  pub fn jpath_strings(&self, path: &str) -> Vec<String> {
    self
      .jpath_values(path)
      .into_iter()
      .filter_map(scalar_to_string)
      .collect()
  }

  /// String rendering of the first scalar value at `path`.
  pub fn jpath_string(&self, path: &str) -> Option<String> {
    self.jpath_strings(path).into_iter().next()
  }
}

impl From<Value> for Event {
  fn from(value: Value) -> Self {
    Self(value)
  }
}

fn collect_child<'a>(node: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
  match node {
    Value::Object(map) => {
      if let Some(child) = map.get(segment) {
        out.push(child);
      }
    }
    Value::Array(items) => {
      for item in items {
        collect_child(item, segment, out);
      }
    }
    _ => {}
  }
}

fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

//! Field-level payload diffing for conflict display.
//!
//! The differ works over the ordered field map representation: the union of
//! field names present on either side, minus internal bookkeeping fields.
//! Blob payloads have no field structure and diff as a single whole-value
//! entry.

use crate::Payload;
use serde_json::Value;
use std::collections::BTreeSet;

/// Fields excluded from diffs: identity and bookkeeping the UI never merges.
pub const INTERNAL_FIELDS: &[&str] = &["id", "entity_id", "entity_type", "updated_at"];

/// The pseudo-field name used when whole payloads (not fields) diverge.
const WHOLE_PAYLOAD: &str = "content";

/// One field's local/server values in a conflict.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldDiff {
    /// Field name, or `"content"` for whole-payload divergence.
    pub field: String,

    /// Local value; `None` when the field only exists on the server.
    pub local: Option<Value>,

    /// Server value; `None` when the field only exists locally.
    pub server: Option<Value>,

    /// Whether the two sides disagree on this field.
    pub conflicting: bool,
}

/// Computes the field-level diff between a local and a server payload.
///
/// Field order follows the ordered map, so the UI renders a stable list.
#[must_use]
pub fn diff_payloads(local: &Payload, server: &Payload) -> Vec<FieldDiff> {
    match (local, server) {
        (Payload::Fields(l), Payload::Fields(s)) => {
            let names: BTreeSet<&String> = l.keys().chain(s.keys()).collect();
            names
                .into_iter()
                .filter(|name| !INTERNAL_FIELDS.contains(&name.as_str()))
                .map(|name| {
                    let lv = l.get(name).cloned();
                    let sv = s.get(name).cloned();
                    FieldDiff {
                        field: name.clone(),
                        conflicting: lv != sv,
                        local: lv,
                        server: sv,
                    }
                })
                .collect()
        }
        // Blobs (or a blob vs. fields mismatch) carry no mergeable fields:
        // surface one whole-value entry and let the UI pick a side.
        (l, s) => vec![FieldDiff {
            field: WHOLE_PAYLOAD.to_string(),
            local: serde_json::to_value(l).ok(),
            server: serde_json::to_value(s).ok(),
            conflicting: l != s,
        }],
    }
}

//! Deep merging of configuration trees
//!
//! Every place that layers one tree over another (store merges, imports,
//! inheritance, glob sources) goes through [`merge_values`] so they all
//! agree on conflict rules.

use crate::value::Value;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How conflicting nodes are settled when two trees are merged
///
/// Maps always merge key by key in every mode. The mode only decides what
/// happens when at least one side of a conflict is not a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Sequences concatenate; any other conflict takes the incoming value
    #[default]
    Combine,
    /// Incoming replaces every non-map conflict wholesale
    Overwrite,
    /// Existing values win; incoming only fills missing keys
    Preserve,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Combine => "combine",
            MergeMode::Overwrite => "overwrite",
            MergeMode::Preserve => "preserve",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized merge mode name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown merge mode '{0}' (expected combine, overwrite or preserve)")]
pub struct UnknownMergeMode(pub String);

impl FromStr for MergeMode {
    type Err = UnknownMergeMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combine" => Ok(MergeMode::Combine),
            "overwrite" => Ok(MergeMode::Overwrite),
            "preserve" => Ok(MergeMode::Preserve),
            _ => Err(UnknownMergeMode(s.to_string())),
        }
    }
}

/// Merge `incoming` into `existing` in place
pub fn merge_values(existing: &mut Value, incoming: Value, mode: MergeMode) {
    match (existing, incoming) {
        (Value::Map(current), Value::Map(overlay)) => {
            for (key, value) in overlay {
                match current.get_mut(&key) {
                    Some(slot) => merge_values(slot, value, mode),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (Value::Sequence(current), Value::Sequence(items)) if mode == MergeMode::Combine => {
            current.extend(items);
        }
        (existing, incoming) => {
            if mode != MergeMode::Preserve {
                *existing = incoming;
            }
        }
    }
}

/// Convenience wrapper returning the merged tree
pub fn merged(mut base: Value, overlay: Value, mode: MergeMode) -> Value {
    merge_values(&mut base, overlay, mode);
    base
}

//! Device memory farbling
//!
//! `navigator.deviceMemory` only ever reports a handful of buckets, so anything
//! else is suspicious. Real memory sizes are rounded into the buckets by the
//! browser, which limits how much this check can catch.

use serde_json::Value;
use tracing::debug;

use crate::constants::attributes::UNDEFINED;
use crate::constants::farbling::MEMORY_BUCKETS_GB;

/// Leading whitespace-delimited token of free text like "4 GB"
fn leading_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => s.split_whitespace().next().map(String::from),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True when the reported memory is outside the browser's bucket set
pub fn test_device_memory(value: &Value) -> bool {
    let token = match leading_token(value) {
        Some(t) => t,
        None => {
            debug!(value = %value, "Memory - invalid input");
            return false;
        }
    };

    if token.eq_ignore_ascii_case(UNDEFINED) {
        debug!("Memory - not detected (undefined)");
        return false;
    }

    match token.parse::<f64>() {
        Ok(gb) if !MEMORY_BUCKETS_GB.contains(&gb) => {
            debug!(gb, "Memory - detected");
            true
        }
        Ok(gb) => {
            debug!(gb, "Memory - not detected");
            false
        }
        Err(_) => {
            debug!(value = %value, "Memory - invalid input");
            false
        }
    }
}

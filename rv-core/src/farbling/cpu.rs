//! Logical CPU count farbling

use serde_json::Value;
use tracing::debug;

use super::parse_integer;
use crate::constants::attributes::UNDEFINED;
use crate::constants::farbling::COMMON_CPU_COUNTS;

/// True when the reported core count is outside the common set.
/// Sentinel and unparseable values are not treated as farbling.
pub fn test_cpu_count(value: &Value) -> bool {
    if value.as_str().map(str::trim) == Some(UNDEFINED) {
        debug!("CPU - not detected (undefined)");
        return false;
    }

    match parse_integer(value) {
        Some(count) if !COMMON_CPU_COUNTS.contains(&count) => {
            debug!(count, "CPU - detected");
            true
        }
        Some(count) => {
            debug!(count, "CPU - not detected");
            false
        }
        None => {
            debug!(value = %value, "CPU - invalid input");
            false
        }
    }
}

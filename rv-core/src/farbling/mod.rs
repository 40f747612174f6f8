//! Farbling detection
//!
//! Privacy-hardened browsers randomize ("farble") parts of their fingerprint.
//! Each detector here checks one attribute for values a real device would not
//! report. All detectors fail open: unusable input is never called farbling.

mod cpu;
mod memory;
mod resolution;

pub use cpu::test_cpu_count;
pub use memory::test_device_memory;
pub use resolution::{test_resolution, ResolutionVerdict};

use rv_protocol::{FarblingReport, ResolutionCheck};
use serde_json::Value;
use tracing::debug;

use crate::constants::attributes::{CPU, MEMORY, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::data::Attributes;

/// Combined result of every farbling detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarblingAnalysis {
    pub resolution: ResolutionVerdict,
    pub cpu: bool,
    pub memory: bool,
}

impl FarblingAnalysis {
    pub fn overall_detected(&self) -> bool {
        self.resolution.detected() || self.cpu || self.memory
    }

    pub fn report(&self) -> FarblingReport {
        FarblingReport {
            overall_detected: self.overall_detected(),
            resolution: ResolutionCheck {
                detected: self.resolution.detected(),
                matched_resolution: self.resolution.matched_resolution(),
            },
            cpu_detected: self.cpu,
            memory_detected: self.memory,
        }
    }
}

/// Run every detector over a submission's attributes.
/// Missing attributes are treated like the browser's "undefined".
pub fn test_farbling(attributes: &Attributes) -> FarblingAnalysis {
    let absent = Value::Null;
    let get = |key: &str| attributes.get(key).unwrap_or(&absent);

    let analysis = FarblingAnalysis {
        resolution: test_resolution(get(SCREEN_WIDTH), get(SCREEN_HEIGHT)),
        cpu: test_cpu_count(get(CPU)),
        memory: test_device_memory(get(MEMORY)),
    };

    debug!(
        overall = analysis.overall_detected(),
        resolution = ?analysis.resolution,
        cpu = analysis.cpu,
        memory = analysis.memory,
        "Farbling analysis"
    );
    analysis
}

/// Integer reading of a JSON attribute: integers, floats (truncated) and integer strings
pub(crate) fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

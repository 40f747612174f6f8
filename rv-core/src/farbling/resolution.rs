//! Screen resolution farbling
//!
//! A reported resolution is compared against a catalog of common physical
//! resolutions, each also halved to cover high-DPR devices reporting CSS pixels.

use serde_json::Value;
use tracing::debug;

use super::parse_integer;
use crate::constants::attributes::UNDEFINED;
use crate::constants::farbling::{
    COMMON_RESOLUTIONS, EXACT_EPSILON, RATIO_MAX, RATIO_MIN, RESOLUTION_SCALES,
};

/// Outcome of the resolution check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionVerdict {
    /// Reported value is a catalog resolution (possibly halved)
    Exact([u32; 2]),
    /// Reported value is near a catalog resolution; carries the reconstruction
    Farbled([u32; 2]),
    /// Nothing in the catalog is near; carries the reported value unchanged
    Uncommon([u32; 2]),
    /// Sentinel, non-numeric or non-positive input
    Indeterminate,
}

impl ResolutionVerdict {
    pub fn detected(&self) -> bool {
        matches!(self, ResolutionVerdict::Farbled(_))
    }

    /// Resolution to trust for matching, if any
    pub fn matched_resolution(&self) -> Option<[u32; 2]> {
        match self {
            ResolutionVerdict::Exact(r)
            | ResolutionVerdict::Farbled(r)
            | ResolutionVerdict::Uncommon(r) => Some(*r),
            ResolutionVerdict::Indeterminate => None,
        }
    }
}

fn parse_dimension(value: &Value) -> Option<u32> {
    if value.as_str().map(str::trim) == Some(UNDEFINED) {
        return None;
    }
    parse_integer(value)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

/// Check a reported width/height pair
pub fn test_resolution(width: &Value, height: &Value) -> ResolutionVerdict {
    let (w, h) = match (parse_dimension(width), parse_dimension(height)) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            debug!(width = %width, height = %height, "Resolution indeterminate");
            return ResolutionVerdict::Indeterminate;
        }
    };

    let reported = [w, h];
    let mut best: Option<[u32; 2]> = None;
    let mut min_distance = f64::INFINITY;

    for [ref_w, ref_h] in COMMON_RESOLUTIONS {
        for scale in RESOLUTION_SCALES {
            let scaled_w = ref_w as f64 * scale;
            let scaled_h = ref_h as f64 * scale;

            let width_ratio = w as f64 / scaled_w;
            let height_ratio = h as f64 / scaled_h;

            let in_band = |r: f64| RATIO_MIN < r && r < RATIO_MAX;
            if !in_band(width_ratio) || !in_band(height_ratio) {
                continue;
            }

            let candidate = [scaled_w as u32, scaled_h as u32];

            if (width_ratio - 1.0).abs() < EXACT_EPSILON
                && (height_ratio - 1.0).abs() < EXACT_EPSILON
            {
                debug!(width = w, height = h, "Resolution - not detected (catalog match)");
                return ResolutionVerdict::Exact(candidate);
            }

            let distance = (1.0 - width_ratio * height_ratio).abs();
            if distance < min_distance {
                min_distance = distance;
                best = Some(candidate);
            }
        }
    }

    match best {
        Some(candidate) if candidate != reported => {
            debug!(width = w, height = h, matched = ?candidate, "Resolution - detected");
            ResolutionVerdict::Farbled(candidate)
        }
        _ => {
            debug!(width = w, height = h, "Resolution - not detected (uncommon)");
            ResolutionVerdict::Uncommon(reported)
        }
    }
}

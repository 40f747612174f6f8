//! Complex matching: weighted similarity with an adaptive threshold
//!
//! When farbling is detected the probe's screen size is replaced with the
//! reconstructed resolution and every record is scored by weighted hash and
//! attribute agreement. When it is not, the browser's canvas and audio hashes
//! are trusted to identify it directly.

use rv_protocol::MatchOutcome;
use serde_json::json;
use tracing::{debug, warn};

use crate::constants::attributes::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::constants::complex::{
    ATTRIBUTE_WEIGHTS, AUDIO_WEIGHT, FONTS_WEIGHT, GEOM_CANVAS_WEIGHT, MEDIA_HASH_WEIGHT,
    PLUGINS_HASH_WEIGHT, THRESHOLD_FLOOR, THRESHOLD_MARGIN, TXT_CANVAS_WEIGHT,
};
use crate::data::{Attributes, Fingerprint, FingerprintRecord, HashField};
use crate::farbling::FarblingAnalysis;
use crate::store::KnownIdentityStore;

/// Weight of a hash column; columns not listed score nothing
pub fn hash_weight(field: HashField) -> u32 {
    match field {
        HashField::Audio => AUDIO_WEIGHT,
        HashField::GeomCanvas => GEOM_CANVAS_WEIGHT,
        HashField::TxtCanvas => TXT_CANVAS_WEIGHT,
        HashField::Fonts => FONTS_WEIGHT,
        HashField::MediaHash => MEDIA_HASH_WEIGHT,
        HashField::PluginsHash => PLUGINS_HASH_WEIGHT,
        HashField::MediaCapabilities | HashField::Name | HashField::Plugins => 0,
    }
}

pub fn check_hashes(record: &FingerprintRecord, probe: &Fingerprint) -> u32 {
    HashField::COMPARED
        .iter()
        .filter(|field| record.hashes.same(&probe.hashes, **field))
        .map(|field| hash_weight(*field))
        .sum()
}

/// Weighted attribute agreement. The weight is chosen by the attribute's
/// position in the stored record; positions past the table are ignored.
pub fn check_attributes(record: &Attributes, probe: &Attributes) -> u32 {
    let mut score = 0;

    for (i, (key, value)) in record.iter().enumerate() {
        let Some(weight) = ATTRIBUTE_WEIGHTS.get(i) else {
            warn!(
                position = i,
                attribute = %key,
                "Attribute position has no weight, skipping the rest"
            );
            break;
        };

        if probe.get(key) == Some(value) {
            score += weight;
        }
    }

    score
}

/// Total similarity, `None` for records with unparsed attributes
pub fn similarity(record: &FingerprintRecord, probe: &Fingerprint) -> Option<u32> {
    let attributes = record.attributes.as_ref()?;
    Some(check_hashes(record, probe) + check_attributes(attributes, &probe.attributes))
}

/// Acceptance threshold for a pool of scores: mean + margin, never below the floor
pub fn dynamic_threshold(scores: &[u32]) -> f64 {
    if scores.is_empty() {
        return THRESHOLD_FLOOR;
    }
    let mean = scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64;
    (mean + THRESHOLD_MARGIN).max(THRESHOLD_FLOOR)
}

/// Best-scoring record (first on ties), if it clears the threshold
pub fn find_best_match(scored: &[(&FingerprintRecord, u32)]) -> MatchOutcome {
    let scores: Vec<u32> = scored.iter().map(|(_, s)| *s).collect();
    let threshold = dynamic_threshold(&scores);

    let mut best: Option<(&FingerprintRecord, u32)> = None;
    for (record, score) in scored {
        if best.map_or(true, |(_, b)| *score > b) {
            best = Some((*record, *score));
        }
    }

    match best {
        Some((record, score)) if score as f64 >= threshold => {
            debug!(id = record.id, score, threshold, "Complex - match");
            MatchOutcome::found(record.id, record.log, score)
        }
        Some((_, score)) => {
            debug!(score, threshold, "Complex - no match");
            MatchOutcome::no_match(score)
        }
        None => MatchOutcome::no_match(0),
    }
}

/// First record sharing the audio hash, else the geometry canvas, else the text canvas
pub fn find_hash_match(store: &KnownIdentityStore, probe: &Fingerprint) -> MatchOutcome {
    for field in HashField::IMPORTANT {
        if let Some(record) = store
            .comparable()
            .find(|r| r.hashes.same(&probe.hashes, field))
        {
            debug!(id = record.id, on = field.column(), "Complex - hash match");
            return MatchOutcome::found(record.id, record.log, hash_weight(field));
        }
    }

    debug!("Complex - no hash match");
    MatchOutcome::no_match(0)
}

/// Complex strategy entry point
pub fn complex_search(
    store: &KnownIdentityStore,
    probe: &Fingerprint,
    farbling: &FarblingAnalysis,
) -> MatchOutcome {
    if !farbling.overall_detected() {
        return find_hash_match(store, probe);
    }

    debug!("Complex - browser is modifying its values");
    let adjusted = denoise(probe, farbling);

    let scored: Vec<(&FingerprintRecord, u32)> = store
        .comparable()
        .filter_map(|r| similarity(r, &adjusted).map(|s| (r, s)))
        .collect();

    report_order_drift(store);
    find_best_match(&scored)
}

/// Copy of the probe with the screen size replaced by the reconstructed resolution
fn denoise(probe: &Fingerprint, farbling: &FarblingAnalysis) -> Fingerprint {
    let mut adjusted = probe.clone();
    if let Some([w, h]) = farbling.resolution.matched_resolution() {
        adjusted.attributes.insert(SCREEN_WIDTH, json!(w));
        adjusted.attributes.insert(SCREEN_HEIGHT, json!(h));
    }
    adjusted
}

fn report_order_drift(store: &KnownIdentityStore) {
    let mut drifted = store
        .comparable()
        .filter_map(|r| r.attributes.as_ref()?.order_drift().map(|d| (r, d.0)));

    if let Some((first, position)) = drifted.next() {
        let count = 1 + drifted.count();
        warn!(
            records = count,
            first_id = first.id,
            first_log = first.log,
            position,
            "Attribute order drift, positional weights misapplied"
        );
    }
}

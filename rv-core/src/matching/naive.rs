//! Naive matching: count identical columns

use rv_protocol::MatchOutcome;
use tracing::debug;

use crate::constants::naive::{MAX_MATCH, THRESHOLD};
use crate::data::{Fingerprint, FingerprintRecord, HashField};
use crate::store::KnownIdentityStore;

/// Number of columns identical between a stored record and the probe: each
/// compared hash field present and equal on both sides, plus each stored
/// attribute the probe has with an equal value. `None` for records whose
/// attributes could not be parsed.
pub fn count_similar_columns(record: &FingerprintRecord, probe: &Fingerprint) -> Option<u32> {
    let attributes = record.attributes.as_ref()?;

    let hashes = HashField::COMPARED
        .iter()
        .filter(|field| record.hashes.same(&probe.hashes, **field))
        .count();

    let attrs = attributes
        .iter()
        .filter(|(key, value)| probe.attributes.get(key) == Some(*value))
        .count();

    Some((hashes + attrs) as u32)
}

/// Walk records from most to least similar and accept the first that is an
/// exact revisit, shares an important hash, or clears the threshold.
pub fn naive_search(store: &KnownIdentityStore, probe: &Fingerprint) -> MatchOutcome {
    let mut scored: Vec<(&FingerprintRecord, u32)> = store
        .comparable()
        .filter_map(|r| count_similar_columns(r, probe).map(|s| (r, s)))
        .collect();

    // Stable: equal scores keep store order
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let best = scored.first().map(|(_, s)| *s).unwrap_or(0);

    for (record, score) in &scored {
        if *score == MAX_MATCH {
            debug!(id = record.id, log = record.log, score, "Naive - exact revisit");
            return MatchOutcome::found(record.id, record.log, *score);
        }

        if let Some(field) = HashField::IMPORTANT
            .iter()
            .find(|f| record.hashes.same(&probe.hashes, **f))
        {
            debug!(id = record.id, log = record.log, score, on = field.column(), "Naive - matched on hash");
            return MatchOutcome::found(record.id, record.log, *score);
        }

        if *score > THRESHOLD {
            debug!(id = record.id, log = record.log, score, "Naive - matched above threshold");
            return MatchOutcome::found(record.id, record.log, *score);
        }
    }

    debug!(best, "Naive - no match");
    MatchOutcome::no_match(best)
}

//! Resolution arbiter
//!
//! Reconciles the naive and complex outcomes into one decision: which identity
//! the submission belongs to, its log index, and whether it is stored.

use rv_protocol::{Decision, MatchOutcome, Resolution};
use tracing::{debug, info};

use crate::constants::naive::MAX_MATCH;
use crate::data::Fingerprint;
use crate::matching::count_similar_columns;
use crate::store::KnownIdentityStore;

/// Knobs for the arbiter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterPolicy {
    /// Store exact revisits too, instead of only confirming them
    pub record_exact_revisits: bool,
}

/// Decide identity and log index for a probe
pub fn resolve(
    store: &KnownIdentityStore,
    probe: &Fingerprint,
    naive: &MatchOutcome,
    complex: &MatchOutcome,
    policy: ArbiterPolicy,
) -> Resolution {
    if store.is_empty() {
        info!("First submission, new identity 0");
        return Resolution {
            decision: Decision::New,
            identity_id: 0,
            log_index: 0,
            append: true,
        };
    }

    let (decision, id) = match (naive.identity(), complex.identity()) {
        (None, None) => {
            let id = store.next_identity_id();
            info!(id, "New identity");
            return Resolution {
                decision: Decision::New,
                identity_id: id,
                log_index: 0,
                append: true,
            };
        }
        (Some(id), _) if naive.score == MAX_MATCH => {
            info!(id, log = naive.log_index, "Exact revisit");
            return if policy.record_exact_revisits {
                Resolution {
                    decision: Decision::ExactRevisit,
                    identity_id: id,
                    log_index: store.next_log_index(id),
                    append: true,
                }
            } else {
                Resolution {
                    decision: Decision::ExactRevisit,
                    identity_id: id,
                    log_index: naive.log_index,
                    append: false,
                }
            };
        }
        (Some(n), Some(c)) if n == c => (Decision::Agree, n),
        (Some(n), Some(c)) => {
            let naive_best = best_similarity(store, probe, n);
            let complex_best = best_similarity(store, probe, c);
            debug!(naive = n, naive_best, complex = c, complex_best, "Matchers disagree");
            if complex_best > naive_best {
                (Decision::Conflict, c)
            } else {
                (Decision::Conflict, n)
            }
        }
        (Some(n), None) => (Decision::NaiveOnly, n),
        (None, Some(c)) => (Decision::ComplexOnly, c),
    };

    let log_index = store.next_log_index(id);
    info!(id, log = log_index, decision = decision.as_str(), "Revisit");
    Resolution {
        decision,
        identity_id: id,
        log_index,
        append: true,
    }
}

/// Highest column agreement between the probe and any row of one identity
fn best_similarity(store: &KnownIdentityStore, probe: &Fingerprint, id: u64) -> u32 {
    store
        .rows_for(id)
        .filter_map(|r| count_similar_columns(r, probe))
        .max()
        .unwrap_or(0)
}

//! Identity matching strategies
//!
//! Two independent matchers score a probe against the same store snapshot:
//! - `naive`: counts exactly equal columns, with important-hash overrides
//! - `complex`: weighted hash/attribute similarity with an adaptive threshold,
//!   or an exact-hash shortcut when the browser is not farbling

mod complex;
mod naive;

pub use complex::{
    check_attributes, check_hashes, complex_search, dynamic_threshold, find_best_match,
    find_hash_match, hash_weight, similarity,
};
pub use naive::{count_similar_columns, naive_search};

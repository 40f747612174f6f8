//! Data types, persistence, and validation modules
//!
//! Contains the fingerprint record model and its CSV representation.

mod attributes;
mod persistence;
mod types;
mod validation;

pub use attributes::Attributes;
pub use persistence::{
    append_capture, append_record, parse_rows, read_rows, CsvRow, COLUMNS,
};
pub use types::{Fingerprint, FingerprintRecord, HashField, HashFields};
pub use validation::{validate_capture_name, validate_file_size, validate_fingerprint};

//! Input validation for submissions, capture names and files
//!
//! Submissions come from untrusted browsers, so everything the engine relies on
//! is checked before a probe reaches the matchers.

use std::path::Path;

use crate::constants::limits;
use crate::error::{Result, RevisitError};

use super::types::Fingerprint;

/// A submission must carry the attributes the detectors read unconditionally
pub fn validate_fingerprint(fingerprint: &Fingerprint) -> Result<()> {
    match fingerprint.attributes.missing_required().first() {
        Some(key) => Err(RevisitError::MissingAttribute(key.to_string())),
        None => Ok(()),
    }
}

/// Capture names become file names
pub fn validate_capture_name(name: &str) -> Result<()> {
    rv_protocol::validate_capture_name(name).map_err(RevisitError::InvalidCaptureName)
}

/// Reject files too large to be a settings file
pub fn validate_file_size(path: &Path) -> Result<()> {
    let size = std::fs::metadata(path)
        .map_err(|e| RevisitError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();

    if size > limits::MAX_SETTINGS_SIZE {
        return Err(RevisitError::invalid_path(
            path,
            format!("file too large ({} bytes, max {})", size, limits::MAX_SETTINGS_SIZE),
        ));
    }

    Ok(())
}

//! Submission pipeline
//!
//! Runs one fingerprint submission end to end: validation, optional capture,
//! farbling detection, both matchers, arbitration, and the store append.

use std::path::{Path, PathBuf};

use rv_protocol::{CheckReport, CheckSummary, MatchOutcome};
use serde_json::Value;
use tracing::{debug, info};

use crate::arbiter::{resolve, ArbiterPolicy};
use crate::data::{
    append_capture, validate_capture_name, validate_fingerprint, Fingerprint, FingerprintRecord,
};
use crate::error::{Result, RevisitError};
use crate::farbling::test_farbling;
use crate::matching::{complex_search, naive_search};
use crate::settings::Settings;
use crate::store::IdentityStore;

/// Per-process options for the pipeline
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub capture_dir: PathBuf,
    pub policy: ArbiterPolicy,
}

impl CheckOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            capture_dir: settings.capture_dir.clone(),
            policy: settings.arbiter_policy(),
        }
    }
}

/// Parse a raw JSON submission
pub fn parse_submission(submission: Value) -> Result<Fingerprint> {
    Fingerprint::from_value(submission)
        .map_err(|e| RevisitError::invalid_submission(e.to_string()))
}

/// Check a raw JSON submission
pub fn check_submission(
    store: &mut dyn IdentityStore,
    submission: Value,
    options: &CheckOptions,
) -> Result<CheckReport> {
    check_fingerprint(store, parse_submission(submission)?, options)
}

/// Check a parsed submission against the store and record it if needed
pub fn check_fingerprint(
    store: &mut dyn IdentityStore,
    fingerprint: Fingerprint,
    options: &CheckOptions,
) -> Result<CheckReport> {
    validate_fingerprint(&fingerprint)?;
    let mut fingerprint = fingerprint.normalize();

    let capture = match fingerprint.capture_name().map(String::from) {
        Some(name) => {
            fingerprint.hashes.name = None;
            let path = save_capture(&options.capture_dir, &name, &fingerprint)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let snapshot = store.load()?;
    let farbling = test_farbling(&fingerprint.attributes);

    let (complex, naive) = if snapshot.is_empty() {
        (MatchOutcome::no_match(0), MatchOutcome::no_match(0))
    } else {
        (
            complex_search(&snapshot, &fingerprint, &farbling),
            naive_search(&snapshot, &fingerprint),
        )
    };

    let resolution = resolve(&snapshot, &fingerprint, &naive, &complex, options.policy);

    if resolution.append {
        let record = FingerprintRecord::from_fingerprint(
            &fingerprint,
            resolution.identity_id,
            resolution.log_index,
        );
        store.append(&record)?;
    }

    let summary = CheckSummary {
        success: naive.matched || complex.matched,
        naive: naive.matched,
        complex: complex.matched,
        resolution_modified: farbling.resolution.detected(),
        cpu_modified: farbling.cpu,
        memory_modified: farbling.memory,
    };

    info!(
        id = resolution.identity_id,
        log = resolution.log_index,
        decision = resolution.decision.as_str(),
        naive = naive.matched,
        complex = complex.matched,
        farbling = farbling.overall_detected(),
        "Submission checked"
    );

    Ok(CheckReport {
        summary,
        resolution,
        naive,
        complex,
        farbling: farbling.report(),
        capture,
    })
}

/// Append a fingerprint to `<dir>/<name>.csv`
pub fn save_capture(dir: &Path, name: &str, fingerprint: &Fingerprint) -> Result<PathBuf> {
    validate_capture_name(name)?;
    let path = dir.join(format!("{}.csv", name));
    append_capture(&path, fingerprint)?;
    debug!(name, path = ?path, "Saved capture");
    Ok(path)
}

/// Save a raw submission as a named capture without running the engine
pub fn save_capture_submission(dir: &Path, name: &str, submission: Value) -> Result<PathBuf> {
    let mut fingerprint = parse_submission(submission)?.normalize();
    fingerprint.hashes.name = None;
    let path = save_capture(dir, name, &fingerprint)?;
    info!(name, path = ?path, "Capture saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::naive::MAX_MATCH;
    use crate::data::read_rows;
    use crate::store::{KnownIdentityStore, MemoryStore, MockIdentityStore};
    use crate::test_support::{full_fingerprint, record_from};
    use rv_protocol::Decision;
    use serde_json::json;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> CheckOptions {
        CheckOptions {
            capture_dir: dir.path().join("captures"),
            policy: ArbiterPolicy::default(),
        }
    }

    #[test]
    fn test_first_submission_is_identity_zero() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let report = check_fingerprint(&mut store, full_fingerprint("a"), &options(&dir)).unwrap();

        assert_eq!(report.resolution.decision, Decision::New);
        assert_eq!(report.resolution.identity_id, 0);
        assert_eq!(report.resolution.log_index, 0);
        assert!(!report.summary.success);
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_identical_submission_is_confirmed_without_append() {
        let dir = TempDir::new().unwrap();
        let fp = full_fingerprint("a").normalize();
        let snapshot = KnownIdentityStore::new(vec![record_from(&fp, 0, 0)]);

        let mut store = MockIdentityStore::new();
        store.expect_load().returning(move || Ok(snapshot.clone()));
        store.expect_append().times(0);

        let report = check_fingerprint(&mut store, fp, &options(&dir)).unwrap();
        assert_eq!(report.naive.score, MAX_MATCH);
        assert_eq!(report.resolution.decision, Decision::ExactRevisit);
        assert!(!report.resolution.append);
        assert!(report.summary.success);
    }

    #[test]
    fn test_sequential_new_identities() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        for (i, seed) in ["a", "b", "c"].iter().enumerate() {
            let mut fp = full_fingerprint(seed);
            fp.attributes.insert("IP", json!(format!("10.0.0.{}", i)));
            fp.attributes.insert("Renderer", json!(format!("GPU {}", seed)));
            let report = check_fingerprint(&mut store, fp, &options(&dir)).unwrap();
            assert_eq!(report.resolution.identity_id, i as u64);
        }
    }

    #[test]
    fn test_revisit_appends_next_log() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let first = full_fingerprint("a");
        check_fingerprint(&mut store, first.clone(), &options(&dir)).unwrap();

        for expected_log in 1..3 {
            let mut changed = first.clone();
            changed.attributes.insert("IP", json!(format!("192.168.1.{}", expected_log)));
            let report = check_fingerprint(&mut store, changed, &options(&dir)).unwrap();
            assert_eq!(report.resolution.identity_id, 0);
            assert_eq!(report.resolution.log_index, expected_log);
            assert!(report.resolution.append);
        }
        assert_eq!(store.load().unwrap().next_log_index(0), 3);
    }

    #[test]
    fn test_missing_required_attribute_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = MockIdentityStore::new();
        store.expect_load().times(0);
        store.expect_append().times(0);

        let err = check_submission(
            &mut store,
            json!({"Attributes": {"Screen Width": 1920, "CPU": 8}}),
            &options(&dir),
        )
        .unwrap_err();
        assert!(matches!(err, RevisitError::MissingAttribute(ref k) if k == "Screen Height"));
    }

    #[test]
    fn test_named_submission_writes_capture() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let mut fp = full_fingerprint("a");
        fp.hashes.name = Some("brave_1".into());

        let report = check_fingerprint(&mut store, fp, &options(&dir)).unwrap();
        let capture = dir.path().join("captures").join("brave_1.csv");
        assert_eq!(report.capture, Some(capture.display().to_string()));

        let rows = read_rows(&capture).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hashes.name, None);

        // Name is a capture label and never reaches the store
        let stored = store.load().unwrap();
        assert_eq!(stored.records()[0].hashes.name, None);
    }

    #[test]
    fn test_placeholder_name_writes_no_capture() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let mut fp = full_fingerprint("a");
        fp.hashes.name = Some("Not available".into());

        let report = check_fingerprint(&mut store, fp, &options(&dir)).unwrap();
        assert_eq!(report.capture, None);
        assert!(!dir.path().join("captures").exists());
    }

    #[test]
    fn test_farbling_flags_in_summary() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        let mut fp = full_fingerprint("a");
        fp.attributes.insert("CPU", json!(7));
        fp.attributes.insert("Memory", json!("6 GB"));

        let report = check_fingerprint(&mut store, fp, &options(&dir)).unwrap();
        assert!(report.summary.cpu_modified);
        assert!(report.summary.memory_modified);
        assert!(!report.summary.resolution_modified);
        assert!(report.farbling.overall_detected);
    }

    #[test]
    fn test_save_capture_submission_rejects_bad_name() {
        let dir = TempDir::new().unwrap();
        let err = save_capture_submission(dir.path(), "../escape", json!({"Attributes": {}}))
            .unwrap_err();
        assert!(matches!(err, RevisitError::InvalidCaptureName(_)));
    }
}

/*
 * Integration tests for Revisit
 *
 * These tests drive the identity engine through the same entry points the
 * CLI and daemon use, against real CSV files in a temporary directory.
 */

use clap::Parser;
use revisit::cli::Cli;
use revisit::commands::{apply_overrides, evaluate_files, execute, store_stats};
use rv_core::{
    check_submission, load_settings_from, read_rows, CheckOptions, CsvStore, IdentityStore,
    Metric, RevisitError, Settings,
};
use rv_protocol::Decision;
use serde_json::{json, Map, Value};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

// Test utilities

const KEYS: [&str; 28] = [
    "IP", "CPU", "Memory", "Screen Width", "Screen Height", "Usable Screen Width",
    "Usable Screen Height", "Color Depth", "Touch Screen", "Browser name", "Browser core",
    "Navigator properties", "Browser permissions", "IndexedDB", "Open database",
    "Local storage", "Session storage", "Global Storage", "PDF Viewer", "Cookies Enabled",
    "Do not track", "AdBlock", "Navigator Vendor", "Vendor", "Unmasked Vendor", "Renderer",
    "Unmasked Renderer", "Shading Langueage Versions",
];

/// A Brave-like desktop browser
fn brave() -> Value {
    let mut attrs = Map::new();
    for key in KEYS {
        attrs.insert(key.to_string(), json!(format!("brave {}", key)));
    }
    attrs.insert("CPU".into(), json!(8));
    attrs.insert("Memory".into(), json!("8 GB"));
    attrs.insert("Screen Width".into(), json!(1920));
    attrs.insert("Screen Height".into(), json!(1080));

    json!({
        "Attributes": attrs,
        "Audio": "audio-brave",
        "Fonts": "fonts-brave",
        "Geom Canvas": "geom-brave",
        "Media Capabilities": "caps-brave",
        "MediaHash": "media-brave",
        "Plugins": "plugins-brave",
        "PluginsHash": "plugins-hash-brave",
        "TXT Canvas": "txt-brave",
    })
}

/// A browser sharing nothing with `brave()`
fn other(seed: &str) -> Value {
    let mut attrs = Map::new();
    for key in KEYS {
        attrs.insert(key.to_string(), json!(format!("{} {}", seed, key)));
    }
    attrs.insert("CPU".into(), json!(4));
    attrs.insert("Memory".into(), json!("4 GB"));
    attrs.insert("Screen Width".into(), json!(1366));
    attrs.insert("Screen Height".into(), json!(768));

    json!({
        "Attributes": attrs,
        "Audio": format!("audio-{}", seed),
        "Fonts": format!("fonts-{}", seed),
        "Geom Canvas": format!("geom-{}", seed),
        "TXT Canvas": format!("txt-{}", seed),
    })
}

fn settings(dir: &TempDir) -> Settings {
    Settings {
        store_path: dir.path().join("fp_data.csv"),
        capture_dir: dir.path().join("captures"),
        ..Settings::default()
    }
}

fn check(settings: &Settings, submission: Value) -> rv_protocol::CheckReport {
    let mut store = CsvStore::new(&settings.store_path);
    check_submission(&mut store, submission, &CheckOptions::from_settings(settings)).unwrap()
}

// Engine flow

#[test]
fn test_new_identities_are_sequential() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    let ids: Vec<u64> = [brave(), other("firefox"), other("safari")]
        .into_iter()
        .map(|sub| check(&s, sub).resolution.identity_id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    let rows = read_rows(&s.store_path).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.log == Some(0)));
}

#[test]
fn test_exact_revisit_is_not_stored_twice() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    check(&s, brave());
    let report = check(&s, brave());

    assert_eq!(report.naive.score, 36);
    assert_eq!(report.resolution.decision, Decision::ExactRevisit);
    assert!(!report.resolution.append);
    assert_eq!(read_rows(&s.store_path).unwrap().len(), 1);
}

#[test]
fn test_exact_revisit_recorded_when_enabled() {
    let dir = TempDir::new().unwrap();
    let s = Settings {
        record_exact_revisits: true,
        ..settings(&dir)
    };

    check(&s, brave());
    let report = check(&s, brave());
    assert_eq!(report.resolution.log_index, 1);
    assert_eq!(read_rows(&s.store_path).unwrap().len(), 2);
}

#[test]
fn test_farbled_revisit_is_recognized() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    check(&s, brave());
    check(&s, other("firefox"));
    check(&s, other("safari"));

    // Same browser, new session: canvases re-randomized, screen size jittered
    let mut farbled = brave();
    farbled["Attributes"]["Screen Width"] = json!(1915);
    farbled["Attributes"]["Screen Height"] = json!(1077);
    farbled["Geom Canvas"] = json!("geom-session-2");
    farbled["TXT Canvas"] = json!("txt-session-2");

    let report = check(&s, farbled);
    assert!(report.summary.resolution_modified);
    assert_eq!(report.farbling.resolution.matched_resolution, Some([1920, 1080]));
    assert!(report.naive.matched);
    assert!(report.complex.matched);
    assert_eq!(report.resolution.decision, Decision::Agree);
    assert_eq!(report.resolution.identity_id, 0);
    assert_eq!(report.resolution.log_index, 1);

    // The stored row keeps what the browser reported
    let rows = read_rows(&s.store_path).unwrap();
    let stored = rows
        .iter()
        .find(|r| r.id == Some(0) && r.log == Some(1))
        .and_then(|r| r.attributes.as_ref())
        .unwrap();
    assert_eq!(stored.get("Screen Width"), Some(&json!(1915)));
}

#[test]
fn test_missing_attribute_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    let mut sub = brave();
    sub["Attributes"].as_object_mut().unwrap().remove("CPU");

    let mut store = CsvStore::new(&s.store_path);
    let err = check_submission(&mut store, sub, &CheckOptions::from_settings(&s)).unwrap_err();
    assert!(matches!(err, RevisitError::MissingAttribute(ref k) if k == "CPU"));
    assert!(!s.store_path.exists());
}

#[test]
fn test_stats_counts_identities() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    check(&s, brave());
    let mut revisit = brave();
    revisit["Attributes"]["IP"] = json!("198.51.100.4");
    check(&s, revisit);
    check(&s, other("firefox"));

    let stats = store_stats(&s, None).unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.identities, 2);
    assert_eq!(stats.malformed, 0);
    assert_eq!(CsvStore::new(&s.store_path).stats().unwrap(), stats);
}

// Captures and evaluation

#[test]
fn test_named_submissions_feed_evaluation() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);

    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        let mut sub = brave();
        sub["Name"] = json!("brave_1");
        sub["Attributes"]["IP"] = json!(ip);
        let report = check(&s, sub);
        assert!(report.capture.is_some());
    }

    let mut first = other("firefox");
    first["Name"] = json!("mixed");
    check(&s, first);
    let mut second = other("safari");
    second["Name"] = json!("mixed");
    check(&s, second);

    let captures = [
        s.capture_dir.join("brave_1.csv"),
        s.capture_dir.join("mixed.csv"),
    ];
    let summary = evaluate_files(&captures).unwrap();

    assert_eq!(summary.files[0].tp, 3);
    assert_eq!(summary.files[0].fn_, 0);
    assert_eq!(summary.files[1].tp, 1);
    assert_eq!(summary.files[1].fn_, 1);
    assert_eq!(summary.samples(), 5);
    assert!((summary.weighted_percent(Metric::TruePositive) - 80.0).abs() < 1e-9);
}

#[test]
fn test_evaluate_command_prints_table() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);
    let capture = dir.path().join("brave.csv");

    let save = |sub: Value| {
        rv_core::save_capture_submission(dir.path(), "brave", sub).unwrap();
    };
    save(brave());
    save(brave());

    let capture_arg = capture.display().to_string();
    let cli = Cli::parse_from(["revisit", "evaluate", capture_arg.as_str()]);
    let mut out = Vec::new();
    execute(&cli, &s, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Summary for all files (counts):"));
    assert!(text.contains("WEIGHTED AVG"));
}

#[test]
fn test_save_command_rejects_traversal() {
    let dir = TempDir::new().unwrap();
    let s = settings(&dir);
    let input = dir.path().join("sub.json");
    fs::write(&input, brave().to_string()).unwrap();

    let input_arg = input.display().to_string();
    let cli = Cli::parse_from(["revisit", "save", "../../outside", input_arg.as_str()]);
    let mut out = Vec::new();
    assert!(execute(&cli, &s, &mut out).is_err());
    assert!(!s.capture_dir.exists());
}

// Settings

#[test]
#[serial]
fn test_cli_flags_override_environment() {
    let dir = TempDir::new().unwrap();
    std::env::set_var("REVISIT_STORE", "/tmp/from-env.csv");
    std::env::set_var("REVISIT_CAPTURE_DIR", "/tmp/env-captures");

    let mut loaded = load_settings_from(&dir.path().join("settings.json")).unwrap();
    loaded.apply_env().unwrap();
    assert_eq!(loaded.store_path.to_str(), Some("/tmp/from-env.csv"));

    let cli = Cli::parse_from(["revisit", "--store", "/tmp/from-cli.csv", "stats"]);
    let effective = apply_overrides(loaded, &cli);
    assert_eq!(effective.store_path.to_str(), Some("/tmp/from-cli.csv"));
    assert_eq!(effective.capture_dir.to_str(), Some("/tmp/env-captures"));

    std::env::remove_var("REVISIT_STORE");
    std::env::remove_var("REVISIT_CAPTURE_DIR");
}

//! Revisit Core Library
//!
//! Re-identifies returning browsers from fingerprint submissions, including
//! browsers that deliberately randomize ("farble") what they report.
//!
//! # Features
//!
//! - **Farbling Detection**: Flags reconstructed resolutions, unusual CPU counts and memory sizes
//! - **Naive Matching**: Exact column agreement with important-hash overrides
//! - **Complex Matching**: Weighted similarity with a pool-adaptive threshold
//! - **Arbitration**: One identity and log index per submission
//! - **Evaluation**: Offline TP/FP/FN replay over labelled capture files
//!
//! # Module Structure
//!
//! - `data/` - Fingerprint model, CSV persistence, validation
//! - `farbling/` - Farbling detector
//! - `matching/` - Naive and complex matchers
//!
//! # Example
//!
//! ```no_run
//! use rv_core::{check_submission, CheckOptions, CsvStore, Settings};
//! use serde_json::json;
//!
//! let settings = Settings::default();
//! let mut store = CsvStore::new(&settings.store_path);
//! let submission = json!({"Attributes": {"Screen Width": 1920, "Screen Height": 1080, "CPU": 8}});
//! let report = check_submission(&mut store, submission, &CheckOptions::from_settings(&settings)).unwrap();
//! println!("identity {}", report.resolution.identity_id);
//! ```

// Grouped modules
pub mod data;
pub mod farbling;
pub mod matching;

// Standalone modules
pub mod arbiter;
pub mod constants;
pub mod error;
pub mod evaluation;
pub mod receiver;
pub mod settings;
pub mod store;

// Re-export primary types from data/
pub use data::{Attributes, CsvRow, Fingerprint, FingerprintRecord, HashField, HashFields};

// Re-export persistence and validation functions from data/
pub use data::{
    append_capture, append_record, parse_rows, read_rows, validate_capture_name,
    validate_file_size, validate_fingerprint,
};

// Re-export error types
pub use error::{Result, RevisitError};

// Re-export engine entry points
pub use arbiter::{resolve, ArbiterPolicy};
pub use evaluation::{evaluate_capture, evaluate_rows, EvaluationSummary, FileEvaluation, Metric};
pub use farbling::{test_farbling, FarblingAnalysis, ResolutionVerdict};
pub use matching::{complex_search, naive_search};
pub use receiver::{
    check_fingerprint, check_submission, parse_submission, save_capture,
    save_capture_submission, CheckOptions,
};
pub use store::{CsvStore, IdentityStore, KnownIdentityStore, MemoryStore};

// Re-export settings functions
pub use settings::{
    get_settings_path, load_settings, load_settings_from, save_settings, save_settings_to,
    Settings,
};

/// Shared fixtures for unit tests
#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::json;

    use crate::data::{Attributes, Fingerprint, FingerprintRecord, HashFields};

    /// A complete desktop submission. Attributes are the same for every seed;
    /// the eight compared hashes carry the seed.
    pub fn full_fingerprint(seed: &str) -> Fingerprint {
        let mut attributes = Attributes::new();
        for (key, value) in [
            ("IP", json!("203.0.113.7")),
            ("CPU", json!(8)),
            ("Memory", json!("8 GB")),
            ("Screen Width", json!(1920)),
            ("Screen Height", json!(1080)),
            ("Usable Screen Width", json!(1920)),
            ("Usable Screen Height", json!(1040)),
            ("Color Depth", json!(24)),
            ("Touch Screen", json!(false)),
            ("Browser name", json!("Brave")),
            ("Browser core", json!("Blink")),
            ("Navigator properties", json!("vendorSub,productSub,vendor")),
            ("Browser permissions", json!("geolocation:prompt")),
            ("IndexedDB", json!(true)),
            ("Open database", json!(false)),
            ("Local storage", json!(true)),
            ("Session storage", json!(true)),
            ("Global Storage", json!(false)),
            ("PDF Viewer", json!(true)),
            ("Cookies Enabled", json!(true)),
            ("Do not track", json!("undefined")),
            ("AdBlock", json!(false)),
            ("Navigator Vendor", json!("Google Inc.")),
            ("Vendor", json!("WebKit")),
            ("Unmasked Vendor", json!("Google Inc. (Intel)")),
            ("Renderer", json!("WebKit WebGL")),
            ("Unmasked Renderer", json!("ANGLE (Intel, Mesa Intel(R) UHD Graphics 620)")),
            ("Shading Langueage Versions", json!("WebGL GLSL ES 1.0")),
        ] {
            attributes.insert(key, value);
        }

        Fingerprint {
            attributes,
            attributes_hash: None,
            hashes: HashFields {
                audio: Some(format!("audio-{}", seed)),
                fonts: Some(format!("fonts-{}", seed)),
                geom_canvas: Some(format!("geom-{}", seed)),
                media_capabilities: Some(format!("media-caps-{}", seed)),
                media_hash: Some(format!("media-{}", seed)),
                name: None,
                plugins: Some(format!("plugins-{}", seed)),
                plugins_hash: Some(format!("plugins-hash-{}", seed)),
                txt_canvas: Some(format!("txt-{}", seed)),
            },
        }
    }

    pub fn record_from(fingerprint: &Fingerprint, id: u64, log: u64) -> FingerprintRecord {
        FingerprintRecord::from_fingerprint(fingerprint, id, log)
    }
}

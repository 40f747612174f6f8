//! Offline evaluation of the complex strategy
//!
//! Every capture file holds submissions from one browser. The first row seeds
//! identity 0; each later row is matched against everything seen so far and
//! then joins the pool. Matching identity 0 is a true positive, any other
//! identity a false positive, no match a false negative.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::{read_rows, CsvRow, FingerprintRecord};
use crate::error::Result;
use crate::farbling::test_farbling;
use crate::matching::complex_search;
use crate::store::KnownIdentityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TruePositive,
    FalsePositive,
    TrueNegative,
    FalseNegative,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TruePositive,
        Metric::FalsePositive,
        Metric::TrueNegative,
        Metric::FalseNegative,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::TruePositive => "TP",
            Metric::FalsePositive => "FP",
            Metric::TrueNegative => "TN",
            Metric::FalseNegative => "FN",
        }
    }
}

/// Confusion counts for one capture file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileEvaluation {
    pub file: String,
    pub tp: usize,
    pub fp: usize,
    /// Every capture comes from one browser, so nothing is ever a true negative
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// Rows without usable attributes
    pub skipped: usize,
}

impl FileEvaluation {
    pub fn count(&self, metric: Metric) -> usize {
        match metric {
            Metric::TruePositive => self.tp,
            Metric::FalsePositive => self.fp,
            Metric::TrueNegative => self.tn,
            Metric::FalseNegative => self.fn_,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn percent(&self, metric: Metric) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.count(metric) as f64 / total as f64 * 100.0,
        }
    }
}

/// Replay one capture file
pub fn evaluate_capture(path: &Path) -> Result<FileEvaluation> {
    let rows = read_rows(path)?;
    let result = evaluate_rows(&path.display().to_string(), rows);
    info!(
        file = %result.file,
        tp = result.tp,
        fp = result.fp,
        fn_ = result.fn_,
        skipped = result.skipped,
        "Evaluated capture"
    );
    Ok(result)
}

/// Replay already-parsed capture rows
pub fn evaluate_rows(file: &str, rows: Vec<CsvRow>) -> FileEvaluation {
    let mut result = FileEvaluation {
        file: file.to_string(),
        ..FileEvaluation::default()
    };
    let mut pool = KnownIdentityStore::default();

    for row in rows {
        let line = row.row;
        let Some(fingerprint) = row.into_fingerprint() else {
            warn!(file, row = line, "Skipping row without attributes");
            result.skipped += 1;
            continue;
        };

        let missing = fingerprint.attributes.missing_required();
        if !missing.is_empty() {
            warn!(file, row = line, ?missing, "Skipping row missing required attributes");
            result.skipped += 1;
            continue;
        }

        let fingerprint = fingerprint.normalize();

        if pool.is_empty() {
            // First usable submission defines the browser under test
            pool.insert(FingerprintRecord::from_fingerprint(&fingerprint, 0, 0));
            result.tp += 1;
            continue;
        }

        let farbling = test_farbling(&fingerprint.attributes);
        let outcome = complex_search(&pool, &fingerprint, &farbling);

        let id = match outcome.identity() {
            Some(0) => {
                result.tp += 1;
                0
            }
            Some(other) => {
                result.fp += 1;
                other
            }
            None => {
                result.fn_ += 1;
                pool.next_identity_id()
            }
        };

        debug!(file, row = line, id, matched = outcome.matched, score = outcome.score, "Replayed row");
        let log = pool.next_log_index(id);
        pool.insert(FingerprintRecord::from_fingerprint(&fingerprint, id, log));
    }

    result
}

/// Results across capture files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub files: Vec<FileEvaluation>,
}

impl EvaluationSummary {
    pub fn new(files: Vec<FileEvaluation>) -> Self {
        Self { files }
    }

    pub fn total(&self, metric: Metric) -> usize {
        self.files.iter().map(|f| f.count(metric)).sum()
    }

    pub fn samples(&self) -> usize {
        self.files.iter().map(FileEvaluation::total).sum()
    }

    /// Per-file percentages weighted by file size
    pub fn weighted_percent(&self, metric: Metric) -> f64 {
        match self.samples() {
            0 => 0.0,
            samples => {
                self.files
                    .iter()
                    .map(|f| f.percent(metric) * f.total() as f64)
                    .sum::<f64>()
                    / samples as f64
            }
        }
    }

    /// Share of all samples
    pub fn weighted_rate(&self, metric: Metric) -> f64 {
        match self.samples() {
            0 => 0.0,
            samples => self.total(metric) as f64 / samples as f64,
        }
    }

    pub fn average_count(&self, metric: Metric) -> f64 {
        match self.files.len() {
            0 => 0.0,
            n => self.total(metric) as f64 / n as f64,
        }
    }

    pub fn average_percent(&self, metric: Metric) -> f64 {
        match self.files.len() {
            0 => 0.0,
            n => self.files.iter().map(|f| f.percent(metric)).sum::<f64>() / n as f64,
        }
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(60);

        writeln!(f, "Summary for all files (counts):")?;
        writeln!(f, "{:<40} {:<6} {:<6} {:<6} {:<6}", "File", "TP", "FP", "TN", "FN")?;
        writeln!(f, "{}", rule)?;
        for file in &self.files {
            writeln!(
                f,
                "{:<40} {:<6} {:<6} {:<6} {:<6}",
                file.file, file.tp, file.fp, file.tn, file.fn_
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Summary for all files (percentages):")?;
        writeln!(f, "{:<40} {:<7} {:<7} {:<7} {:<7}", "File", "TP%", "FP%", "TN%", "FN%")?;
        writeln!(f, "{}", rule)?;
        for file in &self.files {
            write!(f, "{:<40}", file.file)?;
            for metric in Metric::ALL {
                write!(f, " {:<7.2}", file.percent(metric))?;
            }
            writeln!(f)?;
        }

        if self.samples() > 0 {
            writeln!(f, "{}", rule)?;
            write!(f, "{:<40}", "WEIGHTED AVG")?;
            for metric in Metric::ALL {
                write!(f, " {:<7.2}", self.weighted_percent(metric))?;
            }
            writeln!(f)?;
            write!(f, "{:<40}", "WEIGHTED AVG (counts)")?;
            for metric in Metric::ALL {
                write!(f, " {:<6.4}", self.weighted_rate(metric))?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "Summary Table (Averages):")?;
        writeln!(f, "{:<10} {:<12} {:<12} {:<18}", "Metric", "Avg Value", "Avg %", "Weighted Avg %")?;
        writeln!(f, "{}", "-".repeat(52))?;
        for metric in Metric::ALL {
            writeln!(
                f,
                "{:<10} {:<12.2} {:<12.2} {:<18.2}",
                metric.label(),
                self.average_count(metric),
                self.average_percent(metric),
                self.weighted_percent(metric)
            )?;
        }

        Ok(())
    }
}

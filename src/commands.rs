/*
 * This file is part of Revisit.
 *
 * Copyright (C) 2025 Revisit contributors
 *
 * Revisit is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Revisit is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Revisit. If not, see <https://www.gnu.org/licenses/>.
 */

//! CLI command execution

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context};
use rv_core::{
    check_submission, evaluate_capture, get_settings_path, load_settings, parse_submission,
    save_capture_submission, save_settings, test_farbling, CheckOptions, CsvStore,
    EvaluationSummary, IdentityStore, Settings,
};
use rv_protocol::{CheckReport, FarblingReport, StoreStats};
use serde_json::{json, Value};
use tracing::info;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::client::DaemonClient;
use crate::logger::log_event;

/// Settings file and environment, then command-line overrides
pub fn effective_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = load_settings().context("Failed to load settings")?;
    Ok(apply_overrides(settings, cli))
}

pub fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(store) = &cli.store {
        settings.store_path = store.clone();
    }
    if let Some(dir) = &cli.capture_dir {
        settings.capture_dir = dir.clone();
    }
    settings
}

/// Read a submission from a file, or stdin for `-`
pub fn read_submission(input: &str) -> anyhow::Result<Value> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read submission from stdin")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", input))
}

pub fn check_local(settings: &Settings, submission: Value) -> anyhow::Result<CheckReport> {
    let mut store = CsvStore::new(&settings.store_path);
    let report = check_submission(&mut store, submission, &CheckOptions::from_settings(settings))?;
    Ok(report)
}

pub fn check_remote(socket: &Path, submission: Value) -> anyhow::Result<CheckReport> {
    let mut client = DaemonClient::connect(socket)
        .with_context(|| format!("Daemon unavailable at {}", socket.display()))?;
    Ok(client.check(submission)?)
}

pub fn farbling_report(submission: Value) -> anyhow::Result<FarblingReport> {
    let fingerprint = parse_submission(submission)?.normalize();
    Ok(test_farbling(&fingerprint.attributes).report())
}

pub fn store_stats(settings: &Settings, socket: Option<&Path>) -> anyhow::Result<StoreStats> {
    match socket {
        Some(socket) => {
            let mut client = DaemonClient::connect(socket)
                .with_context(|| format!("Daemon unavailable at {}", socket.display()))?;
            Ok(client.stats()?)
        }
        None => Ok(CsvStore::new(&settings.store_path).stats()?),
    }
}

pub fn evaluate_files<P: AsRef<Path>>(files: &[P]) -> anyhow::Result<EvaluationSummary> {
    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let file = file.as_ref();
        results.push(
            evaluate_capture(file).with_context(|| format!("Failed to evaluate {}", file.display()))?,
        );
    }
    Ok(EvaluationSummary::new(results))
}

/// Run one command, writing its result to `out`
pub fn execute(cli: &Cli, settings: &Settings, out: &mut dyn Write) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Check { input, socket } => {
            let submission = read_submission(input)?;
            let report = match socket {
                Some(socket) => check_remote(socket, submission)?,
                None => check_local(settings, submission)?,
            };
            log_event(
                "check",
                json!({
                    "decision": report.resolution.decision.as_str(),
                    "id": report.resolution.identity_id,
                    "log": report.resolution.log_index,
                    "farbling": report.farbling.overall_detected,
                }),
            );
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }

        Commands::Farbling { input } => {
            let report = farbling_report(read_submission(input)?)?;
            log_event("farbling", json!({ "detected": report.overall_detected }));
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }

        Commands::Save { name, input } => {
            let path = save_capture_submission(&settings.capture_dir, name, read_submission(input)?)?;
            log_event("save", json!({ "name": name, "path": path.display().to_string() }));
            writeln!(out, "Saved capture to {}", path.display())?;
        }

        Commands::Evaluate { files, json } => {
            let summary = evaluate_files(files)?;
            log_event(
                "evaluate",
                json!({ "files": files.len(), "samples": summary.samples() }),
            );
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                write!(out, "{}", summary)?;
            }
        }

        Commands::Stats { socket } => {
            let stats = store_stats(settings, socket.as_deref())?;
            log_event("stats", json!({ "records": stats.records }));
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }

        Commands::Config(sub) => config_command(sub, settings, out)?,
    }
    Ok(())
}

fn config_command(cmd: &ConfigCommands, settings: &Settings, out: &mut dyn Write) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            writeln!(out, "{}", serde_json::to_string_pretty(settings)?)?;
        }
        ConfigCommands::Path => {
            writeln!(out, "{}", get_settings_path()?.display())?;
        }
        ConfigCommands::Init { force } => {
            let path = get_settings_path()?;
            if path.exists() && !force {
                bail!("{} already exists. Use --force to overwrite.", path.display());
            }
            let path = save_settings(&Settings::default())?;
            info!(path = ?path, "Wrote default settings");
            writeln!(out, "Wrote default settings to {}", path.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            store_path: dir.path().join("fp_data.csv"),
            capture_dir: dir.path().join("captures"),
            ..Settings::default()
        }
    }

    fn write_submission(dir: &TempDir, name: &str, value: &Value) -> String {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path.display().to_string()
    }

    fn submission() -> Value {
        json!({
            "Attributes": {"CPU": 7, "Memory": "8 GB", "Screen Width": 1920, "Screen Height": 1080},
            "Audio": "a1",
        })
    }

    #[test]
    fn test_overrides_win() {
        let cli = Cli::parse_from(["revisit", "--store", "/tmp/x.csv", "stats"]);
        let s = apply_overrides(Settings::default(), &cli);
        assert_eq!(s.store_path, PathBuf::from("/tmp/x.csv"));
        assert_eq!(s.capture_dir, Settings::default().capture_dir);
    }

    #[test]
    fn test_check_writes_report() {
        let dir = TempDir::new().unwrap();
        let input = write_submission(&dir, "sub.json", &submission());
        let cli = Cli::parse_from(["revisit", "check", &input]);

        let mut out = Vec::new();
        execute(&cli, &settings(&dir), &mut out).unwrap();

        let report: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["resolution"]["decision"], "new");
        assert_eq!(report["summary"]["cpuModified"], true);
        assert!(dir.path().join("fp_data.csv").exists());
    }

    #[test]
    fn test_farbling_command_does_not_touch_store() {
        let dir = TempDir::new().unwrap();
        let input = write_submission(&dir, "sub.json", &submission());
        let cli = Cli::parse_from(["revisit", "farbling", &input]);

        let mut out = Vec::new();
        execute(&cli, &settings(&dir), &mut out).unwrap();

        let report: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["cpuDetected"], true);
        assert!(!dir.path().join("fp_data.csv").exists());
    }

    #[test]
    fn test_invalid_json_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();
        assert!(read_submission(&path.display().to_string()).is_err());
    }
}

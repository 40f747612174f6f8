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

//! Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "revisit")]
#[command(version)]
#[command(about = "Revisit - browser fingerprint re-identification")]
#[command(long_about = "Revisit - browser fingerprint re-identification

Matches fingerprint submissions against a store of known identities,
detecting browsers that randomize (farble) their reported values.

EXAMPLES:
    revisit check submission.json          Check a submission against the store
    revisit check - < submission.json      Read the submission from stdin
    revisit check sub.json --socket /run/revisit/revisit.sock
    revisit farbling submission.json       Run only the farbling detector
    revisit save brave_1 submission.json   Append to captures/brave_1.csv
    revisit evaluate captures/*.csv        Replay labelled captures
    revisit stats                          Store summary
    revisit config init                    Write a default settings file

ENVIRONMENT VARIABLES:
    REVISIT_STORE                  Store CSV path
    REVISIT_CAPTURE_DIR            Capture directory
    REVISIT_SOCKET                 Daemon socket
    REVISIT_RECORD_EXACT_REVISITS  Also store exact revisits (true/false)
    REVISIT_LOG                    Log filter (e.g. debug, rv_core=trace)

FILES:
    ~/.config/revisit/settings.json        Settings
    ~/.local/share/revisit/fp_data.csv     Known-identity store")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Known-identity store CSV (overrides settings)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Directory for named captures (overrides settings)
    #[arg(long, global = true, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,

    /// Append JSON-lines events to this file
    #[arg(long, global = true, value_name = "PATH", env = "REVISIT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a submission and record it in the store
    Check {
        /// Submission JSON file, or - for stdin
        input: String,
        /// Send the submission to a running daemon instead
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Run the farbling detector only
    Farbling {
        /// Submission JSON file, or - for stdin
        input: String,
    },

    /// Append a submission to a named capture file
    Save {
        /// Capture name (letters, digits, space, '-', '_', '.')
        name: String,
        /// Submission JSON file, or - for stdin
        input: String,
    },

    /// Replay capture files and report TP/FP/FN
    Evaluate {
        /// Capture CSV files, one browser per file
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the known-identity store
    Stats {
        /// Ask a running daemon instead of reading the store
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Settings file management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings as JSON
    Show,
    /// Print the settings file path
    Path,
    /// Write a default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Check { .. } => "check",
            Commands::Farbling { .. } => "farbling",
            Commands::Save { .. } => "save",
            Commands::Evaluate { .. } => "evaluate",
            Commands::Stats { .. } => "stats",
            Commands::Config(_) => "config",
        }
    }
}

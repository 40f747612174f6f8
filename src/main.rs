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

use std::io::stdout;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use revisit::cli::Cli;
use revisit::{commands, logger};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match commands::effective_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Diagnostics go to stderr so command output stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::new(&settings.log_level))
        .init();

    // Optional JSON-lines event log
    let logging_enabled = cli.log_file.is_some();
    if let Some(path) = &cli.log_file {
        if let Err(e) = logger::init_logging(path) {
            eprintln!("warning: could not open event log {}: {}", path.display(), e);
        }
        logger::log_event(
            "startup",
            serde_json::json!({
                "command": cli.command.name(),
                "store": settings.store_path.display().to_string(),
            }),
        );
    }

    let mut out = stdout().lock();
    if let Err(err) = commands::execute(&cli, &settings, &mut out) {
        eprintln!("error: {:#}", err);
        if logging_enabled {
            logger::log_event("fatal_error", serde_json::json!({ "error": format!("{:#}", err) }));
        }
        std::process::exit(1);
    }

    Ok(())
}

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

//! Revisit - browser fingerprint re-identification
//!
//! Command-line front end for the identity engine in `rv_core`: checks
//! submissions locally or through `revisitd`, saves labelled captures and
//! replays them for evaluation.

pub mod cli;
pub mod client;
pub mod commands;
pub mod logger;

// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! ragraph command-line front end
//!
//! Reads snapshots from JSON or line-list files, runs the deadlock analysis
//! and keeps a log of past runs.

pub mod cli;
pub mod commands;
pub mod config;
pub mod input;
pub mod results_log;

pub use cli::{AnalyzeArgs, Cli, Commands, OutputFormat};
pub use config::CliConfig;
pub use input::{InputError, LineInput, LineParser, ListKind};
pub use results_log::{LoggedRun, ResultsLog};

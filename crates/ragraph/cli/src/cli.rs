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

//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ragraph")]
#[command(about = "Resource-allocation graph deadlock analyzer")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML); falls back to RAGRAPH_CONFIG
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Results log file; falls back to RAGRAPH_RESULTS, then the config file
    #[arg(long, global = true)]
    pub results: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a snapshot for deadlock
    Analyze(AnalyzeArgs),
    /// List logged analysis runs
    History {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one logged analysis run
    Show {
        /// Run id
        id: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeArgs {
    /// JSON snapshot with recursos, processos, alocacoes and requisicoes
    #[arg(long, short = 'i', conflicts_with_all = ["resources", "processes", "allocations", "requests"])]
    pub input: Option<PathBuf>,

    /// File with one `R1:2` resource per line
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// File with one `P1` process per line
    #[arg(long)]
    pub processes: Option<PathBuf>,

    /// File with one `R1:P1` allocation per line
    #[arg(long)]
    pub allocations: Option<PathBuf>,

    /// File with one `P1:R1` request per line
    #[arg(long)]
    pub requests: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Include the step-by-step trace in the output
    #[arg(long)]
    pub trace: bool,

    /// Do not append this run to the results log
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_input_conflicts_with_line_files() {
        let parsed = Cli::try_parse_from(["ragraph", "analyze", "--input", "a.json", "--resources", "r.txt"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ragraph", "show", "3", "--results", "runs.json", "--format", "json"]).unwrap();
        assert_eq!(cli.results, Some(PathBuf::from("runs.json")));
        assert!(matches!(cli.command, Commands::Show { id: 3, format: OutputFormat::Json }));
    }
}

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

//! Subcommand handlers
//!
//! Handlers write their output to the given writer so the binary can pass
//! stdout while tests capture it.

use crate::cli::{AnalyzeArgs, Commands, OutputFormat};
use crate::config::CliConfig;
use crate::input::{LineInput, LineParser};
use crate::results_log::{LoggedRun, ResultsLog};
use anyhow::{Context, Result, bail};
use ragraph_core::{Diagnostic, RunRecord, Snapshot, Verdict, analyze, cycles::describe_nodes};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn dispatch(config: &CliConfig, command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Analyze(args) => handle_analyze(config, &args, out),
        Commands::History { format } => handle_history(config, format, out),
        Commands::Show { id, format } => handle_show(config, id, format, out),
    }
}

pub fn handle_analyze(config: &CliConfig, args: &AnalyzeArgs, out: &mut impl Write) -> Result<()> {
    let snapshot = load_snapshot(args)?;
    let verdict = analyze(&snapshot, &config.analysis)?;
    info!(deadlocked = verdict.deadlocked, "Analysis complete");

    let id = if args.no_save {
        None
    } else {
        let mut log = ResultsLog::open(&config.results_path);
        Some(log.append(RunRecord::from_verdict(&snapshot, &verdict))?)
    };

    match args.format {
        OutputFormat::Text => {
            write!(out, "{}", render_verdict(&verdict, args.trace))?;
            if let Some(id) = id {
                writeln!(out, "Result saved with ID #{id}")?;
            }
        }
        OutputFormat::Json => {
            let mut verdict = serde_json::to_value(&verdict)?;
            if !args.trace {
                if let Some(fields) = verdict.as_object_mut() {
                    fields.remove("trace");
                }
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&json!({ "id": id, "verdict": verdict }))?)?;
        }
    }
    Ok(())
}

pub fn handle_history(config: &CliConfig, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let log = ResultsLog::open(&config.results_path);
    match format {
        OutputFormat::Text => {
            if log.runs().is_empty() {
                writeln!(out, "No runs logged in {}", log.path().display())?;
            }
            for run in log.runs() {
                writeln!(out, "{}", summary_line(run))?;
            }
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(log.runs())?)?,
    }
    Ok(())
}

pub fn handle_show(config: &CliConfig, id: u64, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let log = ResultsLog::open(&config.results_path);
    let Some(run) = log.get(id) else {
        bail!("No run with id {} in {}", id, log.path().display());
    };

    match format {
        OutputFormat::Text => {
            writeln!(out, "{}", summary_line(run))?;
            let snapshot = &run.record.snapshot;
            writeln!(out, "Resources:")?;
            for (resource, units) in &snapshot.resources {
                writeln!(out, "  {resource}: {units}")?;
            }
            writeln!(out, "Processes: {}", join(snapshot.processes.iter().map(|p| p.as_str())))?;
            writeln!(out, "Allocations:")?;
            for (resource, holders) in &snapshot.allocations {
                writeln!(out, "  {resource} -> {}", join(holders.iter().map(|p| p.as_str())))?;
            }
            writeln!(out, "Requests:")?;
            for (process, wanted) in &snapshot.requests {
                writeln!(out, "  {process} -> {}", join(wanted.iter().map(|r| r.as_str())))?;
            }
        }
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(run)?)?,
    }
    Ok(())
}

/// Read the snapshot from a JSON file or from the four line-list files
pub fn load_snapshot(args: &AnalyzeArgs) -> Result<Snapshot> {
    if let Some(path) = &args.input {
        let content = read(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content).with_context(|| format!("Invalid snapshot JSON in {}", path.display()))?;
        return Ok(snapshot);
    }

    let files = [&args.resources, &args.processes, &args.allocations, &args.requests];
    if files.iter().all(|file| file.is_none()) {
        bail!("Provide --input or at least one of --resources, --processes, --allocations, --requests");
    }

    let input = LineInput {
        resources: read_optional(&args.resources)?,
        processes: read_optional(&args.processes)?,
        allocations: read_optional(&args.allocations)?,
        requests: read_optional(&args.requests)?,
    };
    Ok(LineParser::new()?.parse(&input)?)
}

/// Human-readable verdict, optionally followed by the trace
pub fn render_verdict(verdict: &Verdict, include_trace: bool) -> String {
    let mut text = String::new();
    if verdict.deadlocked {
        text.push_str("DEADLOCK detected!\n");
        if verdict.representative_cycle.is_empty() {
            let reason = verdict.cycle_reason.map(|reason| reason.to_string()).unwrap_or_default();
            text.push_str(&format!("Cycle involved: none ({reason})\n"));
        } else {
            text.push_str(&format!("Cycle involved: {}\n", verdict.cycle_text()));
        }
        text.push_str("Blocked processes:\n");
        for blocked in &verdict.blocked {
            text.push_str(&format!("  {}: {}\n", blocked.process, blocked.cause));
        }
    } else {
        text.push_str("No deadlock detected.\n");
    }

    if !verdict.completed_order.is_empty() {
        text.push_str(&format!("Completion order: {}\n", join(verdict.completed_order.iter().map(|p| p.as_str()))));
    }
    for warning in &verdict.warnings {
        text.push_str(&format!(
            "Warning: {} has {} unit(s) allocated but only {} declared\n",
            warning.resource, warning.allocated_units, warning.total_units
        ));
    }
    for diagnostic in &verdict.diagnostics {
        text.push_str(&format!("Note: {}\n", describe_diagnostic(diagnostic)));
    }

    if include_trace {
        text.push_str("Trace:\n");
        for step in &verdict.trace {
            text.push_str(&format!("  [{}] {}\n", step.index(), step.caption()));
        }
    }
    text
}

fn describe_diagnostic(diagnostic: &Diagnostic) -> String {
    match diagnostic {
        Diagnostic::InfeasibleCycleWithoutDeadlock { cycle } => {
            format!("cycle {} looked infeasible, but every process can complete", describe_nodes(cycle))
        }
        Diagnostic::DeadlockWithoutCycle { blocked } => {
            format!("{} blocked without a graph cycle", join(blocked.iter().map(|p| p.as_str())))
        }
        Diagnostic::DeadlockBesideCycles { blocked, mixed_cycles } => format!(
            "{} blocked, but none of the {mixed_cycles} mixed cycle(s) runs only through blocked processes",
            join(blocked.iter().map(|p| p.as_str()))
        ),
        Diagnostic::CycleEnumerationTruncated { found } => format!("cycle enumeration stopped after {found} cycle(s)"),
    }
}

fn summary_line(run: &LoggedRun) -> String {
    if run.record.deadlock_detected {
        format!("#{} {} DEADLOCK {}", run.id, run.timestamp, run.record.cycle_text())
    } else {
        format!("#{} {} ok", run.id, run.timestamp)
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_optional(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => read(path),
        None => Ok(String::new()),
    }
}

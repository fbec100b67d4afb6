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

//! Resource-allocation graph deadlock analysis
//!
//! Builds a resource-allocation graph from a [`Snapshot`], enumerates its
//! cycles, simulates whether every process can still complete and merges
//! both results into a [`Verdict`] with a step-by-step [`Trace`].
//!
//! The whole pipeline is synchronous and pure: every call owns its graph and
//! working state, so calls may run concurrently without coordination.

pub mod config;
pub mod cycles;
pub mod error;
pub mod feasibility;
pub mod graph;
pub mod model;
pub mod report;
pub mod resolver;
pub mod trace;

pub use config::AnalysisConfig;
pub use cycles::{CycleAnalyzer, CycleClass, CycleReport, InfeasibleRequest, SimpleCycle, find_cycles};
pub use error::{AnalysisError, AnalysisResult};
pub use feasibility::{FeasibilitySimulator, Round, Simulation, simulate};
pub use graph::{CapacityWarning, ResourceGraph};
pub use model::{Availability, EdgeKind, EdgeRef, NodeId, NodeKind, ProcessId, ResourceId, Snapshot, UnitCounts};
pub use report::RunRecord;
pub use resolver::{BlockCause, BlockedProcess, CycleReason, DeadlockResolver, Diagnostic, Shortfall, Verdict, resolve};
pub use trace::{Step, StepDraft, StepKind, Trace, TraceRecorder};

use tracing::instrument;

/// Build the graph for `snapshot` and analyze it
#[instrument(skip_all, fields(resources = snapshot.resources.len(), processes = snapshot.processes.len()))]
pub fn analyze(snapshot: &Snapshot, config: &AnalysisConfig) -> AnalysisResult<Verdict> {
    let graph = ResourceGraph::build_with(snapshot, config)?;
    analyze_graph(&graph, config)
}

/// Run the cycle analysis, the feasibility simulation and the resolver on an
/// already built graph
pub fn analyze_graph(graph: &ResourceGraph, config: &AnalysisConfig) -> AnalysisResult<Verdict> {
    if graph.processes().is_empty() {
        return Ok(Verdict::trivial(graph));
    }

    let mut recorder = TraceRecorder::new(graph);
    let available = graph.initial_available();
    let warnings = graph.capacity_warnings();

    let mut caption = format!("Snapshot with {} resource(s) and {} process(es)", graph.resources().len(), graph.processes().len());
    if !warnings.is_empty() {
        caption.push_str(&format!("; {} resource(s) allocated beyond capacity", warnings.len()));
    }
    recorder.record(
        StepDraft::new(
            StepKind::Snapshot {
                resources: graph.resources().len(),
                processes: graph.processes().len(),
                warnings,
            },
            caption,
        )
        .availability(&available),
    )?;

    let cycles = find_cycles(graph, config);
    cycles.record(&mut recorder, &available)?;

    let simulation = simulate(graph, &mut recorder)?;
    resolve(graph, &cycles, &simulation, recorder)
}

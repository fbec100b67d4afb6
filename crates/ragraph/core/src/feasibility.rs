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

//! Feasibility simulation
//!
//! Greedy safe-sequence search in the style of the Banker's algorithm. Each
//! round scans the pending processes in declaration order and completes the
//! first one whose outstanding requests fit in the available units; that
//! process then returns everything it holds. The search stops when every
//! process has completed or a full pass makes no progress, so there are at
//! most as many rounds as processes.

use crate::error::AnalysisResult;
use crate::graph::ResourceGraph;
use crate::model::{Availability, EdgeRef, NodeId, ProcessId, UnitCounts};
use crate::trace::{StepDraft, StepKind, TraceRecorder};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// One completed process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    pub number: u32,
    pub process: ProcessId,
    pub released: UnitCounts,
    /// Availability after the release
    pub availability: Availability,
}

/// Outcome of the feasibility simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Simulation {
    pub all_completed: bool,
    pub completed_order: Vec<ProcessId>,
    /// Processes left pending, in declaration order
    pub blocked: Vec<ProcessId>,
    pub rounds: Vec<Round>,
    pub initial_available: Availability,
    pub final_available: Availability,
}

impl Simulation {
    pub fn is_blocked(&self, process: &ProcessId) -> bool {
        self.blocked.contains(process)
    }

    /// Lowest availability any resource reached, over the initial state and every round
    pub fn min_available(&self) -> Option<i64> {
        std::iter::once(&self.initial_available)
            .chain(self.rounds.iter().map(|round| &round.availability))
            .flat_map(|availability| availability.values().copied())
            .min()
    }
}

/// Simulate completion of every process of `graph`, recording the rounds
pub fn simulate(graph: &ResourceGraph, recorder: &mut TraceRecorder<'_>) -> AnalysisResult<Simulation> {
    FeasibilitySimulator::new(graph).run(recorder)
}

/// Runs the safe-sequence search against one graph
pub struct FeasibilitySimulator<'g> {
    graph: &'g ResourceGraph,
}

impl<'g> FeasibilitySimulator<'g> {
    pub fn new(graph: &'g ResourceGraph) -> Self {
        Self { graph }
    }

    /// Run the simulation, appending one step per round and a final step if
    /// some processes stay blocked
    #[instrument(skip_all, fields(processes = self.graph.processes().len()))]
    pub fn run(&self, recorder: &mut TraceRecorder<'_>) -> AnalysisResult<Simulation> {
        let initial_available = self.graph.initial_available();
        let mut available = initial_available.clone();
        let mut held: BTreeMap<&ProcessId, UnitCounts> = self.graph.processes().iter().map(|p| (p, self.graph.held_by(p).clone())).collect();
        let mut pending: Vec<&ProcessId> = self.graph.processes().iter().collect();
        let mut completed_order = Vec::new();
        let mut rounds = Vec::new();

        while let Some(position) = pending.iter().position(|process| fits(self.graph.requested_by(process), &available)) {
            let number = rounds.len() as u32 + 1;
            let process = pending.remove(position);
            let released = held.remove(process).unwrap_or_default();
            for (resource, &units) in &released {
                *available.entry(resource.clone()).or_insert(0) += i64::from(units);
            }
            debug!(round = number, process = %process, released = released.values().sum::<u32>(), "Process can complete");

            let step = StepDraft::new(
                StepKind::ProcessCompleted {
                    process: process.clone(),
                    released: released.clone(),
                },
                completion_caption(number, process, &released),
            )
            .round(number)
            .highlight_node(NodeId::Process(process.clone()))
            .highlight_nodes(released.keys().map(|resource| NodeId::Resource(resource.clone())))
            .highlight_edges(released.keys().map(|resource| EdgeRef::allocation(resource, process)))
            .availability(&available);
            recorder.record(step)?;

            completed_order.push(process.clone());
            rounds.push(Round {
                number,
                process: process.clone(),
                released,
                availability: available.clone(),
            });
        }

        let blocked: Vec<ProcessId> = pending.into_iter().cloned().collect();
        if !blocked.is_empty() {
            let requests = blocked.iter().flat_map(|process| {
                self.graph
                    .requested_by(process)
                    .keys()
                    .map(move |resource| EdgeRef::request(process, resource))
            });
            let step = StepDraft::new(
                StepKind::Stalled { blocked: blocked.clone() },
                format!("No pending process can be satisfied; blocked: {}", join(&blocked)),
            )
            .highlight_nodes(blocked.iter().map(|process| NodeId::Process(process.clone())))
            .highlight_edges(requests)
            .availability(&available);
            recorder.record(step)?;
        }

        info!(completed = completed_order.len(), blocked = blocked.len(), "Feasibility simulation finished");
        Ok(Simulation {
            all_completed: blocked.is_empty(),
            completed_order,
            blocked,
            rounds,
            initial_available,
            final_available: available,
        })
    }
}

/// Whether every requested quantity fits in the available units
fn fits(requested: &UnitCounts, available: &Availability) -> bool {
    requested
        .iter()
        .all(|(resource, &units)| i64::from(units) <= available.get(resource).copied().unwrap_or(0))
}

fn completion_caption(round: u32, process: &ProcessId, released: &UnitCounts) -> String {
    if released.is_empty() {
        format!("Round {round}: {process} can complete; it held nothing")
    } else {
        let units: Vec<String> = released.iter().map(|(resource, units)| format!("{units}x {resource}")).collect();
        format!("Round {round}: {process} can complete and releases {}", units.join(", "))
    }
}

fn join(processes: &[ProcessId]) -> String {
    processes.iter().map(ProcessId::as_str).collect::<Vec<_>>().join(", ")
}

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

//! Deadlock resolution
//!
//! Merges the cycle report and the feasibility simulation into a single
//! [`Verdict`]. The simulation decides whether the snapshot is deadlocked;
//! cycles only pick a representative for reporting. When the two signals
//! disagree the disagreement is kept as a [`Diagnostic`].

use crate::cycles::{CycleReport, SimpleCycle, describe_nodes};
use crate::error::AnalysisResult;
use crate::feasibility::Simulation;
use crate::graph::{CapacityWarning, ResourceGraph};
use crate::model::{EdgeRef, NodeId, ProcessId, ResourceId};
use crate::trace::{StepDraft, StepKind, Trace, TraceRecorder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, instrument, warn};

/// Why the representative cycle was chosen, or why there is none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleReason {
    /// A mixed cycle whose members request more than is available
    InfeasibleRequest,
    /// A mixed cycle made up of blocked processes only
    BlockedProcesses,
    /// Deadlocked, and the graph has no mixed cycle at all
    ResourceScarcityWithoutCycle,
    /// Deadlocked, and the cycle limit stopped enumeration before an
    /// explaining cycle was found
    CycleSearchTruncated,
    /// Deadlocked beside mixed cycles that none of the blocked processes explain
    NoExplainingCycle,
}

impl fmt::Display for CycleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfeasibleRequest => f.write_str("cycle with requests exceeding available units"),
            Self::BlockedProcesses => f.write_str("cycle through blocked processes"),
            Self::ResourceScarcityWithoutCycle => f.write_str("resource scarcity without a graph cycle"),
            Self::CycleSearchTruncated => f.write_str("cycle search stopped at the configured limit"),
            Self::NoExplainingCycle => f.write_str("no enumerated cycle explains the blocked processes"),
        }
    }
}

/// A resource a blocked process cannot get enough of
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub resource: ResourceId,
    pub requested: u32,
    /// Units available when the simulation stopped
    pub available: i64,
    pub total_units: u32,
    /// Units of this resource the blocked process itself holds
    pub held: u32,
}

impl Shortfall {
    /// The request cannot be met even if every other process released its units
    pub fn exceeds_capacity(&self) -> bool {
        u64::from(self.held) + u64::from(self.requested) > u64::from(self.total_units)
    }
}

/// Why a process stays blocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum BlockCause {
    /// Some request is larger than the resource could ever supply to this process
    ExceedsCapacity { shortfalls: Vec<Shortfall> },
    /// The missing units are held by other blocked processes
    CircularWait { shortfalls: Vec<Shortfall>, holders: Vec<ProcessId> },
}

impl BlockCause {
    pub fn shortfalls(&self) -> &[Shortfall] {
        match self {
            Self::ExceedsCapacity { shortfalls } | Self::CircularWait { shortfalls, .. } => shortfalls,
        }
    }
}

impl fmt::Display for BlockCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: Vec<String> = self
            .shortfalls()
            .iter()
            .map(|s| format!("{} (needs {}, {} available of {})", s.resource, s.requested, s.available, s.total_units))
            .collect();
        match self {
            Self::ExceedsCapacity { .. } => write!(f, "request exceeds capacity: {}", short.join(", ")),
            Self::CircularWait { holders, .. } => {
                let holders: Vec<&str> = holders.iter().map(ProcessId::as_str).collect();
                write!(f, "circular wait on {}; held by {}", short.join(", "), holders.join(", "))
            }
        }
    }
}

/// A blocked process and the reason it is blocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedProcess {
    pub process: ProcessId,
    pub cause: BlockCause,
}

/// Disagreement or incompleteness worth surfacing next to the verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "diagnostic", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A cycle looked infeasible, yet every process could complete
    InfeasibleCycleWithoutDeadlock { cycle: Vec<NodeId> },
    /// Processes are blocked although no mixed cycle exists
    DeadlockWithoutCycle { blocked: Vec<ProcessId> },
    /// Processes are blocked and mixed cycles exist, but none is infeasible
    /// or made of blocked processes only
    DeadlockBesideCycles { blocked: Vec<ProcessId>, mixed_cycles: usize },
    /// Cycle enumeration hit the configured limit
    CycleEnumerationTruncated { found: usize },
}

/// Final result of one analysis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub deadlocked: bool,
    /// Empty unless deadlocked and a cycle explains it
    pub representative_cycle: Vec<NodeId>,
    pub cycle_reason: Option<CycleReason>,
    pub completed_order: Vec<ProcessId>,
    pub blocked: Vec<BlockedProcess>,
    pub cycles: Vec<SimpleCycle>,
    pub warnings: Vec<CapacityWarning>,
    pub diagnostics: Vec<Diagnostic>,
    pub trace: Trace,
}

impl Verdict {
    /// Verdict for a snapshot without processes
    pub(crate) fn trivial(graph: &ResourceGraph) -> Self {
        Self {
            deadlocked: false,
            representative_cycle: Vec::new(),
            cycle_reason: None,
            completed_order: Vec::new(),
            blocked: Vec::new(),
            cycles: Vec::new(),
            warnings: graph.capacity_warnings(),
            diagnostics: Vec::new(),
            trace: Trace::default(),
        }
    }

    pub fn blocked_processes(&self) -> BTreeSet<&ProcessId> {
        self.blocked.iter().map(|blocked| &blocked.process).collect()
    }

    /// `A -> B -> C` rendering of the representative cycle
    pub fn cycle_text(&self) -> String {
        describe_nodes(&self.representative_cycle)
    }
}

/// Merge `cycles` and `simulation` into the verdict, closing the trace with
/// the verdict step
pub fn resolve<'g>(
    graph: &'g ResourceGraph,
    cycles: &CycleReport,
    simulation: &Simulation,
    recorder: TraceRecorder<'g>,
) -> AnalysisResult<Verdict> {
    DeadlockResolver::new(graph).resolve(cycles, simulation, recorder)
}

/// Combines cycle and simulation results
pub struct DeadlockResolver<'g> {
    graph: &'g ResourceGraph,
}

impl<'g> DeadlockResolver<'g> {
    pub fn new(graph: &'g ResourceGraph) -> Self {
        Self { graph }
    }

    #[instrument(skip_all, fields(cycles = cycles.len(), blocked = simulation.blocked.len()))]
    pub fn resolve(&self, cycles: &CycleReport, simulation: &Simulation, mut recorder: TraceRecorder<'g>) -> AnalysisResult<Verdict> {
        let deadlocked = !simulation.all_completed;
        let mut diagnostics = Vec::new();

        if cycles.truncated() {
            diagnostics.push(Diagnostic::CycleEnumerationTruncated { found: cycles.len() });
        }

        let (representative_cycle, cycle_reason) = if deadlocked {
            match self.representative(cycles, simulation) {
                Some((cycle, reason)) => (cycle.nodes().to_vec(), Some(reason)),
                None => (Vec::new(), Some(self.unexplained(cycles, simulation, &mut diagnostics))),
            }
        } else {
            if let Some(cycle) = cycles.first_infeasible() {
                warn!(cycle = %cycle.describe(), "Infeasible-looking cycle, but every process can complete");
                diagnostics.push(Diagnostic::InfeasibleCycleWithoutDeadlock {
                    cycle: cycle.nodes().to_vec(),
                });
            }
            (Vec::new(), None)
        };

        let blocked: Vec<BlockedProcess> = simulation
            .blocked
            .iter()
            .map(|process| BlockedProcess {
                process: process.clone(),
                cause: self.cause(process, simulation),
            })
            .collect();

        let caption = match (deadlocked, &cycle_reason) {
            (false, _) => "No deadlock: every process can complete".to_string(),
            (true, Some(reason @ (CycleReason::InfeasibleRequest | CycleReason::BlockedProcesses))) => {
                format!("Deadlock: cycle {} ({reason})", describe_nodes(&representative_cycle))
            }
            (true, Some(reason)) => format!("Deadlock: {} process(es) blocked, {reason}", blocked.len()),
            (true, None) => format!("Deadlock: {} process(es) blocked", blocked.len()),
        };
        let step = StepDraft::new(
            StepKind::Verdict {
                deadlocked,
                cycle: representative_cycle.clone(),
            },
            caption,
        )
        .highlight_nodes(representative_cycle.iter().cloned())
        .highlight_nodes(blocked.iter().map(|b| NodeId::Process(b.process.clone())))
        .highlight_edges(cycle_edges(&representative_cycle))
        .availability(&simulation.final_available);
        recorder.record(step)?;

        info!(deadlocked, blocked = blocked.len(), cycle = %describe_nodes(&representative_cycle), "Deadlock analysis resolved");
        Ok(Verdict {
            deadlocked,
            representative_cycle,
            cycle_reason,
            completed_order: simulation.completed_order.clone(),
            blocked,
            cycles: cycles.cycles().to_vec(),
            warnings: self.graph.capacity_warnings(),
            diagnostics,
            trace: recorder.finish(),
        })
    }

    /// First infeasible mixed cycle, else the first mixed cycle whose processes are all blocked
    fn representative<'c>(&self, cycles: &'c CycleReport, simulation: &Simulation) -> Option<(&'c SimpleCycle, CycleReason)> {
        if let Some(cycle) = cycles.first_infeasible() {
            return Some((cycle, CycleReason::InfeasibleRequest));
        }
        cycles
            .mixed()
            .find(|cycle| cycle.processes().all(|process| simulation.is_blocked(process)))
            .map(|cycle| (cycle, CycleReason::BlockedProcesses))
    }

    /// Reason and diagnostic for a deadlock no enumerated cycle explains
    fn unexplained(&self, cycles: &CycleReport, simulation: &Simulation, diagnostics: &mut Vec<Diagnostic>) -> CycleReason {
        if cycles.truncated() {
            return CycleReason::CycleSearchTruncated;
        }
        let mixed_cycles = cycles.mixed().count();
        if mixed_cycles == 0 {
            diagnostics.push(Diagnostic::DeadlockWithoutCycle {
                blocked: simulation.blocked.clone(),
            });
            CycleReason::ResourceScarcityWithoutCycle
        } else {
            diagnostics.push(Diagnostic::DeadlockBesideCycles {
                blocked: simulation.blocked.clone(),
                mixed_cycles,
            });
            CycleReason::NoExplainingCycle
        }
    }

    fn cause(&self, process: &ProcessId, simulation: &Simulation) -> BlockCause {
        let held = self.graph.held_by(process);
        let shortfalls: Vec<Shortfall> = self
            .graph
            .requested_by(process)
            .iter()
            .filter_map(|(resource, &requested)| {
                let available = simulation.final_available.get(resource).copied().unwrap_or(0);
                (i64::from(requested) > available).then(|| Shortfall {
                    resource: resource.clone(),
                    requested,
                    available,
                    total_units: self.graph.total_units(resource),
                    held: held.get(resource).copied().unwrap_or(0),
                })
            })
            .collect();

        let beyond_capacity: Vec<Shortfall> = shortfalls.iter().filter(|s| s.exceeds_capacity()).cloned().collect();
        if !beyond_capacity.is_empty() {
            return BlockCause::ExceedsCapacity { shortfalls: beyond_capacity };
        }

        let holders = simulation
            .blocked
            .iter()
            .filter(|other| *other != process)
            .filter(|other| shortfalls.iter().any(|s| self.graph.held_by(other).contains_key(&s.resource)))
            .cloned()
            .collect();
        BlockCause::CircularWait { shortfalls, holders }
    }
}

fn cycle_edges(nodes: &[NodeId]) -> Vec<EdgeRef> {
    let n = nodes.len();
    (0..n).map(|i| EdgeRef::new(nodes[i].clone(), nodes[(i + 1) % n].clone())).collect()
}

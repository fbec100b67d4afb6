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

//! Cycle analysis
//!
//! Enumerates every simple cycle of the resource-allocation graph with
//! Johnson's algorithm, restricted to one strongly connected component at a
//! time, then classifies each cycle and checks whether its mixed
//! resource/process members request more units than are currently available.
//!
//! A cycle is a necessary, not a sufficient, signal: the feasibility
//! simulation decides whether the snapshot is actually deadlocked.

use crate::config::AnalysisConfig;
use crate::error::AnalysisResult;
use crate::graph::ResourceGraph;
use crate::model::{Availability, EdgeRef, NodeId, NodeKind, ProcessId, ResourceId};
use crate::trace::{StepDraft, StepKind, TraceRecorder};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Which node types a cycle passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleClass {
    ResourceOnly,
    ProcessOnly,
    Mixed,
}

/// A process in a cycle asking for more units of an in-cycle resource than are free
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfeasibleRequest {
    pub process: ProcessId,
    pub resource: ResourceId,
    pub requested: u32,
    pub available: i64,
}

/// A simple cycle with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleCycle {
    nodes: Vec<NodeId>,
    class: CycleClass,
    infeasible_requests: Vec<InfeasibleRequest>,
}

impl SimpleCycle {
    /// Nodes in traversal order; the closing edge runs from the last back to the first
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn class(&self) -> CycleClass {
        self.class
    }

    pub fn is_mixed(&self) -> bool {
        self.class == CycleClass::Mixed
    }

    /// Mixed cycle where some in-cycle request exceeds availability
    pub fn is_infeasible(&self) -> bool {
        self.is_mixed() && !self.infeasible_requests.is_empty()
    }

    pub fn infeasible_requests(&self) -> &[InfeasibleRequest] {
        &self.infeasible_requests
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.nodes.iter().filter_map(NodeId::as_resource)
    }

    pub fn processes(&self) -> impl Iterator<Item = &ProcessId> {
        self.nodes.iter().filter_map(NodeId::as_process)
    }

    /// Consecutive edges including the closing one
    pub fn edges(&self) -> Vec<EdgeRef> {
        let n = self.nodes.len();
        (0..n).map(|i| EdgeRef::new(self.nodes[i].clone(), self.nodes[(i + 1) % n].clone())).collect()
    }

    /// `A -> B -> C` rendering of the node sequence
    pub fn describe(&self) -> String {
        describe_nodes(&self.nodes)
    }
}

/// Join node names with arrows
pub fn describe_nodes(nodes: &[NodeId]) -> String {
    nodes.iter().map(NodeId::as_str).collect::<Vec<_>>().join(" -> ")
}

/// Every simple cycle of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    cycles: Vec<SimpleCycle>,
    truncated: bool,
}

impl CycleReport {
    pub fn cycles(&self) -> &[SimpleCycle] {
        &self.cycles
    }

    /// True when enumeration stopped at the configured cycle limit
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn mixed(&self) -> impl Iterator<Item = &SimpleCycle> {
        self.cycles.iter().filter(|cycle| cycle.is_mixed())
    }

    /// First mixed cycle flagged infeasible-request, in enumeration order
    pub fn first_infeasible(&self) -> Option<&SimpleCycle> {
        self.cycles.iter().find(|cycle| cycle.is_infeasible())
    }

    /// Append a step summarising the cycles found
    pub fn record(&self, recorder: &mut TraceRecorder<'_>, availability: &Availability) -> AnalysisResult<()> {
        let draft = if self.cycles.is_empty() {
            StepDraft::new(StepKind::NoCycles, "No cycles in the resource-allocation graph")
        } else {
            let infeasible = self.cycles.iter().filter(|cycle| cycle.is_infeasible()).count();
            let mut caption = format!("Found {} cycle(s), {} with requests exceeding available units", self.cycles.len(), infeasible);
            if self.truncated {
                caption.push_str(" (enumeration truncated)");
            }
            StepDraft::new(
                StepKind::CyclesFound {
                    cycles: self.cycles.iter().map(|cycle| cycle.nodes.clone()).collect(),
                    infeasible,
                    truncated: self.truncated,
                },
                caption,
            )
            .highlight_nodes(self.cycles.iter().flat_map(|cycle| cycle.nodes.iter().cloned()))
            .highlight_edges(self.cycles.iter().flat_map(SimpleCycle::edges))
        };
        recorder.record(draft.availability(availability))?;
        Ok(())
    }
}

/// Enumerate and classify the simple cycles of `graph`, honoring the
/// configured cycle limit
pub fn find_cycles(graph: &ResourceGraph, config: &AnalysisConfig) -> CycleReport {
    CycleAnalyzer::new(graph, config).analyze()
}

/// Finds and classifies simple cycles
pub struct CycleAnalyzer<'g> {
    graph: &'g ResourceGraph,
    max_cycles: Option<usize>,
}

impl<'g> CycleAnalyzer<'g> {
    pub fn new(graph: &'g ResourceGraph, config: &AnalysisConfig) -> Self {
        Self {
            graph,
            max_cycles: config.max_cycles,
        }
    }

    /// Enumerate and classify every simple cycle
    #[instrument(skip(self), fields(nodes = self.graph.node_count()))]
    pub fn analyze(&self) -> CycleReport {
        let adjacency = self.graph.adjacency();
        let (raw, truncated) = simple_cycles(&adjacency, self.max_cycles);
        let available = self.graph.initial_available();

        let cycles: Vec<SimpleCycle> = raw
            .into_iter()
            .map(|positions| {
                let nodes = positions.into_iter().map(|pos| self.graph.node_at(pos).clone()).collect();
                self.classify(nodes, &available)
            })
            .collect();

        debug!(
            cycles = cycles.len(),
            infeasible = cycles.iter().filter(|cycle| cycle.is_infeasible()).count(),
            truncated,
            "Cycle analysis finished"
        );
        CycleReport { cycles, truncated }
    }

    fn classify(&self, nodes: Vec<NodeId>, available: &Availability) -> SimpleCycle {
        let has_resource = nodes.iter().any(|node| node.kind() == NodeKind::Resource);
        let has_process = nodes.iter().any(|node| node.kind() == NodeKind::Process);
        let class = match (has_resource, has_process) {
            (true, true) => CycleClass::Mixed,
            (true, false) => CycleClass::ResourceOnly,
            _ => CycleClass::ProcessOnly,
        };

        let mut infeasible_requests = Vec::new();
        if class == CycleClass::Mixed {
            for process in nodes.iter().filter_map(NodeId::as_process) {
                for (resource, &requested) in self.graph.requested_by(process) {
                    if !nodes.contains(&NodeId::Resource(resource.clone())) {
                        continue;
                    }
                    let free = available.get(resource).copied().unwrap_or(0);
                    if i64::from(requested) > free {
                        infeasible_requests.push(InfeasibleRequest {
                            process: process.clone(),
                            resource: resource.clone(),
                            requested,
                            available: free,
                        });
                    }
                }
            }
        }

        SimpleCycle {
            nodes,
            class,
            infeasible_requests,
        }
    }
}

/// Johnson's simple-cycle enumeration over node positions.
///
/// Components are processed lowest start node first, and each cycle begins at
/// the lowest node of the component it was found in, so the output order only
/// depends on node positions. Returns the cycles and whether `limit` cut the
/// enumeration short.
pub(crate) fn simple_cycles(adjacency: &[Vec<usize>], limit: Option<usize>) -> (Vec<Vec<usize>>, bool) {
    let all: Vec<usize> = (0..adjacency.len()).collect();
    let mut pending = cyclic_components(adjacency, &all);
    let mut search = CircuitSearch::new(adjacency, limit);

    while let Some(position) = pending.iter().enumerate().min_by_key(|(_, component)| component[0]).map(|(i, _)| i) {
        let component = pending.swap_remove(position);
        search.run(&component);
        if search.exhausted() {
            return (search.found, true);
        }
        pending.extend(cyclic_components(adjacency, &component[1..]));
    }

    (search.found, false)
}

/// Strongly connected components of the subgraph induced by `members` that can
/// hold a cycle, each sorted ascending
fn cyclic_components(adjacency: &[Vec<usize>], members: &[usize]) -> Vec<Vec<usize>> {
    let mut subgraph = DiGraph::<usize, ()>::with_capacity(members.len(), 0);
    let local: HashMap<usize, _> = members.iter().map(|&node| (node, subgraph.add_node(node))).collect();

    for &node in members {
        for successor in &adjacency[node] {
            if let Some(&to) = local.get(successor) {
                subgraph.add_edge(local[&node], to, ());
            }
        }
    }

    tarjan_scc(&subgraph)
        .into_iter()
        .map(|component| {
            let mut nodes: Vec<usize> = component.into_iter().map(|idx| subgraph[idx]).collect();
            nodes.sort_unstable();
            nodes
        })
        .filter(|nodes| nodes.len() > 1 || adjacency[nodes[0]].contains(&nodes[0]))
        .collect()
}

/// Blocking state of Johnson's circuit search
struct CircuitSearch<'a> {
    adjacency: &'a [Vec<usize>],
    limit: Option<usize>,
    in_component: Vec<bool>,
    blocked: Vec<bool>,
    blocked_by: Vec<Vec<usize>>,
    path: Vec<usize>,
    start: usize,
    found: Vec<Vec<usize>>,
}

impl<'a> CircuitSearch<'a> {
    fn new(adjacency: &'a [Vec<usize>], limit: Option<usize>) -> Self {
        let n = adjacency.len();
        Self {
            adjacency,
            limit,
            in_component: vec![false; n],
            blocked: vec![false; n],
            blocked_by: vec![Vec::new(); n],
            path: Vec::new(),
            start: 0,
            found: Vec::new(),
        }
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.found.len() >= limit)
    }

    /// Find every cycle through the lowest node of `component`
    fn run(&mut self, component: &[usize]) {
        self.in_component.iter_mut().for_each(|flag| *flag = false);
        for &node in component {
            self.in_component[node] = true;
            self.blocked[node] = false;
            self.blocked_by[node].clear();
        }
        self.start = component[0];
        self.circuit(self.start);
    }

    fn circuit(&mut self, node: usize) -> bool {
        let adjacency = self.adjacency;
        let mut closed = false;
        self.path.push(node);
        self.blocked[node] = true;

        for &next in &adjacency[node] {
            if self.exhausted() {
                break;
            }
            if !self.in_component[next] {
                continue;
            }
            if next == self.start {
                self.found.push(self.path.clone());
                closed = true;
            } else if !self.blocked[next] && self.circuit(next) {
                closed = true;
            }
        }

        if closed {
            self.unblock(node);
        } else {
            for &next in &adjacency[node] {
                if self.in_component[next] && !self.blocked_by[next].contains(&node) {
                    self.blocked_by[next].push(node);
                }
            }
        }

        self.path.pop();
        closed
    }

    fn unblock(&mut self, node: usize) {
        self.blocked[node] = false;
        for waiting in std::mem::take(&mut self.blocked_by[node]) {
            if self.blocked[waiting] {
                self.unblock(waiting);
            }
        }
    }
}

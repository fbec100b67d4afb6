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

//! Resource-allocation graph
//!
//! Directed multigraph over resources and processes. Every allocation entry
//! becomes one resource -> process edge and every request entry one
//! process -> resource edge, so parallel edges carry unit multiplicity.
//! The graph is immutable once built; analyses work on their own copies of
//! the per-process tables.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{Availability, EdgeKind, EdgeRef, NodeId, ProcessId, ResourceId, Snapshot, UnitCounts};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

static NO_UNITS: UnitCounts = BTreeMap::new();

/// A resource whose allocations exceed its declared capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityWarning {
    pub resource: ResourceId,
    pub total_units: u32,
    pub allocated_units: u32,
}

impl CapacityWarning {
    /// Units allocated beyond the declared total
    pub fn excess(&self) -> u32 {
        self.allocated_units.saturating_sub(self.total_units)
    }
}

/// Resource-allocation graph built from a [`Snapshot`]
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    graph: DiGraph<NodeId, EdgeKind>,
    indices: HashMap<NodeId, NodeIndex>,
    resources: Vec<ResourceId>,
    processes: Vec<ProcessId>,
    totals: UnitCounts,
    allocated: UnitCounts,
    held: BTreeMap<ProcessId, UnitCounts>,
    requested: BTreeMap<ProcessId, UnitCounts>,
}

impl ResourceGraph {
    /// Build the graph, validating that every edge names a declared node
    pub fn build(snapshot: &Snapshot) -> AnalysisResult<Self> {
        Self::build_with(snapshot, &AnalysisConfig::default())
    }

    /// Build the graph, additionally enforcing the configured size limit
    pub fn build_with(snapshot: &Snapshot, config: &AnalysisConfig) -> AnalysisResult<Self> {
        let nodes = snapshot.resources.len() + snapshot.processes.len();
        if let Some(limit) = config.max_nodes.filter(|&limit| nodes > limit) {
            return Err(AnalysisError::InputTooLarge { nodes, limit });
        }

        let mut builder = GraphBuilder::default();

        for (resource, &units) in &snapshot.resources {
            builder.add_resource(resource, units);
        }

        let mut seen = HashSet::new();
        for process in &snapshot.processes {
            if snapshot.resources.contains_key(process.as_str()) {
                return Err(AnalysisError::AmbiguousIdentifier(process.to_string()));
            }
            if !seen.insert(process) {
                return Err(AnalysisError::DuplicateProcess(process.clone()));
            }
            builder.add_process(process);
        }

        for (resource, holders) in &snapshot.allocations {
            for process in holders {
                builder.add_edge(resource, process, EdgeKind::Allocation)?;
            }
            if holders.is_empty() {
                builder.require_resource(resource, || format!("allocation list of {resource}"))?;
            }
        }

        for (process, wanted) in &snapshot.requests {
            for resource in wanted {
                builder.add_edge(resource, process, EdgeKind::Request)?;
            }
            if wanted.is_empty() {
                builder.require_process(process, || format!("request list of {process}"))?;
            }
        }

        let graph = builder.finish();
        for warning in graph.capacity_warnings() {
            warn!(
                resource = %warning.resource,
                total_units = warning.total_units,
                allocated_units = warning.allocated_units,
                "Allocated units exceed declared capacity"
            );
        }
        debug!(
            resources = graph.resources.len(),
            processes = graph.processes.len(),
            edges = graph.edge_count(),
            "Built resource-allocation graph"
        );
        Ok(graph)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Processes in declaration order
    pub fn processes(&self) -> &[ProcessId] {
        &self.processes
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges counting multiplicity
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, node: &NodeId) -> bool {
        self.indices.contains_key(node)
    }

    pub fn contains_edge(&self, edge: &EdgeRef) -> bool {
        self.edge_multiplicity(edge) > 0
    }

    /// Number of parallel edges between the two endpoints
    pub fn edge_multiplicity(&self, edge: &EdgeRef) -> usize {
        match (self.indices.get(&edge.from), self.indices.get(&edge.to)) {
            (Some(&from), Some(&to)) => self.graph.edges_connecting(from, to).count(),
            _ => 0,
        }
    }

    /// Declared capacity of a resource, zero if unknown
    pub fn total_units(&self, resource: &ResourceId) -> u32 {
        self.totals.get(resource).copied().unwrap_or(0)
    }

    /// Units of a resource held across all processes
    pub fn allocated_units(&self, resource: &ResourceId) -> u32 {
        self.allocated.get(resource).copied().unwrap_or(0)
    }

    /// Units held by a process, per resource
    pub fn held_by(&self, process: &ProcessId) -> &UnitCounts {
        self.held.get(process).unwrap_or(&NO_UNITS)
    }

    /// Units requested by a process, per resource
    pub fn requested_by(&self, process: &ProcessId) -> &UnitCounts {
        self.requested.get(process).unwrap_or(&NO_UNITS)
    }

    /// Processes holding at least one unit of a resource, in declaration order
    pub fn holders_of<'a>(&'a self, resource: &'a ResourceId) -> impl Iterator<Item = &'a ProcessId> + 'a {
        self.processes.iter().filter(move |process| self.held_by(process).contains_key(resource))
    }

    /// `total - allocated` for every resource, possibly negative
    pub fn initial_available(&self) -> Availability {
        self.resources
            .iter()
            .map(|resource| {
                let available = i64::from(self.total_units(resource)) - i64::from(self.allocated_units(resource));
                (resource.clone(), available)
            })
            .collect()
    }

    /// Resources allocated beyond their declared capacity
    pub fn capacity_warnings(&self) -> Vec<CapacityWarning> {
        self.resources
            .iter()
            .filter(|resource| self.allocated_units(resource) > self.total_units(resource))
            .map(|resource| CapacityWarning {
                resource: resource.clone(),
                total_units: self.total_units(resource),
                allocated_units: self.allocated_units(resource),
            })
            .collect()
    }

    /// Distinct successors of every node, by node position.
    ///
    /// Parallel edges collapse to one entry; each list is sorted so that cycle
    /// enumeration does not depend on edge insertion order.
    pub(crate) fn adjacency(&self) -> Vec<Vec<usize>> {
        self.graph
            .node_indices()
            .map(|idx| {
                let mut successors: Vec<usize> = self.graph.neighbors_directed(idx, Direction::Outgoing).map(|n| n.index()).collect();
                successors.sort_unstable();
                successors.dedup();
                successors
            })
            .collect()
    }

    /// Node at a position reported by [`Self::adjacency`]
    pub(crate) fn node_at(&self, position: usize) -> &NodeId {
        &self.graph[NodeIndex::new(position)]
    }

    /// Rebuild the snapshot this graph represents.
    ///
    /// Edge lists come back in insertion order, so rebuilding from the result
    /// yields the same edges with the same multiplicities.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            resources: self.totals.clone(),
            processes: self.processes.clone(),
            ..Snapshot::default()
        };

        for edge in self.graph.edge_references() {
            match (&self.graph[edge.source()], &self.graph[edge.target()]) {
                (NodeId::Resource(resource), NodeId::Process(process)) => {
                    snapshot.allocations.entry(resource.clone()).or_default().push(process.clone());
                }
                (NodeId::Process(process), NodeId::Resource(resource)) => {
                    snapshot.requests.entry(process.clone()).or_default().push(resource.clone());
                }
                _ => {}
            }
        }

        snapshot
    }
}

/// Accumulates nodes and edges while checking references
#[derive(Default)]
struct GraphBuilder {
    graph: DiGraph<NodeId, EdgeKind>,
    indices: HashMap<NodeId, NodeIndex>,
    resources: Vec<ResourceId>,
    processes: Vec<ProcessId>,
    totals: UnitCounts,
    allocated: UnitCounts,
    held: BTreeMap<ProcessId, UnitCounts>,
    requested: BTreeMap<ProcessId, UnitCounts>,
}

impl GraphBuilder {
    fn add_resource(&mut self, resource: &ResourceId, units: u32) {
        let node = NodeId::Resource(resource.clone());
        let idx = self.graph.add_node(node.clone());
        self.indices.insert(node, idx);
        self.resources.push(resource.clone());
        self.totals.insert(resource.clone(), units);
    }

    fn add_process(&mut self, process: &ProcessId) {
        let node = NodeId::Process(process.clone());
        let idx = self.graph.add_node(node.clone());
        self.indices.insert(node, idx);
        self.processes.push(process.clone());
    }

    fn require_resource(&self, resource: &ResourceId, referenced_by: impl FnOnce() -> String) -> AnalysisResult<NodeIndex> {
        self.indices.get(&NodeId::Resource(resource.clone())).copied().ok_or_else(|| AnalysisError::UnknownResource {
            resource: resource.clone(),
            referenced_by: referenced_by(),
        })
    }

    fn require_process(&self, process: &ProcessId, referenced_by: impl FnOnce() -> String) -> AnalysisResult<NodeIndex> {
        self.indices.get(&NodeId::Process(process.clone())).copied().ok_or_else(|| AnalysisError::UnknownProcess {
            process: process.clone(),
            referenced_by: referenced_by(),
        })
    }

    /// Add one unit edge between a resource and a process in the direction given by `kind`
    fn add_edge(&mut self, resource: &ResourceId, process: &ProcessId, kind: EdgeKind) -> AnalysisResult<()> {
        let describe = || match kind {
            EdgeKind::Allocation => format!("allocation {resource}:{process}"),
            EdgeKind::Request => format!("request {process}:{resource}"),
        };
        let r = self.require_resource(resource, describe)?;
        let p = self.require_process(process, describe)?;

        match kind {
            EdgeKind::Allocation => {
                self.graph.add_edge(r, p, kind);
                *self.allocated.entry(resource.clone()).or_insert(0) += 1;
                *self.held.entry(process.clone()).or_default().entry(resource.clone()).or_insert(0) += 1;
            }
            EdgeKind::Request => {
                self.graph.add_edge(p, r, kind);
                *self.requested.entry(process.clone()).or_default().entry(resource.clone()).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn finish(self) -> ResourceGraph {
        ResourceGraph {
            graph: self.graph,
            indices: self.indices,
            resources: self.resources,
            processes: self.processes,
            totals: self.totals,
            allocated: self.allocated,
            held: self.held,
            requested: self.requested,
        }
    }
}

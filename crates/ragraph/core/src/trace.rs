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

//! Analysis trace
//!
//! Every decision taken during an analysis call is appended as a [`Step`] to
//! a [`TraceRecorder`] owned by the caller. Steps are validated against the
//! graph when appended and cannot be changed afterwards. The finished
//! [`Trace`] is plain data for an external renderer.

use crate::error::{AnalysisError, AnalysisResult};
use crate::graph::{CapacityWarning, ResourceGraph};
use crate::model::{Availability, EdgeRef, NodeId, ProcessId, UnitCounts};
use serde::Serialize;

/// What a step records, with a payload shape fixed per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Initial state of the snapshot
    Snapshot {
        resources: usize,
        processes: usize,
        warnings: Vec<CapacityWarning>,
    },
    /// Simple cycles found in the graph
    CyclesFound { cycles: Vec<Vec<NodeId>>, infeasible: usize, truncated: bool },
    /// The graph is acyclic
    NoCycles,
    /// A process could be satisfied and released its units
    ProcessCompleted { process: ProcessId, released: UnitCounts },
    /// No pending process could be satisfied
    Stalled { blocked: Vec<ProcessId> },
    /// Final verdict
    Verdict { deadlocked: bool, cycle: Vec<NodeId> },
}

/// One recorded decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    index: usize,
    round: Option<u32>,
    caption: String,
    #[serde(flatten)]
    kind: StepKind,
    highlighted_nodes: Vec<NodeId>,
    highlighted_edges: Vec<EdgeRef>,
    availability: Availability,
}

impl Step {
    /// Position in the trace, starting at zero
    pub fn index(&self) -> usize {
        self.index
    }

    /// Simulation round, for steps taken inside the feasibility simulation
    pub fn round(&self) -> Option<u32> {
        self.round
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn highlighted_nodes(&self) -> &[NodeId] {
        &self.highlighted_nodes
    }

    pub fn highlighted_edges(&self) -> &[EdgeRef] {
        &self.highlighted_edges
    }

    /// Available units per resource after this step
    pub fn availability(&self) -> &Availability {
        &self.availability
    }
}

/// A step before it has been validated and numbered
#[derive(Debug, Clone)]
pub struct StepDraft {
    round: Option<u32>,
    caption: String,
    kind: StepKind,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeRef>,
    availability: Availability,
}

impl StepDraft {
    pub fn new(kind: StepKind, caption: impl Into<String>) -> Self {
        Self {
            round: None,
            caption: caption.into(),
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            availability: Availability::new(),
        }
    }

    pub fn round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn highlight_node(mut self, node: NodeId) -> Self {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
        self
    }

    pub fn highlight_nodes(self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        nodes.into_iter().fold(self, Self::highlight_node)
    }

    pub fn highlight_edge(mut self, edge: EdgeRef) -> Self {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        self
    }

    pub fn highlight_edges(self, edges: impl IntoIterator<Item = EdgeRef>) -> Self {
        edges.into_iter().fold(self, Self::highlight_edge)
    }

    pub fn availability(mut self, availability: &Availability) -> Self {
        self.availability = availability.clone();
        self
    }
}

/// Append-only step log bound to one graph
#[derive(Debug)]
pub struct TraceRecorder<'g> {
    graph: &'g ResourceGraph,
    steps: Vec<Step>,
}

impl<'g> TraceRecorder<'g> {
    pub fn new(graph: &'g ResourceGraph) -> Self {
        Self { graph, steps: Vec::new() }
    }

    /// Validate and append a step
    pub fn record(&mut self, draft: StepDraft) -> AnalysisResult<&Step> {
        if let Some(node) = draft.nodes.iter().find(|node| !self.graph.contains_node(node)) {
            return Err(AnalysisError::InvalidTraceReference(format!("node {node}")));
        }
        if let Some(edge) = draft.edges.iter().find(|edge| !self.graph.contains_edge(edge)) {
            return Err(AnalysisError::InvalidTraceReference(format!("edge {edge}")));
        }
        if let Some(resource) = draft.availability.keys().find(|resource| !self.graph.contains_node(&NodeId::Resource((*resource).clone()))) {
            return Err(AnalysisError::InvalidTraceReference(format!("resource {resource}")));
        }

        let index = self.steps.len();
        self.steps.push(Step {
            index,
            round: draft.round,
            caption: draft.caption,
            kind: draft.kind,
            highlighted_nodes: draft.nodes,
            highlighted_edges: draft.edges,
            availability: draft.availability,
        });
        Ok(&self.steps[index])
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn finish(self) -> Trace {
        Trace { steps: self.steps }
    }
}

/// Ordered, immutable list of steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    steps: Vec<Step>,
}

impl Trace {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Steps taken inside simulation rounds, in round order
    pub fn rounds(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| step.round.is_some())
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;

    fn graph() -> ResourceGraph {
        ResourceGraph::build(&Snapshot::new().resource("R1", 1).process("P1").allocate("R1", "P1")).unwrap()
    }

    #[test]
    fn test_steps_are_numbered_in_order() {
        let graph = graph();
        let mut recorder = TraceRecorder::new(&graph);

        recorder.record(StepDraft::new(StepKind::NoCycles, "no cycles")).unwrap();
        let step = recorder
            .record(
                StepDraft::new(
                    StepKind::ProcessCompleted {
                        process: "P1".into(),
                        released: UnitCounts::from([("R1".into(), 1)]),
                    },
                    "P1 completes",
                )
                .round(1)
                .highlight_node(NodeId::process("P1"))
                .highlight_node(NodeId::process("P1"))
                .highlight_edge(EdgeRef::allocation(&"R1".into(), &"P1".into())),
            )
            .unwrap();
        assert_eq!(step.index(), 1);
        assert_eq!(step.highlighted_nodes().len(), 1);

        let trace = recorder.finish();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.rounds().count(), 1);
        assert_eq!(trace.steps()[0].caption(), "no cycles");
    }

    #[test]
    fn test_unknown_references_are_rejected() {
        let graph = graph();
        let mut recorder = TraceRecorder::new(&graph);

        let bad_node = StepDraft::new(StepKind::NoCycles, "x").highlight_node(NodeId::process("P9"));
        assert!(matches!(recorder.record(bad_node), Err(AnalysisError::InvalidTraceReference(_))));

        let bad_edge = StepDraft::new(StepKind::NoCycles, "x").highlight_edge(EdgeRef::request(&"P1".into(), &"R1".into()));
        assert!(matches!(recorder.record(bad_edge), Err(AnalysisError::InvalidTraceReference(_))));

        let bad_availability = StepDraft::new(StepKind::NoCycles, "x").availability(&Availability::from([("R2".into(), 0)]));
        assert!(matches!(recorder.record(bad_availability), Err(AnalysisError::InvalidTraceReference(_))));

        assert!(recorder.is_empty());
    }

    #[test]
    fn test_step_serialization_flattens_kind() {
        let graph = graph();
        let mut recorder = TraceRecorder::new(&graph);
        recorder.record(StepDraft::new(StepKind::Stalled { blocked: vec!["P1".into()] }, "stalled")).unwrap();

        let json = serde_json::to_value(recorder.finish()).unwrap();
        assert_eq!(json[0]["kind"], "stalled");
        assert_eq!(json[0]["blocked"][0], "P1");
        assert_eq!(json[0]["round"], serde_json::Value::Null);
    }
}

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

//! End-to-end analysis scenarios

use ragraph_core::{AnalysisConfig, AnalysisError, BlockCause, CycleReason, NodeId, ProcessId, ResourceGraph, Snapshot, StepKind, analyze};

fn classic() -> Snapshot {
    Snapshot::new()
        .resource("R1", 1)
        .resource("R2", 1)
        .process("P1")
        .process("P2")
        .allocate("R1", "P1")
        .allocate("R2", "P2")
        .request("P1", "R2")
        .request("P2", "R1")
}

fn names(nodes: &[NodeId]) -> Vec<&str> {
    nodes.iter().map(NodeId::as_str).collect()
}

fn is_rotation(actual: &[&str], expected: &[&str]) -> bool {
    actual.len() == expected.len() && (0..actual.len()).any(|shift| (0..actual.len()).all(|i| actual[(i + shift) % actual.len()] == expected[i]))
}

#[test]
fn test_classic_circular_wait() {
    let verdict = analyze(&classic(), &AnalysisConfig::default()).unwrap();

    assert!(verdict.deadlocked);
    assert_eq!(verdict.cycles.len(), 1);
    assert!(verdict.cycles[0].is_mixed());
    assert!(is_rotation(&names(&verdict.representative_cycle), &["P1", "R2", "P2", "R1"]));
    assert_eq!(verdict.cycle_reason, Some(CycleReason::InfeasibleRequest));

    let blocked: Vec<&str> = verdict.blocked_processes().into_iter().map(ProcessId::as_str).collect();
    assert_eq!(blocked, vec!["P1", "P2"]);
    assert!(verdict.completed_order.is_empty());
    assert!(verdict.blocked.iter().all(|b| matches!(b.cause, BlockCause::CircularWait { .. })));
    assert!(verdict.cycle_text().contains(" -> "));
}

#[test]
fn test_spare_unit_avoids_deadlock() {
    let snapshot = Snapshot::new().resource("R1", 2).process("P1").process("P2").allocate("R1", "P1").request("P2", "R1");
    let verdict = analyze(&snapshot, &AnalysisConfig::default()).unwrap();

    assert!(!verdict.deadlocked);
    assert!(verdict.representative_cycle.is_empty());
    assert_eq!(verdict.completed_order, vec![ProcessId::new("P1"), ProcessId::new("P2")]);
    assert!(verdict.diagnostics.is_empty());
}

#[test]
fn test_request_beyond_capacity_without_cycle() {
    let snapshot = Snapshot::new().resource("R1", 1).process("P1").process("P2").request("P1", "R1").request("P1", "R1");
    let verdict = analyze(&snapshot, &AnalysisConfig::default()).unwrap();

    assert!(verdict.deadlocked);
    assert!(verdict.representative_cycle.is_empty());
    assert_eq!(verdict.cycle_reason, Some(CycleReason::ResourceScarcityWithoutCycle));
    assert_eq!(verdict.completed_order, vec![ProcessId::new("P2")]);
    assert_eq!(verdict.blocked.len(), 1);
    assert_eq!(verdict.blocked[0].process.as_str(), "P1");
    match &verdict.blocked[0].cause {
        BlockCause::ExceedsCapacity { shortfalls } => {
            assert_eq!(shortfalls[0].requested, 2);
            assert_eq!(shortfalls[0].total_units, 1);
        }
        other => panic!("unexpected cause {other:?}"),
    }
}

#[test]
fn test_resolution_is_idempotent() {
    let snapshot = classic();
    let first = analyze(&snapshot, &AnalysisConfig::default()).unwrap();
    let second = analyze(&snapshot, &AnalysisConfig::default()).unwrap();

    assert_eq!(first.deadlocked, second.deadlocked);
    assert_eq!(first.representative_cycle, second.representative_cycle);
    assert_eq!(first.blocked, second.blocked);
    assert_eq!(first, second);
}

#[test]
fn test_over_allocation_is_a_warning() {
    let snapshot = Snapshot::new().resource("R1", 1).process("P1").process("P2").allocate("R1", "P1").allocate("R1", "P2");
    let verdict = analyze(&snapshot, &AnalysisConfig::default()).unwrap();

    assert!(!verdict.deadlocked);
    assert_eq!(verdict.warnings.len(), 1);
    assert_eq!(verdict.warnings[0].resource.as_str(), "R1");
    match verdict.trace.steps()[0].kind() {
        StepKind::Snapshot { warnings, .. } => assert_eq!(warnings.len(), 1),
        other => panic!("unexpected first step {other:?}"),
    }
    assert_eq!(verdict.trace.steps()[0].availability().get("R1"), Some(&-1));
}

#[test]
fn test_snapshot_round_trips() {
    let snapshot = classic().request("P1", "R2").allocate("R1", "P1");

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);

    let graph = ResourceGraph::build(&snapshot).unwrap();
    let rebuilt = ResourceGraph::build(&graph.to_snapshot()).unwrap();
    assert_eq!(rebuilt.edge_count(), graph.edge_count());
    assert_eq!(rebuilt.to_snapshot(), snapshot);
}

#[test]
fn test_reads_log_style_json() {
    let json = r#"{
        "recursos": {"R1": 1, "R2": 1},
        "processos": ["P1", "P2"],
        "alocacoes": {"R1": ["P1"], "R2": ["P2"]},
        "requisicoes": {"P1": ["R2"], "P2": ["R1"]}
    }"#;
    let snapshot: Snapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot, classic());
}

#[test]
fn test_invalid_references_fail_fast() {
    let snapshot = classic().request("P2", "R3");
    let err = analyze(&snapshot, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownResource { .. }));
    assert!(err.to_string().contains("R3"));
}

#[test]
fn test_trace_serializes_for_renderer() {
    let verdict = analyze(&classic(), &AnalysisConfig::default()).unwrap();
    let json = serde_json::to_value(&verdict).unwrap();

    assert_eq!(json["deadlocked"], true);
    let steps = json["trace"].as_array().unwrap();
    assert_eq!(steps.first().unwrap()["kind"], "snapshot");
    assert_eq!(steps[1]["kind"], "cycles_found");
    assert_eq!(steps.last().unwrap()["kind"], "verdict");
    assert_eq!(steps.last().unwrap()["highlighted_edges"].as_array().unwrap().len(), 4);
}

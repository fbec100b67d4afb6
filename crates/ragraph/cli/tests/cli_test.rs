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

//! Binary-level tests for the ragraph CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const CLASSIC: &str = r#"{
    "recursos": {"R1": 1, "R2": 1},
    "processos": ["P1", "P2"],
    "alocacoes": {"R1": ["P1"], "R2": ["P2"]},
    "requisicoes": {"P1": ["R2"], "P2": ["R1"]}
}"#;

fn ragraph(results: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ragraph").unwrap();
    cmd.env_remove("RAGRAPH_CONFIG").env_remove("RUST_LOG").arg("--results").arg(results);
    cmd
}

#[test]
fn test_analyze_reports_deadlock_and_saves() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("snapshot.json");
    let results = dir.path().join("resultados.json");
    std::fs::write(&input, CLASSIC).unwrap();

    ragraph(&results)
        .args(["analyze", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("DEADLOCK detected!"))
        .stdout(predicate::str::contains("Result saved with ID #1"))
        .stdout(predicate::str::contains("detectado").not())
        .stdout(predicate::str::contains("Ciclo envolvido").not());

    ragraph(&results)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#1 ").and(predicate::str::contains("DEADLOCK")));
}

#[test]
fn test_line_files_without_deadlock() {
    let dir = tempdir().unwrap();
    let resources = dir.path().join("resources.txt");
    let processes = dir.path().join("processes.txt");
    let allocations = dir.path().join("allocations.txt");
    let requests = dir.path().join("requests.txt");
    std::fs::write(&resources, "R1:2\n").unwrap();
    std::fs::write(&processes, "P1\nP2\n").unwrap();
    std::fs::write(&allocations, "R1:P1\n").unwrap();
    std::fs::write(&requests, "P2:R1\n").unwrap();

    ragraph(&dir.path().join("resultados.json"))
        .args(["analyze", "--no-save", "--resources"])
        .arg(&resources)
        .arg("--processes")
        .arg(&processes)
        .arg("--allocations")
        .arg(&allocations)
        .arg("--requests")
        .arg(&requests)
        .assert()
        .success()
        .stdout(predicate::str::contains("No deadlock detected."))
        .stdout(predicate::str::contains("Completion order: P1, P2"));
}

#[test]
fn test_json_output_is_parseable() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("snapshot.json");
    std::fs::write(&input, CLASSIC).unwrap();

    let output = ragraph(&dir.path().join("resultados.json"))
        .args(["analyze", "--format", "json", "--trace", "--no-save", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"]["deadlocked"], true);
    assert!(json["verdict"]["trace"].as_array().unwrap().len() >= 3);
}

#[test]
fn test_invalid_line_fails() {
    let dir = tempdir().unwrap();
    let resources = dir.path().join("resources.txt");
    std::fs::write(&resources, "R1=2\n").unwrap();

    ragraph(&dir.path().join("resultados.json"))
        .args(["analyze", "--resources"])
        .arg(&resources)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid resource format on line 1"));
}

#[test]
fn test_unknown_reference_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("snapshot.json");
    std::fs::write(&input, r#"{"recursos": {"R1": 1}, "processos": ["P1"], "requisicoes": {"P1": ["R9"]}}"#).unwrap();

    ragraph(&dir.path().join("resultados.json"))
        .args(["analyze", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource R9"));
}

#[test]
fn test_show_missing_run_fails() {
    let dir = tempdir().unwrap();
    ragraph(&dir.path().join("resultados.json"))
        .args(["show", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No run with id 4"));
}

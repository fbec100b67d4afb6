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

//! Persistence payload for one analysis run

use crate::model::{NodeId, Snapshot};
use crate::resolver::Verdict;
use serde::{Deserialize, Serialize};

/// What gets written to the results log for one run.
///
/// Field names follow the log's existing JSON layout; the snapshot sections
/// are inlined next to the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(rename = "deadlock_detectado")]
    pub deadlock_detected: bool,
    /// Representative cycle node names, empty without a deadlock
    #[serde(rename = "ciclo", default)]
    pub cycle: Vec<String>,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl RunRecord {
    pub fn from_verdict(snapshot: &Snapshot, verdict: &Verdict) -> Self {
        let cycle = if verdict.deadlocked {
            verdict.representative_cycle.iter().map(NodeId::as_str).map(str::to_string).collect()
        } else {
            Vec::new()
        };
        Self {
            deadlock_detected: verdict.deadlocked,
            cycle,
            snapshot: snapshot.clone(),
        }
    }

    /// `A -> B -> C`, or an empty string when there is no cycle
    pub fn cycle_text(&self) -> String {
        self.cycle.join(" -> ")
    }
}

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

//! Analysis limits

use serde::{Deserialize, Serialize};

/// Bounds an embedding service may place on a single analysis call.
///
/// Simple-cycle enumeration is exponential in graph density, so callers that
/// accept untrusted input should set at least one of these. Both are unbounded
/// by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reject snapshots with more resources + processes than this
    pub max_nodes: Option<usize>,
    /// Stop enumerating simple cycles after this many have been found
    pub max_cycles: Option<usize>,
}

impl AnalysisConfig {
    pub fn with_max_nodes(mut self, limit: usize) -> Self {
        self.max_nodes = Some(limit);
        self
    }

    pub fn with_max_cycles(mut self, limit: usize) -> Self {
        self.max_cycles = Some(limit);
        self
    }
}

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

//! Error types for the analysis core

use crate::model::{ProcessId, ResourceId};

/// Errors that abort an analysis call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Allocation or request references unknown resource {resource} (via {referenced_by})")]
    UnknownResource { resource: ResourceId, referenced_by: String },

    #[error("Allocation or request references unknown process {process} (via {referenced_by})")]
    UnknownProcess { process: ProcessId, referenced_by: String },

    #[error("Identifier {0} is declared both as a resource and as a process")]
    AmbiguousIdentifier(String),

    #[error("Process {0} is declared more than once")]
    DuplicateProcess(ProcessId),

    #[error("Input too large: {nodes} nodes exceeds the configured limit of {limit}")]
    InputTooLarge { nodes: usize, limit: usize },

    #[error("Trace step references {0}, which is not part of the graph")]
    InvalidTraceReference(String),
}

/// Result type for analysis operations
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

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

//! Line-oriented snapshot input
//!
//! Four lists with one item per line: resources as `R1:2`, processes as `P1`,
//! allocations as `R1:P1` and requests as `P1:R1`. Surrounding whitespace is
//! trimmed and blank lines are skipped.

use ragraph_core::Snapshot;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Which of the four input lists a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Resources,
    Processes,
    Allocations,
    Requests,
}

impl ListKind {
    /// A line in the expected format
    pub fn example(self) -> &'static str {
        match self {
            Self::Resources => "R1:2",
            Self::Processes => "P1",
            Self::Allocations => "R1:P1",
            Self::Requests => "P1:R1",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resources => "resource",
            Self::Processes => "process",
            Self::Allocations => "allocation",
            Self::Requests => "request",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Invalid {list} format on line {line}: \"{text}\". Use \"{}\" format.", .list.example())]
    InvalidLine { list: ListKind, line: usize, text: String },
    #[error("Resource {resource} is declared twice (line {line})")]
    DuplicateResource { resource: String, line: usize },
    #[error("Please fill in at least one field.")]
    Empty,
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Raw text of the four lists
#[derive(Debug, Clone, Default)]
pub struct LineInput {
    pub resources: String,
    pub processes: String,
    pub allocations: String,
    pub requests: String,
}

impl LineInput {
    pub fn is_blank(&self) -> bool {
        [&self.resources, &self.processes, &self.allocations, &self.requests].iter().all(|text| text.trim().is_empty())
    }
}

/// Validates and converts [`LineInput`] into a [`Snapshot`]
#[derive(Debug)]
pub struct LineParser {
    resource: Regex,
    process: Regex,
    pair: Regex,
}

impl LineParser {
    pub fn new() -> Result<Self, InputError> {
        Ok(Self {
            resource: Regex::new(r"^([A-Za-z0-9]+):(\d+)$")?,
            process: Regex::new(r"^[A-Za-z0-9]+$")?,
            pair: Regex::new(r"^([A-Za-z0-9]+):([A-Za-z0-9]+)$")?,
        })
    }

    pub fn parse(&self, input: &LineInput) -> Result<Snapshot, InputError> {
        if input.is_blank() {
            return Err(InputError::Empty);
        }

        let mut snapshot = Snapshot::new();
        let mut declared = HashSet::new();

        for (line, text) in lines(&input.resources) {
            let captures = self.resource.captures(text).ok_or_else(|| invalid(ListKind::Resources, line, text))?;
            let units: u32 = captures[2].parse().map_err(|_| invalid(ListKind::Resources, line, text))?;
            let id = &captures[1];
            if !declared.insert(id.to_string()) {
                return Err(InputError::DuplicateResource { resource: id.to_string(), line });
            }
            snapshot = snapshot.resource(id, units);
        }

        for (line, text) in lines(&input.processes) {
            if !self.process.is_match(text) {
                return Err(invalid(ListKind::Processes, line, text));
            }
            snapshot = snapshot.process(text);
        }

        for (line, text) in lines(&input.allocations) {
            let (resource, process) = self.split_pair(ListKind::Allocations, line, text)?;
            snapshot = snapshot.allocate(resource, process);
        }

        for (line, text) in lines(&input.requests) {
            let (process, resource) = self.split_pair(ListKind::Requests, line, text)?;
            snapshot = snapshot.request(process, resource);
        }

        Ok(snapshot)
    }

    fn split_pair<'t>(&self, list: ListKind, line: usize, text: &'t str) -> Result<(&'t str, &'t str), InputError> {
        let captures = self.pair.captures(text).ok_or_else(|| invalid(list, line, text))?;
        match (captures.get(1), captures.get(2)) {
            (Some(left), Some(right)) => Ok((left.as_str(), right.as_str())),
            _ => Err(invalid(list, line, text)),
        }
    }
}

/// Non-blank trimmed lines with their 1-based line numbers
fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().map(|(i, line)| (i + 1, line.trim())).filter(|(_, line)| !line.is_empty())
}

fn invalid(list: ListKind, line: usize, text: &str) -> InputError {
    InputError::InvalidLine {
        list,
        line,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(resources: &str, processes: &str, allocations: &str, requests: &str) -> LineInput {
        LineInput {
            resources: resources.to_string(),
            processes: processes.to_string(),
            allocations: allocations.to_string(),
            requests: requests.to_string(),
        }
    }

    #[test]
    fn test_parse_classic() {
        let parser = LineParser::new().unwrap();
        let snapshot = parser.parse(&input("R1:1\n  R2:1  \n", "P1\n\nP2", "R1:P1\nR2:P2", "P1:R2\nP2:R1")).unwrap();

        let expected = Snapshot::new()
            .resource("R1", 1)
            .resource("R2", 1)
            .process("P1")
            .process("P2")
            .allocate("R1", "P1")
            .allocate("R2", "P2")
            .request("P1", "R2")
            .request("P2", "R1");
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_repeated_lines_add_multiplicity() {
        let parser = LineParser::new().unwrap();
        let snapshot = parser.parse(&input("R1:3", "P1", "", "P1:R1\nP1:R1")).unwrap();
        assert_eq!(snapshot.requests["P1"].len(), 2);
    }

    #[test]
    fn test_invalid_line_reports_position_and_example() {
        let parser = LineParser::new().unwrap();
        let err = parser.parse(&input("R1:2\nR2-1", "", "", "")).unwrap_err();

        assert!(matches!(err, InputError::InvalidLine { list: ListKind::Resources, line: 2, .. }));
        assert_eq!(err.to_string(), "Invalid resource format on line 2: \"R2-1\". Use \"R1:2\" format.");
    }

    #[test]
    fn test_each_list_has_its_own_format() {
        let parser = LineParser::new().unwrap();
        let cases = [
            (input("", "P 1", "", ""), ListKind::Processes),
            (input("", "", "R1P1", ""), ListKind::Allocations),
            (input("", "", "", "P1:R1:R2"), ListKind::Requests),
            (input("R1:99999999999", "", "", ""), ListKind::Resources),
        ];
        for (case, expected) in cases {
            match parser.parse(&case) {
                Err(InputError::InvalidLine { list, .. }) => assert_eq!(list, expected),
                other => panic!("expected invalid {expected} line, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let parser = LineParser::new().unwrap();
        let err = parser.parse(&input(" \n", "", "\n\n", "")).unwrap_err();
        assert_eq!(err.to_string(), "Please fill in at least one field.");
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let parser = LineParser::new().unwrap();
        let err = parser.parse(&input("R1:1\nR1:2", "", "", "")).unwrap_err();
        assert!(matches!(err, InputError::DuplicateResource { line: 2, .. }));
    }
}

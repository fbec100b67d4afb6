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

//! Results log
//!
//! Every analysis run is appended to a JSON file shaped as
//! `{ "execucoes": [ ... ] }`. Each entry is a [`RunRecord`] plus an `id` and a
//! local `timestamp`. A missing log starts empty. A log that cannot be parsed
//! is moved aside to a `.bak` file before the first append, never overwritten.

use anyhow::{Context, Result};
use ragraph_core::RunRecord;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One logged analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedRun {
    pub id: u64,
    pub timestamp: String,
    #[serde(flatten)]
    pub record: RunRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    #[serde(rename = "execucoes", default)]
    runs: Vec<LoggedRun>,
}

/// In-memory view of the results log file
#[derive(Debug)]
pub struct ResultsLog {
    path: PathBuf,
    runs: Vec<LoggedRun>,
    /// The file exists but could not be loaded
    unreadable: bool,
}

impl ResultsLog {
    /// Load the log at `path`, starting empty if it is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No results log at {}, starting a new one", path.display());
                return Self::empty(path, false);
            }
            Err(e) => {
                warn!("Results log {} is unreadable and will be moved aside on the next save: {}", path.display(), e);
                return Self::empty(path, true);
            }
        };
        match serde_json::from_str::<LogFile>(&content) {
            Ok(file) => Self {
                path,
                runs: file.runs,
                unreadable: false,
            },
            Err(e) => {
                warn!("Results log {} is unreadable and will be moved aside on the next save: {}", path.display(), e);
                Self::empty(path, true)
            }
        }
    }

    fn empty(path: PathBuf, unreadable: bool) -> Self {
        Self {
            path,
            runs: Vec::new(),
            unreadable,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn runs(&self) -> &[LoggedRun] {
        &self.runs
    }

    pub fn get(&self, id: u64) -> Option<&LoggedRun> {
        self.runs.iter().find(|run| run.id == id)
    }

    /// Id the next appended run will receive
    pub fn next_id(&self) -> u64 {
        self.runs.iter().map(|run| run.id).max().unwrap_or(0) + 1
    }

    /// Append a run stamped with the current local time, write the log and
    /// return the new run's id
    pub fn append(&mut self, record: RunRecord) -> Result<u64> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.append_at(record, timestamp)
    }

    fn append_at(&mut self, record: RunRecord, timestamp: String) -> Result<u64> {
        if self.unreadable {
            self.move_aside()?;
        }
        let id = self.next_id();
        self.runs.push(LoggedRun { id, timestamp, record });
        self.save()?;
        info!(id, path = %self.path.display(), "Saved analysis run");
        Ok(id)
    }

    /// Rename the unreadable file to the first free `<name>.bak[.N]`
    fn move_aside(&mut self) -> Result<()> {
        let backup = self.backup_path();
        std::fs::rename(&self.path, &backup)
            .with_context(|| format!("Failed to move unreadable results log {} to {}", self.path.display(), backup.display()))?;
        warn!("Moved unreadable results log {} to {}", self.path.display(), backup.display());
        self.unreadable = false;
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let name = self.path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let mut candidate = self.path.with_file_name(format!("{name}.bak"));
        let mut n = 0;
        while candidate.exists() {
            n += 1;
            candidate = self.path.with_file_name(format!("{name}.bak.{n}"));
        }
        candidate
    }

    /// Write to a temporary file next to the log, then rename it over the log
    fn save(&self) -> Result<()> {
        let dir = match self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
                parent
            }
            None => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
        let file = LogFile { runs: self.runs.clone() };
        serde_json::to_writer_pretty(&mut staged, &file)?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .with_context(|| format!("Failed to write results log {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragraph_core::Snapshot;
    use tempfile::tempdir;

    fn record(deadlocked: bool) -> RunRecord {
        RunRecord {
            deadlock_detected: deadlocked,
            cycle: if deadlocked { vec!["R1".into(), "P1".into()] } else { Vec::new() },
            snapshot: Snapshot::new().resource("R1", 1).process("P1"),
        }
    }

    #[test]
    fn test_ids_increase_from_one() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("resultados.json");
        let mut log = ResultsLog::open(&path);

        assert_eq!(log.append(record(false)).unwrap(), 1);
        assert_eq!(log.append(record(true)).unwrap(), 2);

        let reopened = ResultsLog::open(&path);
        assert_eq!(reopened.runs().len(), 2);
        assert_eq!(reopened.get(2).unwrap().record, record(true));
        assert!(reopened.get(3).is_none());
    }

    #[test]
    fn test_next_id_follows_highest_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resultados.json");
        std::fs::write(
            &path,
            r#"{"execucoes": [{"id": 7, "timestamp": "2024-01-01 10:00:00", "deadlock_detectado": false, "ciclo": [],
                "recursos": {}, "processos": [], "alocacoes": {}, "requisicoes": {}}]}"#,
        )
        .unwrap();

        let mut log = ResultsLog::open(&path);
        assert_eq!(log.next_id(), 8);
        assert_eq!(log.append_at(record(false), "2024-01-01 10:05:00".to_string()).unwrap(), 8);
    }

    #[test]
    fn test_corrupt_log_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resultados.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut log = ResultsLog::open(&path);
        assert!(log.runs().is_empty());
        assert_eq!(log.append(record(true)).unwrap(), 1);

        let backup = dir.path().join("resultados.json.bak");
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "{not json");
        assert_eq!(ResultsLog::open(&path).runs().len(), 1);
    }

    #[test]
    fn test_existing_backup_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resultados.json");
        std::fs::write(dir.path().join("resultados.json.bak"), "older").unwrap();
        std::fs::write(&path, "[1, 2").unwrap();

        ResultsLog::open(&path).append(record(false)).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("resultados.json.bak")).unwrap(), "older");
        assert_eq!(std::fs::read_to_string(dir.path().join("resultados.json.bak.1")).unwrap(), "[1, 2");
    }

    #[test]
    fn test_log_with_empty_lists_keeps_history() {
        // json_encode writes empty associative arrays as []
        let dir = tempdir().unwrap();
        let path = dir.path().join("resultados.json");
        std::fs::write(
            &path,
            r#"{
    "execucoes": [
        {
            "id": 1,
            "timestamp": "2024-03-02 09:15:00",
            "deadlock_detectado": false,
            "ciclo": [],
            "recursos": {"R1": 1},
            "processos": ["P1"],
            "alocacoes": [],
            "requisicoes": []
        },
        {
            "id": 2,
            "timestamp": "2024-03-02 09:16:00",
            "deadlock_detectado": false,
            "ciclo": [],
            "recursos": [],
            "processos": [],
            "alocacoes": [],
            "requisicoes": []
        }
    ]
}"#,
        )
        .unwrap();

        let mut log = ResultsLog::open(&path);
        assert_eq!(log.runs().len(), 2);
        assert_eq!(log.get(1).unwrap().record.snapshot.resources.len(), 1);
        assert_eq!(log.append(record(true)).unwrap(), 3);

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["execucoes"].as_array().unwrap().len(), 3);
        assert!(!dir.path().join("resultados.json.bak").exists());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resultados.json");
        let mut log = ResultsLog::open(&path);
        log.append_at(record(true), "2024-05-01 12:00:00".to_string()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let run = &json["execucoes"][0];
        assert_eq!(run["id"], 1);
        assert_eq!(run["timestamp"], "2024-05-01 12:00:00");
        assert_eq!(run["deadlock_detectado"], true);
        assert_eq!(run["ciclo"][1], "P1");
        assert_eq!(run["recursos"]["R1"], 1);
    }

    #[test]
    fn test_timestamp_format() {
        let dir = tempdir().unwrap();
        let mut log = ResultsLog::open(dir.path().join("resultados.json"));
        log.append(record(false)).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&log.runs()[0].timestamp, TIMESTAMP_FORMAT).is_ok());
    }
}

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

//! CLI configuration
//!
//! Resolution order: `--config` flag, then `RAGRAPH_CONFIG`, then defaults.
//! The results log location can be overridden separately with `--results`
//! or `RAGRAPH_RESULTS`.

use anyhow::{Context, Result};
use ragraph_core::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "RAGRAPH_CONFIG";
pub const RESULTS_ENV: &str = "RAGRAPH_RESULTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON log every analysis run is appended to
    pub results_path: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub analysis: AnalysisConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from("data").join("resultados.json"),
            log_level: "warn".to_string(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_config(cli_config: Option<PathBuf>, cli_results: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        // CLI results path overrides environment settings
        if let Some(results) = cli_results {
            config.results_path = results;
        } else if let Ok(env_results) = std::env::var(RESULTS_ENV) {
            config.results_path = PathBuf::from(env_results);
        }

        Ok(config)
    }
}

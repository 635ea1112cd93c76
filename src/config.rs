// THEORY:
// `SorterConfig` holds the machine-level knobs of a sort run, as opposed to the
// operator's sorting plan (the `Profile`). It describes the fixture (how many
// columns, how many physical rows), what to do with parts no category wants, and
// how many lanes route in parallel.
//
// Values come from three places, later ones winning: built-in defaults, a JSON file,
// and `NEXUS_SORT_*` environment variables for quick changes on the machine itself.
// The merged result is validated once, before the run starts.

use crate::core_modules::bin_grid::{DEFAULT_GRID_WIDTH, FixtureBounds};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_GRID_WIDTH: &str = "NEXUS_SORT_GRID_WIDTH";
pub const ENV_FIXTURE_ROWS: &str = "NEXUS_SORT_FIXTURE_ROWS";
pub const ENV_LANES: &str = "NEXUS_SORT_LANES";

/// What the sort loop does with an item no category accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Log it, count it, keep sorting.
    #[default]
    Skip,
    /// Stop the run and surface the error.
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SorterConfig {
    /// Columns per grid row.
    pub grid_width: u32,
    /// Physical row count. `None` leaves bounds checking to the actuator.
    pub fixture_rows: Option<u32>,
    pub unmatched: UnmatchedPolicy,
    /// Keep every routed item in its category's `contents`.
    pub record_contents: bool,
    /// Parallel routing lanes.
    pub lanes: usize,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            grid_width: DEFAULT_GRID_WIDTH,
            fixture_rows: None,
            unmatched: UnmatchedPolicy::default(),
            record_contents: false,
            lanes: num_cpus::get(),
        }
    }
}

impl SorterConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like `load`, with override values fetched through `lookup` instead of the process
    /// environment.
    pub fn load_with(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&json)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_environment_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `NEXUS_SORT_*` overrides fetched through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_GRID_WIDTH) {
            self.grid_width = parse_override(ENV_GRID_WIDTH, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FIXTURE_ROWS) {
            self.fixture_rows = Some(parse_override(ENV_FIXTURE_ROWS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_LANES) {
            self.lanes = parse_override(ENV_LANES, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 {
            return Err(ConfigError::Invalid("grid_width must be at least 1".into()));
        }
        if self.fixture_rows == Some(0) {
            return Err(ConfigError::Invalid("fixture_rows must be at least 1".into()));
        }
        if self.lanes == 0 {
            return Err(ConfigError::Invalid("lanes must be at least 1".into()));
        }
        Ok(())
    }

    pub fn fixture_bounds(&self) -> Option<FixtureBounds> {
        self.fixture_rows.map(|rows| FixtureBounds {
            columns: self.grid_width,
            rows,
        })
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}='{raw}' is not a valid number")))
}

use crate::coverage::{AggregateOptions, FailurePolicy};
use crate::tiler::{H3Tiler, HoleMode};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const NATURAL_EARTH_110M: &str = "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/refs/heads/master/geojson/ne_110m_admin_0_countries.geojson";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    /// URL, GeoJSON file or shapefile.
    pub source: String,
    pub primary_code_field: String,
    pub secondary_code_field: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: NATURAL_EARTH_110M.to_string(),
            primary_code_field: "ISO_A3".to_string(),
            secondary_code_field: "ISO_A3_EH".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessingConfig {
    pub resolutions: Vec<u8>,
    /// Also write the union of all countries as `land`.
    pub aggregate_land: bool,
    pub failure_policy: FailurePolicy,
    pub exclude_holes: bool,
    /// Worker threads, 0 for one per core.
    pub threads: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            resolutions: vec![4],
            aggregate_land: true,
            failure_policy: FailurePolicy::FailFast,
            exclude_holes: false,
            threads: 0,
        }
    }
}

impl ProcessingConfig {
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            aggregate_land: self.aggregate_land,
            failure_policy: self.failure_policy,
        }
    }

    pub fn tiler(&self) -> H3Tiler {
        let holes = if self.exclude_holes {
            HoleMode::Exclude
        } else {
            HoleMode::Ignore
        };
        H3Tiler::new(holes)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Crs;
use crate::region::{TieBreak, DEFAULT_DISSOLVE_FIELD};

/// Path of a TOML config file to load instead of the defaults
pub const CONFIG_ENV: &str = "FTYPEAA_CONFIG";
/// Overrides `data.dir`
pub const DATA_DIR_ENV: &str = "FTYPEAA_DATA_DIR";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub attribution: AttributionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub crosswalk_file: PathBuf,
    pub supersections_file: PathBuf,
    /// Crosswalk column holding forest-type codes; the first column if unset
    pub crosswalk_key_column: Option<String>,
    /// Used when the supersection `.prj` is missing or unrecognised
    pub supersections_crs: Option<Crs>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AttributionConfig {
    pub dissolve_on: String,
    pub tie_break: TieBreak,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            crosswalk_file: PathBuf::from("ftype_to_assessment_crosswalk.csv"),
            supersections_file: PathBuf::from("CAR_supersections/CAR_supersections_coded.shp"),
            crosswalk_key_column: None,
            supersections_crs: None,
        }
    }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            dissolve_on: DEFAULT_DISSOLVE_FIELD.to_string(),
            tie_break: TieBreak::default(),
        }
    }
}

impl DataConfig {
    pub fn crosswalk_path(&self) -> PathBuf {
        self.dir.join(&self.crosswalk_file)
    }

    pub fn supersections_path(&self) -> PathBuf {
        self.dir.join(&self.supersections_file)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Config from `FTYPEAA_CONFIG` (or defaults), with `FTYPEAA_DATA_DIR` applied on top
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from_file(&path)
                .with_context(|| format!("Failed to load {}", PathBuf::from(&path).display()))?,
            None => Self::default(),
        };
        if let Some(dir) = env::var_os(DATA_DIR_ENV) {
            config.data.dir = PathBuf::from(dir);
        }
        Ok(config)
    }
}

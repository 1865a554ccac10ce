//! Process-wide reference data: the crosswalk table and supersection layer.
//!
//! Loaded at most once, before first use, and never mutated or dropped
//! afterwards. Concurrent readers share it without locking.

use std::sync::OnceLock;
use tracing::info;

use crate::config::{AttributionConfig, Config, DataConfig};
use crate::crosswalk::Crosswalk;
use crate::error::{Error, Result};
use crate::models::VectorLayer;
use crate::region::load_supersections;

static REFERENCE: OnceLock<ReferenceData> = OnceLock::new();

/// Read-only reference datasets shared by all attribution calls
#[derive(Debug)]
pub struct ReferenceData {
    pub crosswalk: Crosswalk,
    pub supersections: VectorLayer,
    pub attribution: AttributionConfig,
}

impl ReferenceData {
    /// Load both datasets from disk without installing them globally
    pub fn load(data: &DataConfig, attribution: AttributionConfig) -> Result<Self> {
        let crosswalk = Crosswalk::load(
            &data.crosswalk_path(),
            data.crosswalk_key_column.as_deref(),
        )?;
        let supersections = load_supersections(
            &data.supersections_path(),
            data.supersections_crs.as_ref(),
        )?;

        Ok(Self {
            crosswalk,
            supersections,
            attribution,
        })
    }

    /// Install the process-wide reference data.
    ///
    /// Loads from `config` only if nothing is installed yet; later calls
    /// return the existing instance unchanged.
    pub fn init(config: &Config) -> Result<&'static ReferenceData> {
        if let Some(existing) = REFERENCE.get() {
            return Ok(existing);
        }

        let loaded = Self::load(&config.data, config.attribution.clone())?;
        info!(
            "Reference data ready: {} crosswalk rows, {} supersections",
            loaded.crosswalk.len(),
            loaded.supersections.len()
        );
        // A concurrent loader may have won; its copy is kept
        Ok(REFERENCE.get_or_init(|| loaded))
    }

    /// Install already-loaded reference data, if none is installed yet
    pub fn install(data: ReferenceData) -> &'static ReferenceData {
        REFERENCE.get_or_init(|| data)
    }

    /// The installed reference data, if any
    pub fn global() -> Option<&'static ReferenceData> {
        REFERENCE.get()
    }

    /// The installed reference data, loading it from `Config::from_env` on first use
    pub fn get_or_load() -> Result<&'static ReferenceData> {
        match REFERENCE.get() {
            Some(existing) => Ok(existing),
            None => {
                let config = Config::from_env().map_err(|e| Error::Config(format!("{:#}", e)))?;
                Self::init(&config)
            }
        }
    }
}

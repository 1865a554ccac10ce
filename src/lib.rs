//! ftypeaa - supersection attribution for forest stand layers
//!
//! Spatially joins caller-supplied polygon layers against a packaged layer of
//! coded supersection regions, then dissolves the result on a stand key. Also
//! loads the forest-type to assessment-area crosswalk shipped alongside it.

pub mod config;
pub mod crosswalk;
pub mod error;
pub mod models;
pub mod reference;
pub mod region;
pub mod reproject;

pub use config::Config;
pub use crosswalk::Crosswalk;
pub use error::{Error, Result};
pub use models::{AttrValue, Crs, Feature, VectorLayer};
pub use reference::ReferenceData;
pub use region::{attribute_ss, dissolve, spatial_join, RegionAttributor, TieBreak};
pub use reproject::reproject;

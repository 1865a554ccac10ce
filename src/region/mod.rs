//! Region attribution of vector layers against supersection boundaries.
//!
//! Reference regions are reprojected into the input's coordinate system,
//! matched with an R-tree backed left spatial join and then dissolved on a
//! grouping key.

mod dissolve;
mod index;
mod join;
mod service;
mod supersections;

pub use dissolve::dissolve;
pub use index::LayerIndex;
pub use join::{spatial_join, INDEX_RIGHT};
pub use service::{attribute_ss, RegionAttributor, TieBreak, DEFAULT_DISSOLVE_FIELD};
pub use supersections::{load_supersections, SSECTION_FIELD, SS_CODE_FIELD, SS_NAME_FIELD};

//! Core data model: attribute values, coordinate systems and vector layers.

pub mod crs;
pub mod layer;
pub mod value;

pub use crs::Crs;
pub use layer::{Feature, VectorLayer};
pub use value::AttrValue;

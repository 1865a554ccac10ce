//! Library error type.

use thiserror::Error;

use crate::models::Crs;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("field '{field}' not found in layer schema")]
    MissingField { field: String },

    #[error("{layer} layer has no coordinate reference system")]
    UndefinedCrs { layer: &'static str },

    #[error("layers are in different coordinate systems ({left} vs {right})")]
    CrsMismatch { left: Crs, right: Crs },

    #[error("feature has {got} attribute values, schema has {expected} fields")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("projection error: {0}")]
    Projection(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

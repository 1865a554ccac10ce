//! Polygon vector layer: a schema, an optional CRS and attributed features.

use geo::{BoundingRect, MultiPolygon, Polygon};

use super::{AttrValue, Crs};
use crate::error::{Error, Result};

/// A single polygon feature with one value per schema field
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub values: Vec<AttrValue>,
}

impl Feature {
    /// Get the bounding box of this feature
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// An in-memory vector layer of polygon features
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    crs: Option<Crs>,
    fields: Vec<String>,
    features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new<S: Into<String>>(crs: Option<Crs>, fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            crs,
            fields: fields.into_iter().map(Into::into).collect(),
            features: Vec::new(),
        }
    }

    /// Append a feature; the value count must match the schema
    pub fn push(&mut self, geometry: impl Into<MultiPolygon<f64>>, values: Vec<AttrValue>) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(Error::SchemaMismatch {
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        self.features.push(Feature {
            geometry: geometry.into(),
            values,
        });
        Ok(())
    }

    /// Append a single-polygon feature
    pub fn push_polygon(&mut self, polygon: Polygon<f64>, values: Vec<AttrValue>) -> Result<()> {
        self.push(MultiPolygon::new(vec![polygon]), values)
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Position of a field in the schema
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Like `field_index`, but missing fields are an error
    pub fn require_field(&self, field: &str) -> Result<usize> {
        self.field_index(field).ok_or_else(|| Error::MissingField {
            field: field.to_string(),
        })
    }

    /// Attribute value of a feature by field name
    pub fn value(&self, feature: usize, field: &str) -> Option<&AttrValue> {
        let idx = self.field_index(field)?;
        self.features.get(feature).map(|f| &f.values[idx])
    }

    /// Same schema and features in a different coordinate system
    pub(crate) fn with_features(&self, crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self {
            crs,
            fields: self.fields.clone(),
            features,
        }
    }

    pub(crate) fn from_parts(crs: Option<Crs>, fields: Vec<String>, features: Vec<Feature>) -> Self {
        Self {
            crs,
            fields,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

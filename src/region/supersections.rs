//! Supersection boundary loading from a coded shapefile.

use geo::MultiPolygon;
use shapefile::dbase::{self, FieldValue};
use shapefile::Shape;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{AttrValue, Crs, VectorLayer};

/// Supersection code field
pub const SSECTION_FIELD: &str = "SSection";
/// Supersection name field
pub const SS_NAME_FIELD: &str = "SS_Name2";
/// Short numeric supersection code
pub const SS_CODE_FIELD: &str = "ss_code";

/// Load supersection polygons and their DBF attributes.
///
/// The CRS comes from `crs_override` when given, otherwise from the `.prj`
/// sidecar. Fields keep their `.dbf` column order. Null and non-polygon shapes
/// are skipped.
pub fn load_supersections(path: &Path, crs_override: Option<&Crs>) -> Result<VectorLayer> {
    info!("Loading supersections from {}", path.display());

    let crs = match crs_override {
        Some(crs) => Some(crs.clone()),
        None => read_prj(path)?,
    };
    if crs.is_none() {
        warn!(
            "No usable coordinate system for {}; reprojection will fail",
            path.display()
        );
    }

    let mut reader = shapefile::Reader::from_path(path)?;
    let fields = dbf_field_names(path)?;

    let mut layer = VectorLayer::new(crs, fields.iter().cloned());
    let mut skipped = 0usize;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let geometry = match shape_to_multipolygon(shape) {
            Some(g) => g,
            None => {
                skipped += 1;
                continue;
            }
        };

        let mut record: HashMap<String, FieldValue> = record.into();
        let values = fields
            .iter()
            .map(|name| record.remove(name).map(attr_from_field).unwrap_or_default())
            .collect();
        layer.push(geometry, values)?;
    }

    if skipped > 0 {
        warn!("Skipped {} null or non-polygon shapes", skipped);
    }

    for field in [SSECTION_FIELD, SS_NAME_FIELD, SS_CODE_FIELD] {
        if layer.field_index(field).is_none() {
            warn!("Supersection layer has no '{}' field", field);
        }
    }

    info!("Loaded {} supersections", layer.len());
    Ok(layer)
}

/// CRS from the `.prj` sidecar next to `path`, if there is one we understand
fn read_prj(path: &Path) -> Result<Option<Crs>> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        return Ok(None);
    }
    let wkt = fs::read_to_string(&prj)?;
    Ok(Crs::from_wkt(&wkt))
}

/// Column names in `.dbf` header order
fn dbf_field_names(path: &Path) -> Result<Vec<String>> {
    let dbf =
        dbase::Reader::from_path(path.with_extension("dbf")).map_err(shapefile::Error::from)?;
    Ok(dbf.fields().iter().map(|f| f.name().to_string()).collect())
}

fn shape_to_multipolygon(shape: Shape) -> Option<MultiPolygon<f64>> {
    match geo_types::Geometry::<f64>::try_from(shape) {
        Ok(geo_types::Geometry::MultiPolygon(mp)) => Some(mp),
        Ok(geo_types::Geometry::Polygon(p)) => Some(MultiPolygon::new(vec![p])),
        _ => None,
    }
}

fn attr_from_field(value: FieldValue) -> AttrValue {
    match value {
        FieldValue::Character(s) => s.into(),
        FieldValue::Numeric(n) => n.map(numeric_attr).unwrap_or_default(),
        FieldValue::Float(f) => f.map(|f| AttrValue::Float(f as f64)).unwrap_or_default(),
        FieldValue::Logical(b) => b.into(),
        FieldValue::Integer(i) => AttrValue::Int(i as i64),
        FieldValue::Double(d) => AttrValue::Float(d),
        FieldValue::Currency(c) => AttrValue::Float(c),
        FieldValue::Memo(m) => AttrValue::Text(m),
        FieldValue::Date(d) => d.map(|d| AttrValue::Text(iso_date(&d))).unwrap_or_default(),
        FieldValue::DateTime(dt) => {
            let time = dt.time();
            AttrValue::Text(format!(
                "{}T{:02}:{:02}:{:02}",
                iso_date(&dt.date()),
                time.hours(),
                time.minutes(),
                time.seconds()
            ))
        }
    }
}

fn iso_date(date: &dbase::Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// DBF numerics are f64 even for integer columns such as codes
fn numeric_attr(n: f64) -> AttrValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        AttrValue::Int(n as i64)
    } else {
        AttrValue::Float(n)
    }
}

//! Left spatial join of two polygon layers.

use hashbrown::HashSet;
use tracing::debug;

use super::LayerIndex;
use crate::error::{Error, Result};
use crate::models::{AttrValue, Feature, VectorLayer};

/// Name of the column holding the matched right-hand feature position
pub const INDEX_RIGHT: &str = "index_right";

/// One output row of a left join: a left feature and at most one match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JoinMatch {
    pub left: usize,
    pub right: Option<usize>,
}

/// Pair every left feature with each intersecting right feature.
///
/// Left features with no match get a single row with `right: None`.
/// Rows come out ordered by left position, then right position.
pub(crate) fn match_features(left: &VectorLayer, right: &VectorLayer) -> Result<Vec<JoinMatch>> {
    let left_crs = left.crs().ok_or(Error::UndefinedCrs { layer: "left" })?;
    let right_crs = right.crs().ok_or(Error::UndefinedCrs { layer: "right" })?;
    if left_crs != right_crs {
        return Err(Error::CrsMismatch {
            left: left_crs.clone(),
            right: right_crs.clone(),
        });
    }

    let index = LayerIndex::build(right);
    let mut matches = Vec::with_capacity(left.len());

    for (i, feature) in left.features().iter().enumerate() {
        let hits = index.intersecting(&feature.geometry);
        if hits.is_empty() {
            matches.push(JoinMatch {
                left: i,
                right: None,
            });
        } else {
            matches.extend(hits.into_iter().map(|r| JoinMatch {
                left: i,
                right: Some(r),
            }));
        }
    }

    debug!(
        "Spatial join: {} left features, {} right features, {} rows",
        left.len(),
        right.len(),
        matches.len()
    );

    Ok(matches)
}

/// Joined schema: left fields, `index_right`, right fields.
/// Names present on both sides get `_left` / `_right` suffixes.
fn joined_fields(left: &VectorLayer, right: &VectorLayer) -> Vec<String> {
    let left_names: HashSet<&str> = left.fields().iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right
        .fields()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(INDEX_RIGHT))
        .collect();

    let mut fields = Vec::with_capacity(left.fields().len() + right.fields().len() + 1);
    for name in left.fields() {
        if right_names.contains(name.as_str()) {
            fields.push(format!("{}_left", name));
        } else {
            fields.push(name.clone());
        }
    }
    fields.push(INDEX_RIGHT.to_string());
    for name in right.fields() {
        if left_names.contains(name.as_str()) {
            fields.push(format!("{}_right", name));
        } else {
            fields.push(name.clone());
        }
    }
    fields
}

/// Materialise join rows into a layer carrying the left geometries
pub(crate) fn build_joined(
    left: &VectorLayer,
    right: &VectorLayer,
    matches: &[JoinMatch],
) -> VectorLayer {
    let fields = joined_fields(left, right);
    let right_width = right.fields().len();

    let features = matches
        .iter()
        .map(|m| {
            let source = &left.features()[m.left];
            let mut values = Vec::with_capacity(fields.len());
            values.extend(source.values.iter().cloned());
            match m.right {
                Some(r) => {
                    values.push(AttrValue::Int(r as i64));
                    values.extend(right.features()[r].values.iter().cloned());
                }
                None => {
                    values.push(AttrValue::Null);
                    values.extend(std::iter::repeat(AttrValue::Null).take(right_width));
                }
            }
            Feature {
                geometry: source.geometry.clone(),
                values,
            }
        })
        .collect();

    VectorLayer::from_parts(left.crs().cloned(), fields, features)
}

/// Left spatial join on the `intersects` predicate.
///
/// Every left feature is kept; one row is produced per intersecting right
/// feature, or a single row with null right-hand values when none intersect.
/// Both layers must share a CRS.
pub fn spatial_join(left: &VectorLayer, right: &VectorLayer) -> Result<VectorLayer> {
    let matches = match_features(left, right)?;
    Ok(build_joined(left, right, &matches))
}

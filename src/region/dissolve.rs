//! Dissolve: merge features that share a key value.

use geo::{BooleanOps, MultiPolygon};
use hashbrown::HashMap;
use tracing::debug;

use crate::error::Result;
use crate::models::{AttrValue, Feature, VectorLayer};

struct Group<'a> {
    key: AttrValue,
    geometries: Vec<&'a MultiPolygon<f64>>,
    values: Vec<AttrValue>,
}

impl Group<'_> {
    fn union(&self) -> MultiPolygon<f64> {
        let mut parts = self.geometries.iter();
        match parts.next() {
            Some(first) => parts.fold((*first).clone(), |acc, g| acc.union(*g)),
            None => MultiPolygon::new(vec![]),
        }
    }
}

/// Group features by the value of `by`, union their geometries and keep
/// the first non-null value of every other column.
///
/// The output schema is `by` followed by the remaining fields in their
/// original order; records are sorted by key with null keys last. Null keys
/// form a group of their own so no feature is dropped.
pub fn dissolve(layer: &VectorLayer, by: &str) -> Result<VectorLayer> {
    let key_idx = layer.require_field(by)?;
    let width = layer.fields().len();

    let mut slots: HashMap<&AttrValue, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for feature in layer.features() {
        let key = &feature.values[key_idx];
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(Group {
                key: key.clone(),
                geometries: Vec::new(),
                values: vec![AttrValue::Null; width],
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        // Join rows repeat the left geometry once per match
        if !group.geometries.contains(&&feature.geometry) {
            group.geometries.push(&feature.geometry);
        }

        for (held, value) in group.values.iter_mut().zip(&feature.values) {
            if held.is_null() && !value.is_null() {
                *held = value.clone();
            }
        }
    }

    groups.sort_by(|a, b| a.key.cmp(&b.key));

    let mut fields = Vec::with_capacity(width);
    fields.push(by.to_string());
    fields.extend(
        layer
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_idx)
            .map(|(_, f)| f.clone()),
    );

    let features: Vec<Feature> = groups
        .iter()
        .map(|group| {
            let mut values = Vec::with_capacity(width);
            values.push(group.key.clone());
            values.extend(
                group
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != key_idx)
                    .map(|(_, v)| v.clone()),
            );
            Feature {
                geometry: group.union(),
                values,
            }
        })
        .collect();

    debug!(
        "Dissolved {} features on '{}' into {} groups",
        layer.len(),
        by,
        features.len()
    );

    Ok(VectorLayer::from_parts(layer.crs().cloned(), fields, features))
}

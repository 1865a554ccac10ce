//! Supersection attribution: reproject, left spatial join, dissolve.

use geo::{Area, BooleanOps};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dissolve::dissolve;
use super::join::{build_joined, match_features, JoinMatch};
use crate::error::{Error, Result};
use crate::models::{AttrValue, VectorLayer};
use crate::reference::ReferenceData;
use crate::reproject::reproject;

/// Field identifying stand records in forest inventory layers
pub const DEFAULT_DISSOLVE_FIELD: &str = "Stand_ID";

/// How region attributes are chosen when a group overlaps several regions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First non-null value per column, in join order
    #[default]
    FirstMatch,
    /// All region columns from the region with the most overlap area
    LargestOverlap,
}

/// Attaches reference-region attributes to input layers
pub struct RegionAttributor<'a> {
    reference: &'a VectorLayer,
    tie_break: TieBreak,
}

impl<'a> RegionAttributor<'a> {
    pub fn new(reference: &'a VectorLayer, tie_break: TieBreak) -> Self {
        Self {
            reference,
            tie_break,
        }
    }

    /// Join `input` against the reference regions and dissolve on `dissolve_on`.
    ///
    /// The reference layer is reprojected into the input's CRS for this call
    /// only. Every input feature ends up in exactly one output record; features
    /// outside all regions carry null region attributes.
    pub fn attribute(&self, input: &VectorLayer, dissolve_on: &str) -> Result<VectorLayer> {
        let key_idx = input.require_field(dissolve_on)?;
        let crs = input.crs().ok_or(Error::UndefinedCrs { layer: "input" })?;
        if self.reference.crs().is_none() {
            return Err(Error::UndefinedCrs { layer: "reference" });
        }

        let regions = reproject(self.reference, crs)?;
        let mut matches = match_features(input, &regions)?;

        if self.tie_break == TieBreak::LargestOverlap {
            matches = keep_largest_overlap(input, &regions, key_idx, matches);
        }

        let joined = build_joined(input, &regions, &matches);

        // Input fields keep their positions in the joined schema, possibly
        // renamed to `<key>_left` on a collision
        let key = joined.fields()[key_idx].clone();

        let output = dissolve(&joined, &key)?;
        debug!(
            "Attributed {} input features into {} records",
            input.len(),
            output.len()
        );
        Ok(output)
    }
}

/// Reduce each key group to the single region with the largest summed
/// intersection area. Ties go to the lower region position. Input features
/// that miss the winning region keep one row without a match.
fn keep_largest_overlap(
    input: &VectorLayer,
    regions: &VectorLayer,
    key_idx: usize,
    matches: Vec<JoinMatch>,
) -> Vec<JoinMatch> {
    let features = input.features();

    let mut overlap: HashMap<&AttrValue, HashMap<usize, f64>> = HashMap::new();
    for m in &matches {
        if let Some(r) = m.right {
            let area = features[m.left]
                .geometry
                .intersection(&regions.features()[r].geometry)
                .unsigned_area();
            *overlap
                .entry(&features[m.left].values[key_idx])
                .or_default()
                .entry(r)
                .or_default() += area;
        }
    }

    let winners: HashMap<&AttrValue, usize> = overlap
        .into_iter()
        .filter_map(|(key, areas)| dominant_region(&areas).map(|r| (key, r)))
        .collect();

    // Rows of one input feature are contiguous
    matches
        .chunk_by(|a, b| a.left == b.left)
        .map(|rows| {
            let left = rows[0].left;
            let right = winners
                .get(&features[left].values[key_idx])
                .copied()
                .filter(|w| rows.iter().any(|m| m.right == Some(*w)));
            JoinMatch { left, right }
        })
        .collect()
}

/// Lowest region position among those within rounding of the largest area
fn dominant_region(areas: &HashMap<usize, f64>) -> Option<usize> {
    let largest = areas.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let tolerance = largest.abs() * 1e-9;
    areas
        .iter()
        .filter(|(_, area)| **area >= largest - tolerance)
        .map(|(r, _)| *r)
        .min()
}

/// Attribute `input` with supersections from the process-wide reference data.
///
/// `dissolve_on` defaults to the configured field (`Stand_ID` unless
/// overridden). The reference data is loaded from the environment
/// configuration on first use.
pub fn attribute_ss(input: &VectorLayer, dissolve_on: Option<&str>) -> Result<VectorLayer> {
    let reference = ReferenceData::get_or_load()?;
    let dissolve_on = dissolve_on.unwrap_or(reference.attribution.dissolve_on.as_str());

    info!(
        "Attributing {} features with supersections (dissolve on '{}')",
        input.len(),
        dissolve_on
    );

    RegionAttributor::new(&reference.supersections, reference.attribution.tie_break)
        .attribute(input, dissolve_on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Crs;
    use crate::reproject::Transformer;
    use geo::{polygon, Contains, MultiPolygon, Point, Polygon};

    fn square(x: f64, y: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0)
        ]
    }

    fn region_layer(crs: Crs) -> VectorLayer {
        let mut layer = VectorLayer::new(Some(crs), ["SSection", "SS_Name2", "ss_code"]);
        // Covers only the square at the origin
        let region = polygon![(x: -0.5, y: -0.5), (x: 1.5, y: -0.5), (x: 1.5, y: 1.5), (x: -0.5, y: 1.5)];
        layer
            .push_polygon(
                region,
                vec![
                    "212K".into(),
                    "Western Superior Uplands".into(),
                    AttrValue::Int(12),
                ],
            )
            .unwrap();
        layer
    }

    fn stands(crs: Crs, rows: &[(Polygon<f64>, &str)]) -> VectorLayer {
        let mut layer = VectorLayer::new(Some(crs), [DEFAULT_DISSOLVE_FIELD]);
        for (geometry, id) in rows {
            layer
                .push_polygon(geometry.clone(), vec![(*id).into()])
                .unwrap();
        }
        layer
    }

    #[test]
    fn test_two_squares_scenario() {
        let reference = region_layer(Crs::WGS84);
        let input = stands(
            Crs::WGS84,
            &[
                (square(0.0, 0.0), "A"),
                (square(10.0, 10.0), "A"),
                (square(10.0, 0.0), "B"),
            ],
        );

        let out = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(
            out.fields(),
            &["Stand_ID", "index_right", "SSection", "SS_Name2", "ss_code"]
        );

        assert_eq!(out.value(0, "Stand_ID"), Some(&AttrValue::from("A")));
        assert_eq!(out.value(0, "SSection"), Some(&AttrValue::from("212K")));
        assert_eq!(out.value(0, "ss_code"), Some(&AttrValue::Int(12)));
        let a = &out.features()[0].geometry;
        assert!((a.unsigned_area() - 2.0).abs() < 1e-9);
        assert!(a.contains(&Point::new(0.5, 0.5)));
        assert!(a.contains(&Point::new(10.5, 10.5)));

        assert_eq!(out.value(1, "Stand_ID"), Some(&AttrValue::from("B")));
        assert_eq!(out.value(1, "SSection"), Some(&AttrValue::Null));
        assert_eq!(out.value(1, "SS_Name2"), Some(&AttrValue::Null));
    }

    #[test]
    fn test_unique_keys_keep_count() {
        let reference = region_layer(Crs::WGS84);
        let input = stands(
            Crs::WGS84,
            &[
                (square(0.0, 0.0), "S1"),
                (square(0.5, 0.5), "S2"),
                (square(3.0, 3.0), "S3"),
                (square(-4.0, 2.0), "S4"),
            ],
        );

        let out = RegionAttributor::new(&reference, TieBreak::default())
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn test_empty_input() {
        let reference = region_layer(Crs::WGS84);
        let input = stands(Crs::WGS84, &[]);

        let out = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_dissolve_field() {
        let reference = region_layer(Crs::WGS84);
        let input = stands(Crs::WGS84, &[(square(0.0, 0.0), "A")]);

        let err = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, "StandID")
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field } if field == "StandID"));
    }

    #[test]
    fn test_input_without_crs() {
        let reference = region_layer(Crs::WGS84);
        let mut input = VectorLayer::new(None, [DEFAULT_DISSOLVE_FIELD]);
        input
            .push_polygon(square(0.0, 0.0), vec!["A".into()])
            .unwrap();

        let err = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap_err();
        assert!(matches!(err, Error::UndefinedCrs { layer: "input" }));
    }

    #[test]
    fn test_largest_overlap_picks_dominant_region() {
        let mut reference = VectorLayer::new(Some(Crs::WGS84), ["SSection"]);
        let west = polygon![(x: -5.0, y: -5.0), (x: 0.25, y: -5.0), (x: 0.25, y: 5.0), (x: -5.0, y: 5.0)];
        let east = polygon![(x: 0.25, y: -5.0), (x: 5.0, y: -5.0), (x: 5.0, y: 5.0), (x: 0.25, y: 5.0)];
        reference.push_polygon(west, vec!["222M".into()]).unwrap();
        reference.push_polygon(east, vec!["212K".into()]).unwrap();

        // 1/4 of the stand lies west, 3/4 east
        let input = stands(Crs::WGS84, &[(square(0.0, 0.0), "A")]);

        let first = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(first.value(0, "SSection"), Some(&AttrValue::from("222M")));

        let largest = RegionAttributor::new(&reference, TieBreak::LargestOverlap)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(largest.len(), 1);
        assert_eq!(largest.value(0, "SSection"), Some(&AttrValue::from("212K")));
        assert_eq!(largest.value(0, "index_right"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn test_largest_overlap_keeps_unmatched_geometry() {
        let reference = region_layer(Crs::WGS84);
        let input = stands(
            Crs::WGS84,
            &[(square(0.0, 0.0), "A"), (square(10.0, 10.0), "A")],
        );

        let out = RegionAttributor::new(&reference, TieBreak::LargestOverlap)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "SSection"), Some(&AttrValue::from("212K")));
        assert!((out.features()[0].geometry.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reference_in_other_crs_matches_manual_reprojection() {
        let geographic = Crs::Proj4("+proj=longlat +datum=WGS84 +no_defs".to_string());
        let utm = Crs::Proj4("+proj=utm +zone=15 +datum=WGS84 +units=m +no_defs".to_string());
        let to_utm = Transformer::new(&geographic, &utm).unwrap();

        let mut reference = VectorLayer::new(Some(geographic.clone()), ["SSection"]);
        let region = polygon![(x: -93.5, y: 45.0), (x: -93.0, y: 45.0), (x: -93.0, y: 45.5), (x: -93.5, y: 45.5)];
        reference.push_polygon(region, vec!["212L".into()]).unwrap();

        let small = |lon: f64, lat: f64| -> MultiPolygon<f64> {
            let p = polygon![
                (x: lon, y: lat),
                (x: lon + 0.01, y: lat),
                (x: lon + 0.01, y: lat + 0.01),
                (x: lon, y: lat + 0.01)
            ];
            to_utm.transform(&MultiPolygon::new(vec![p])).unwrap()
        };
        let mut input = VectorLayer::new(Some(utm.clone()), [DEFAULT_DISSOLVE_FIELD]);
        input.push(small(-93.2, 45.2), vec!["S1".into()]).unwrap();
        input.push(small(-92.5, 45.2), vec!["S2".into()]).unwrap();

        let implicit = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();

        let manual = reproject(&reference, &utm).unwrap();
        let explicit = RegionAttributor::new(&manual, TieBreak::FirstMatch)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();

        assert_eq!(implicit.len(), 2);
        for i in 0..implicit.len() {
            assert_eq!(implicit.features()[i].values, explicit.features()[i].values);
        }
        assert_eq!(implicit.value(0, "SSection"), Some(&AttrValue::from("212L")));
        assert_eq!(implicit.value(1, "SSection"), Some(&AttrValue::Null));
        // Caller's reference layer is left in its own CRS
        assert_eq!(reference.crs(), Some(&geographic));
    }

    #[test]
    fn test_key_named_like_join_index_column() {
        let reference = region_layer(Crs::WGS84);
        let mut input = VectorLayer::new(Some(Crs::WGS84), ["index_right"]);
        input
            .push_polygon(square(0.0, 0.0), vec!["A".into()])
            .unwrap();
        input
            .push_polygon(square(0.2, 0.2), vec!["B".into()])
            .unwrap();

        let out = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, "index_right")
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.fields()[0], "index_right_left");
        assert_eq!(out.value(0, "index_right_left"), Some(&AttrValue::from("A")));
        assert_eq!(out.value(1, "index_right_left"), Some(&AttrValue::from("B")));
        assert_eq!(out.value(0, "index_right"), Some(&AttrValue::Int(0)));
        assert_eq!(out.value(1, "SSection"), Some(&AttrValue::from("212K")));
    }

    #[test]
    fn test_key_colliding_with_reference_field() {
        let reference = region_layer(Crs::WGS84);
        let mut input = VectorLayer::new(Some(Crs::WGS84), ["SSection"]);
        input
            .push_polygon(square(0.0, 0.0), vec!["stand-1".into()])
            .unwrap();
        input
            .push_polygon(square(10.0, 0.0), vec!["stand-2".into()])
            .unwrap();

        let out = RegionAttributor::new(&reference, TieBreak::FirstMatch)
            .attribute(&input, "SSection")
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.fields()[0], "SSection_left");
        assert_eq!(out.value(0, "SSection_right"), Some(&AttrValue::from("212K")));
        assert_eq!(out.value(1, "SSection_right"), Some(&AttrValue::Null));
    }

    #[test]
    fn test_largest_overlap_tie_goes_to_lower_region() {
        let west = polygon![(x: -5.0, y: -5.0), (x: 0.5, y: -5.0), (x: 0.5, y: 5.0), (x: -5.0, y: 5.0)];
        let east = polygon![(x: 0.5, y: -5.0), (x: 5.0, y: -5.0), (x: 5.0, y: 5.0), (x: 0.5, y: 5.0)];
        // Stand split exactly in half
        let input = stands(Crs::WGS84, &[(square(0.0, 0.0), "A")]);

        let mut reference = VectorLayer::new(Some(Crs::WGS84), ["SSection"]);
        reference.push_polygon(west.clone(), vec!["222M".into()]).unwrap();
        reference.push_polygon(east.clone(), vec!["212K".into()]).unwrap();

        let out = RegionAttributor::new(&reference, TieBreak::LargestOverlap)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "index_right"), Some(&AttrValue::Int(0)));
        assert_eq!(out.value(0, "SSection"), Some(&AttrValue::from("222M")));

        // Same regions in the other order
        let mut reversed = VectorLayer::new(Some(Crs::WGS84), ["SSection"]);
        reversed.push_polygon(east, vec!["212K".into()]).unwrap();
        reversed.push_polygon(west, vec!["222M".into()]).unwrap();

        let out = RegionAttributor::new(&reversed, TieBreak::LargestOverlap)
            .attribute(&input, DEFAULT_DISSOLVE_FIELD)
            .unwrap();
        assert_eq!(out.value(0, "index_right"), Some(&AttrValue::Int(0)));
        assert_eq!(out.value(0, "SSection"), Some(&AttrValue::from("212K")));
    }

    #[test]
    fn test_dominant_region_ignores_rounding() {
        let areas: HashMap<usize, f64> = [(3, 0.5), (1, 0.5 - 1e-15), (7, 0.25)]
            .into_iter()
            .collect();
        assert_eq!(dominant_region(&areas), Some(1));
        assert_eq!(dominant_region(&HashMap::new()), None);
    }
}

//! Spatial index for intersecting a geometry against a layer's features.

use geo::{BoundingRect, Intersects, MultiPolygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::models::{Feature, VectorLayer};

/// Wrapper for R-tree indexing of layer features by position
#[derive(Clone)]
pub struct IndexedFeature {
    pub index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedFeature {
    pub fn new(index: usize, feature: &Feature) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = feature.bbox()?;
        Some(Self {
            index,
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// R-tree over the features of a borrowed layer
pub struct LayerIndex<'a> {
    layer: &'a VectorLayer,
    tree: RTree<IndexedFeature>,
}

impl<'a> LayerIndex<'a> {
    /// Build the index; features with empty geometry are never matched
    pub fn build(layer: &'a VectorLayer) -> Self {
        let indexed: Vec<IndexedFeature> = layer
            .features()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| IndexedFeature::new(i, f))
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Layer index built with {} entries", tree.size());

        Self { layer, tree }
    }

    /// Positions of all features intersecting `geometry`, ascending
    pub fn intersecting(&self, geometry: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let query_envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        // Envelope candidates first, then the exact predicate
        let features = self.layer.features();
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ib| features[ib.index].geometry.intersects(geometry))
            .map(|ib| ib.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

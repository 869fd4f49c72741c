//! Viewport bounds and a spatial index over loaded stores.
//!
//! The map asks two questions of the loaded store list outside of
//! reconciliation: which stores lie inside the visible bounds (for the
//! bottom-sheet list), and which store is closest to a tap.

use geo::{Distance, Haversine, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::{GpsPoint, Store};

/// Visible map rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MapBounds {
    pub north_east: GpsPoint,
    pub south_west: GpsPoint,
}

impl MapBounds {
    pub fn new(north_east: GpsPoint, south_west: GpsPoint) -> Self {
        Self { north_east, south_west }
    }

    /// Smallest bounds containing every point.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self::new(*first, *first);
        for p in &points[1..] {
            bounds.north_east.latitude = bounds.north_east.latitude.max(p.latitude);
            bounds.north_east.longitude = bounds.north_east.longitude.max(p.longitude);
            bounds.south_west.latitude = bounds.south_west.latitude.min(p.latitude);
            bounds.south_west.longitude = bounds.south_west.longitude.min(p.longitude);
        }
        Some(bounds)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: GpsPoint) -> bool {
        point.latitude >= self.south_west.latitude
            && point.latitude <= self.north_east.latitude
            && point.longitude >= self.south_west.longitude
            && point.longitude <= self.north_east.longitude
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.south_west.latitude, self.south_west.longitude],
            [self.north_east.latitude, self.north_east.longitude],
        )
    }
}

/// A store position with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedStore {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedStore {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedStore {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// R-tree over one fetch's store list.
pub struct StoreIndex {
    stores: Vec<Store>,
    tree: RTree<IndexedStore>,
}

impl StoreIndex {
    /// Stores with invalid coordinates are kept in the list but not indexed.
    pub fn new(stores: Vec<Store>) -> Self {
        let points: Vec<IndexedStore> = stores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.position().is_valid())
            .map(|(idx, s)| IndexedStore { idx, lat: s.latitude, lng: s.longitude })
            .collect();
        Self {
            stores,
            tree: RTree::bulk_load(points),
        }
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Stores inside `bounds`, in input order.
    pub fn in_bounds(&self, bounds: &MapBounds) -> Vec<&Store> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&bounds.envelope())
            .map(|p| p.idx)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|idx| &self.stores[idx]).collect()
    }

    /// Nearest store to `point` and its great-circle distance in meters.
    ///
    /// Nearness is decided in degree space, which is accurate enough at tap
    /// scale.
    pub fn nearest(&self, point: GpsPoint) -> Option<(&Store, f64)> {
        let nearest = self.tree.nearest_neighbor(&[point.latitude, point.longitude])?;
        let store = &self.stores[nearest.idx];
        let meters = Haversine::distance(
            Point::new(point.longitude, point.latitude),
            Point::new(store.longitude, store.latitude),
        );
        Some((store, meters))
    }
}

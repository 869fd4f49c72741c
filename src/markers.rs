//! Marker-set reconciliation.
//!
//! Keeps the live markers on a platform map in sync with the markers implied
//! by the current store list and zoom tier. Markers are pooled by identity
//! (store id or cluster name) and reused across passes: an unchanged marker
//! receives no calls at all, a changed one only the setters whose field
//! changed. Markers that drop out of the desired set are hidden and released.
//!
//! The map SDK is reached only through [`MapMarker`] and [`MarkerFactory`],
//! so the same reconciler drives any map provider.
//!
//! ```
//! use poppool_map_core::{GpsPoint, MapMarker, MarkerData, MarkerFactory, MarkerIcon, MarkerKey,
//!                        MarkerReconciler, Store};
//!
//! #[derive(Default)]
//! struct PrintMarker { visible: bool }
//!
//! impl MapMarker for PrintMarker {
//!     fn set_position(&mut self, _position: GpsPoint) {}
//!     fn set_icon(&mut self, _icon: &MarkerIcon) {}
//!     fn set_visible(&mut self, visible: bool) { self.visible = visible; }
//!     fn set_user_data(&mut self, _data: &MarkerData) {}
//! }
//!
//! struct Factory;
//!
//! impl MarkerFactory for Factory {
//!     type Marker = PrintMarker;
//!     fn create_marker(&mut self, _key: &MarkerKey) -> PrintMarker { PrintMarker::default() }
//! }
//!
//! let stores = vec![Store::new(1, "Pop-up", "서울특별시 성동구 연무장길 1", 37.5445, 127.0560)];
//! let mut reconciler = MarkerReconciler::new(Factory);
//!
//! let report = reconciler.reconcile(&stores, 15.0);
//! assert_eq!(report.created, 1);
//! assert!(reconciler.marker(&MarkerKey::Store(1)).unwrap().visible);
//! ```

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clustering::{Cluster, ClusterOutcome, ClusteringManager, DroppedStore};
use crate::regions::RegionCatalog;
use crate::zoom::ZoomLevel;
use crate::{GpsPoint, Store};

/// Scale applied to coordinates before truncating them into a location key.
/// 1e5 degrees is roughly one meter.
pub const COORDINATE_SCALE: f64 = 1e5;

// =============================================================================
// Platform seam
// =============================================================================

/// Identity of a live marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerKey {
    /// Individual or multi-store marker, keyed by the (first) store id.
    /// A co-located group takes the id of whichever store the fetch listed
    /// first, so a reordered response re-keys the marker.
    Store(i64),
    /// Cluster marker, keyed by region name
    Cluster(String),
}

impl std::fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKey::Store(id) => write!(f, "store:{}", id),
            MarkerKey::Cluster(name) => write!(f, "cluster:{}", name),
        }
    }
}

/// Visual payload of a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MarkerIcon {
    pub selected: bool,
    pub is_cluster: bool,
    pub label: String,
    /// Stores behind the marker (badge)
    pub count: u32,
}

/// What a marker stands for, attached as user data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MarkerData {
    Single { store: Store },
    /// Several stores sharing one coordinate
    CoLocated { stores: Vec<Store> },
    Clustered { cluster: Cluster },
}

/// A map marker owned by the platform map SDK.
pub trait MapMarker {
    fn set_position(&mut self, position: GpsPoint);
    fn set_icon(&mut self, icon: &MarkerIcon);
    /// Attach to (`true`) or detach from (`false`) the map
    fn set_visible(&mut self, visible: bool);
    fn set_user_data(&mut self, data: &MarkerData);
}

/// Creates platform markers on demand.
///
/// New markers are configured by the reconciler right after creation
/// (position, icon, user data, then shown), so factories only allocate.
pub trait MarkerFactory {
    type Marker: MapMarker;

    fn create_marker(&mut self, key: &MarkerKey) -> Self::Marker;
}

// =============================================================================
// Location grouping
// =============================================================================

/// Fixed-precision coordinate key: both axes scaled and truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationKey {
    pub lat: i64,
    pub lng: i64,
}

impl LocationKey {
    pub fn from_point(point: GpsPoint, scale: f64) -> Self {
        Self {
            lat: (point.latitude * scale).trunc() as i64,
            lng: (point.longitude * scale).trunc() as i64,
        }
    }
}

/// Stores sharing one location key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationGroup {
    pub key: LocationKey,
    /// Position of the first store in the group
    pub position: GpsPoint,
    pub stores: Vec<Store>,
}

/// Group stores by location key, in first-appearance order.
///
/// Repeated store ids are kept once, so the same store arriving from two
/// fetches never turns a single marker into a multi-store one.
pub fn group_by_location(stores: &[Store], scale: f64) -> Vec<LocationGroup> {
    let mut groups: Vec<LocationGroup> = Vec::new();
    let mut index: HashMap<LocationKey, usize> = HashMap::new();
    let mut seen_ids = HashSet::with_capacity(stores.len());

    for store in stores {
        if !seen_ids.insert(store.id) {
            continue;
        }
        let position = store.position();
        let key = LocationKey::from_point(position, scale);
        match index.get(&key) {
            Some(&idx) => groups[idx].stores.push(store.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(LocationGroup { key, position, stores: vec![store.clone()] });
            }
        }
    }

    groups
}

// =============================================================================
// Reconciler
// =============================================================================

/// Reconciler settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ReconcileConfig {
    /// Coordinate scale for location grouping. Default: 1e5
    pub coordinate_scale: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { coordinate_scale: COORDINATE_SCALE }
    }
}

/// What happened to the selected marker during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SelectionChange {
    /// Nothing was selected
    None,
    /// The selected marker survived the pass
    Kept,
    /// The selected marker's key vanished; tooltips and carousels bound to it
    /// must be torn down
    Invalidated,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ReconcileReport {
    pub tier: ZoomLevel,
    pub created: u32,
    /// Reused markers that received at least one setter call
    pub updated: u32,
    /// Reused markers left untouched
    pub unchanged: u32,
    pub removed: u32,
    pub selection: SelectionChange,
    /// The tier has no clustering branch, so nothing was rendered
    pub unsupported_tier: bool,
    /// Stores clustering could not place
    pub dropped: Vec<DroppedStore>,
}

impl ReconcileReport {
    fn new(tier: ZoomLevel) -> Self {
        Self {
            tier,
            created: 0,
            updated: 0,
            unchanged: 0,
            removed: 0,
            selection: SelectionChange::None,
            unsupported_tier: false,
            dropped: Vec::new(),
        }
    }
}

struct DesiredMarker {
    key: MarkerKey,
    position: GpsPoint,
    icon: MarkerIcon,
    data: MarkerData,
}

impl DesiredMarker {
    fn from_group(mut group: LocationGroup) -> Self {
        let first = &group.stores[0];
        let key = MarkerKey::Store(first.id);
        if group.stores.len() == 1 {
            let store = group.stores.remove(0);
            Self {
                key,
                position: group.position,
                icon: MarkerIcon {
                    selected: false,
                    is_cluster: false,
                    label: store.name.clone(),
                    count: 1,
                },
                data: MarkerData::Single { store },
            }
        } else {
            Self {
                key,
                position: group.position,
                icon: MarkerIcon {
                    selected: false,
                    is_cluster: false,
                    label: first.name.clone(),
                    count: group.stores.len() as u32,
                },
                data: MarkerData::CoLocated { stores: group.stores },
            }
        }
    }

    fn from_cluster(cluster: Cluster) -> Self {
        Self {
            key: MarkerKey::Cluster(cluster.name.clone()),
            position: cluster.anchor,
            icon: MarkerIcon {
                selected: false,
                is_cluster: true,
                label: cluster.name.clone(),
                count: cluster.store_count,
            },
            data: MarkerData::Clustered { cluster },
        }
    }
}

struct LiveMarker<M> {
    marker: M,
    position: GpsPoint,
    icon: MarkerIcon,
    data: MarkerData,
}

impl<M: MapMarker> LiveMarker<M> {
    fn create(mut marker: M, desired: DesiredMarker) -> Self {
        marker.set_position(desired.position);
        marker.set_icon(&desired.icon);
        marker.set_user_data(&desired.data);
        marker.set_visible(true);
        Self {
            marker,
            position: desired.position,
            icon: desired.icon,
            data: desired.data,
        }
    }

    /// Push only the fields that differ. Returns true if anything changed.
    fn apply(&mut self, desired: DesiredMarker) -> bool {
        let mut changed = false;
        if self.position != desired.position {
            self.marker.set_position(desired.position);
            self.position = desired.position;
            changed = true;
        }
        if self.icon != desired.icon {
            self.marker.set_icon(&desired.icon);
            self.icon = desired.icon;
            changed = true;
        }
        if self.data != desired.data {
            self.marker.set_user_data(&desired.data);
            self.data = desired.data;
            changed = true;
        }
        changed
    }

    fn set_selected(&mut self, selected: bool) {
        if self.icon.selected != selected {
            self.icon.selected = selected;
            self.marker.set_icon(&self.icon);
        }
    }
}

/// Owns the live markers of one map and reconciles them pass by pass.
///
/// All mutation goes through `&mut self`, so passes can never interleave.
pub struct MarkerReconciler<'c, F: MarkerFactory> {
    factory: F,
    clustering: ClusteringManager<'c>,
    config: ReconcileConfig,
    markers: HashMap<MarkerKey, LiveMarker<F::Marker>>,
    selected: Option<MarkerKey>,
}

impl<F: MarkerFactory> MarkerReconciler<'static, F> {
    /// Reconciler over the built-in region catalog.
    pub fn new(factory: F) -> Self {
        Self::with_catalog(factory, RegionCatalog::builtin(), ReconcileConfig::default())
    }
}

impl<'c, F: MarkerFactory> MarkerReconciler<'c, F> {
    pub fn with_catalog(factory: F, catalog: &'c RegionCatalog, config: ReconcileConfig) -> Self {
        Self {
            factory,
            clustering: ClusteringManager::new(catalog),
            config,
            markers: HashMap::new(),
            selected: None,
        }
    }

    /// Bring the live markers in line with `stores` at `zoom`.
    pub fn reconcile(&mut self, stores: &[Store], zoom: f64) -> ReconcileReport {
        let tier = ZoomLevel::from_zoom(zoom);
        let mut report = ReconcileReport::new(tier);

        let desired: Vec<DesiredMarker> = match self.clustering.cluster_for_tier(stores, tier) {
            ClusterOutcome::Individual => group_by_location(stores, self.config.coordinate_scale)
                .into_iter()
                .map(DesiredMarker::from_group)
                .collect(),
            ClusterOutcome::Clusters { set } => {
                report.dropped = set.dropped;
                set.clusters.into_iter().map(DesiredMarker::from_cluster).collect()
            }
            ClusterOutcome::UnsupportedTier { .. } => {
                report.unsupported_tier = true;
                Vec::new()
            }
        };

        let desired_keys: HashSet<MarkerKey> = desired.iter().map(|d| d.key.clone()).collect();

        if let Some(selected) = &self.selected {
            if desired_keys.contains(selected) {
                report.selection = SelectionChange::Kept;
            } else {
                debug!("[Reconciler] Selected marker {} is gone, clearing selection", selected);
                self.selected = None;
                report.selection = SelectionChange::Invalidated;
            }
        }

        for mut want in desired {
            want.icon.selected = self.selected.as_ref() == Some(&want.key);
            match self.markers.get_mut(&want.key) {
                Some(live) => {
                    if live.apply(want) {
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    let key = want.key.clone();
                    let marker = self.factory.create_marker(&key);
                    self.markers.insert(key, LiveMarker::create(marker, want));
                    report.created += 1;
                }
            }
        }

        let stale: Vec<MarkerKey> = self
            .markers
            .keys()
            .filter(|k| !desired_keys.contains(*k))
            .cloned()
            .collect();
        for key in stale {
            if let Some(mut live) = self.markers.remove(&key) {
                live.marker.set_visible(false);
                report.removed += 1;
            }
        }

        debug!(
            "[Reconciler] {} tier: {} created, {} updated, {} unchanged, {} removed ({} live)",
            tier,
            report.created,
            report.updated,
            report.unchanged,
            report.removed,
            self.markers.len()
        );

        report
    }

    /// Select a live marker. Returns false if no marker has this key.
    pub fn select(&mut self, key: &MarkerKey) -> bool {
        if !self.markers.contains_key(key) {
            return false;
        }
        self.clear_selection();
        if let Some(live) = self.markers.get_mut(key) {
            live.set_selected(true);
        }
        self.selected = Some(key.clone());
        true
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take() {
            if let Some(live) = self.markers.get_mut(&previous) {
                live.set_selected(false);
            }
        }
    }

    pub fn selected(&self) -> Option<&MarkerKey> {
        self.selected.as_ref()
    }

    /// Data attached to the selected marker, for tooltips and carousels.
    pub fn selected_data(&self) -> Option<&MarkerData> {
        let key = self.selected.as_ref()?;
        self.markers.get(key).map(|live| &live.data)
    }

    pub fn marker(&self, key: &MarkerKey) -> Option<&F::Marker> {
        self.markers.get(key).map(|live| &live.marker)
    }

    pub fn icon(&self, key: &MarkerKey) -> Option<&MarkerIcon> {
        self.markers.get(key).map(|live| &live.icon)
    }

    /// Live marker keys, sorted.
    pub fn keys(&self) -> Vec<MarkerKey> {
        let mut keys: Vec<MarkerKey> = self.markers.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Detach and release every marker.
    pub fn clear(&mut self) {
        self.selected = None;
        for (_, mut live) in self.markers.drain() {
            live.marker.set_visible(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Position,
        Icon,
        Visible(bool),
        UserData,
    }

    type CallLog = Rc<RefCell<Vec<(usize, Call)>>>;

    struct SpyMarker {
        serial: usize,
        visible: bool,
        icon: Option<MarkerIcon>,
        log: CallLog,
    }

    impl MapMarker for SpyMarker {
        fn set_position(&mut self, _position: GpsPoint) {
            self.log.borrow_mut().push((self.serial, Call::Position));
        }
        fn set_icon(&mut self, icon: &MarkerIcon) {
            self.icon = Some(icon.clone());
            self.log.borrow_mut().push((self.serial, Call::Icon));
        }
        fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
            self.log.borrow_mut().push((self.serial, Call::Visible(visible)));
        }
        fn set_user_data(&mut self, _data: &MarkerData) {
            self.log.borrow_mut().push((self.serial, Call::UserData));
        }
    }

    #[derive(Default)]
    struct SpyFactory {
        created: usize,
        log: CallLog,
    }

    impl MarkerFactory for SpyFactory {
        type Marker = SpyMarker;

        fn create_marker(&mut self, _key: &MarkerKey) -> SpyMarker {
            self.created += 1;
            SpyMarker {
                serial: self.created,
                visible: false,
                icon: None,
                log: Rc::clone(&self.log),
            }
        }
    }

    fn store(id: i64, lat: f64, lng: f64) -> Store {
        Store::new(id, &format!("store-{}", id), "서울특별시 성동구 연무장길", lat, lng)
    }

    fn serial(reconciler: &MarkerReconciler<'_, SpyFactory>, key: &MarkerKey) -> usize {
        reconciler.marker(key).unwrap().serial
    }

    #[test]
    fn test_location_key_truncates() {
        let a = LocationKey::from_point(GpsPoint::new(37.544512, 127.056019), COORDINATE_SCALE);
        let b = LocationKey::from_point(GpsPoint::new(37.544519, 127.056011), COORDINATE_SCALE);
        assert_eq!(a, b);
        assert_eq!(a, LocationKey { lat: 3754451, lng: 12705601 });
    }

    #[test]
    fn test_group_by_location() {
        let stores = vec![
            store(1, 37.5, 127.0),
            store(2, 37.6, 127.1),
            store(3, 37.5, 127.0),
            store(1, 37.5, 127.0),
        ];
        let groups = group_by_location(&stores, COORDINATE_SCALE);
        assert_eq!(groups.len(), 2);
        let ids: Vec<i64> = groups[0].stores.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(groups[1].stores[0].id, 2);
    }

    #[test]
    fn test_colocated_stores_collapse_into_one_marker() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let stores = vec![store(1, 37.5445, 127.0560), store(2, 37.5445, 127.0560)];

        let report = reconciler.reconcile(&stores, 15.0);

        assert_eq!(report.created, 1);
        assert_eq!(reconciler.keys(), vec![MarkerKey::Store(1)]);
        let icon = reconciler.icon(&MarkerKey::Store(1)).unwrap();
        assert_eq!(icon.count, 2);
        assert!(!icon.is_cluster);
        assert!(reconciler.marker(&MarkerKey::Store(1)).unwrap().visible);
    }

    #[test]
    fn test_colocated_key_follows_input_order() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let a = store(1, 37.5445, 127.0560);
        let b = store(2, 37.5445, 127.0560);
        reconciler.reconcile(&[a.clone(), b.clone()], 15.0);
        assert!(reconciler.select(&MarkerKey::Store(1)));

        let report = reconciler.reconcile(&[b, a], 15.0);

        assert_eq!(reconciler.keys(), vec![MarkerKey::Store(2)]);
        assert_eq!((report.created, report.removed), (1, 1));
        assert_eq!(report.selection, SelectionChange::Invalidated);
        assert_eq!(reconciler.icon(&MarkerKey::Store(2)).unwrap().count, 2);
    }

    #[test]
    fn test_adding_one_store_creates_one_marker() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let first = vec![store(1, 37.50, 127.00), store(2, 37.51, 127.01)];
        reconciler.reconcile(&first, 15.0);
        let before = (serial(&reconciler, &MarkerKey::Store(1)), serial(&reconciler, &MarkerKey::Store(2)));
        let calls_before = reconciler.factory().log.borrow().len();

        let mut second = first.clone();
        second.push(store(3, 37.52, 127.02));
        let report = reconciler.reconcile(&second, 15.0);

        assert_eq!(report.created, 1);
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.updated, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(reconciler.factory().created, 3);
        let after = (serial(&reconciler, &MarkerKey::Store(1)), serial(&reconciler, &MarkerKey::Store(2)));
        assert_eq!(before, after);
        // Reused markers received no calls; only the new one was configured
        let log = reconciler.factory().log.borrow();
        assert!(log[calls_before..].iter().all(|(s, _)| *s == 3));
    }

    #[test]
    fn test_stale_markers_are_detached() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        reconciler.reconcile(&[store(1, 37.50, 127.00), store(2, 37.51, 127.01)], 15.0);

        let report = reconciler.reconcile(&[store(2, 37.51, 127.01)], 15.0);

        assert_eq!(report.removed, 1);
        assert_eq!(reconciler.keys(), vec![MarkerKey::Store(2)]);
        let log = reconciler.factory().log.borrow();
        assert_eq!(log.last(), Some(&(1, Call::Visible(false))));
    }

    #[test]
    fn test_changed_marker_updates_in_place() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        reconciler.reconcile(&[store(1, 37.50, 127.00)], 15.0);
        let calls_before = reconciler.factory().log.borrow().len();

        // Same store, second store lands on its coordinate
        let report = reconciler.reconcile(&[store(1, 37.50, 127.00), store(2, 37.50, 127.00)], 15.0);

        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
        assert_eq!(serial(&reconciler, &MarkerKey::Store(1)), 1);
        let log = reconciler.factory().log.borrow();
        let calls: Vec<&Call> = log[calls_before..].iter().map(|(_, c)| c).collect();
        assert_eq!(calls, vec![&Call::Icon, &Call::UserData]);
    }

    #[test]
    fn test_zoom_out_swaps_store_markers_for_clusters() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let stores = vec![store(1, 37.50, 127.00), store(2, 37.51, 127.01)];
        reconciler.reconcile(&stores, 15.0);

        let report = reconciler.reconcile(&stores, 12.0);

        assert_eq!(report.removed, 2);
        assert_eq!(report.created, 1);
        assert_eq!(reconciler.keys(), vec![MarkerKey::Cluster("성동·광진".to_string())]);
        let icon = reconciler.icon(&MarkerKey::Cluster("성동·광진".to_string())).unwrap();
        assert!(icon.is_cluster);
        assert_eq!(icon.count, 2);

        // Same clusters again: nothing to do
        let report = reconciler.reconcile(&stores, 12.5);
        assert_eq!(report.unchanged, 1);
        assert_eq!((report.created, report.updated, report.removed), (0, 0, 0));
    }

    #[test]
    fn test_cluster_marker_sits_on_region_anchor() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        reconciler.reconcile(&[store(1, 37.50, 127.00)], 12.0);
        let key = MarkerKey::Cluster("성동·광진".to_string());
        let anchor = RegionCatalog::builtin().by_name("성동·광진").unwrap().anchor;
        assert!(reconciler.selected_data().is_none());
        assert!(reconciler.select(&key));
        match reconciler.selected_data() {
            Some(MarkerData::Clustered { cluster }) => assert_eq!(cluster.anchor, anchor),
            other => panic!("unexpected data {:?}", other),
        }
    }

    #[test]
    fn test_selection_survives_and_is_invalidated() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let stores = vec![store(1, 37.50, 127.00), store(2, 37.51, 127.01)];
        reconciler.reconcile(&stores, 15.0);

        assert!(reconciler.select(&MarkerKey::Store(1)));
        assert!(reconciler.icon(&MarkerKey::Store(1)).unwrap().selected);
        assert!(!reconciler.select(&MarkerKey::Store(99)));

        let report = reconciler.reconcile(&stores, 15.0);
        assert_eq!(report.selection, SelectionChange::Kept);
        assert!(reconciler.icon(&MarkerKey::Store(1)).unwrap().selected);
        assert_eq!(report.unchanged, 2);

        let report = reconciler.reconcile(&stores[1..], 15.0);
        assert_eq!(report.selection, SelectionChange::Invalidated);
        assert_eq!(reconciler.selected(), None);
        assert!(reconciler.selected_data().is_none());
    }

    #[test]
    fn test_select_moves_highlight() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        reconciler.reconcile(&[store(1, 37.50, 127.00), store(2, 37.51, 127.01)], 15.0);

        reconciler.select(&MarkerKey::Store(1));
        reconciler.select(&MarkerKey::Store(2));

        assert!(!reconciler.icon(&MarkerKey::Store(1)).unwrap().selected);
        assert!(reconciler.icon(&MarkerKey::Store(2)).unwrap().selected);
        assert_eq!(reconciler.marker(&MarkerKey::Store(2)).unwrap().icon.as_ref().map(|i| i.selected), Some(true));

        reconciler.clear_selection();
        assert!(!reconciler.icon(&MarkerKey::Store(2)).unwrap().selected);
    }

    #[test]
    fn test_unsupported_tier_clears_markers() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let stores = vec![store(1, 37.50, 127.00)];
        reconciler.reconcile(&stores, 12.0);

        let report = reconciler.reconcile(&stores, 8.0);

        assert!(report.unsupported_tier);
        assert_eq!(report.removed, 1);
        assert!(reconciler.is_empty());
    }

    #[test]
    fn test_dropped_stores_are_reported() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        let mut outside = store(5, 35.1, 129.0);
        outside.address = "부산광역시 해운대구".to_string();

        let report = reconciler.reconcile(&[store(1, 37.5, 127.0), outside], 12.0);

        assert_eq!(report.created, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].store_id, 5);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let mut reconciler = MarkerReconciler::new(SpyFactory::default());
        reconciler.reconcile(&[store(1, 37.50, 127.00), store(2, 37.51, 127.01)], 15.0);
        reconciler.select(&MarkerKey::Store(2));

        reconciler.clear();

        assert!(reconciler.is_empty());
        assert_eq!(reconciler.selected(), None);
        let hidden = reconciler
            .factory()
            .log
            .borrow()
            .iter()
            .filter(|(_, c)| *c == Call::Visible(false))
            .count();
        assert_eq!(hidden, 2);
    }
}

//! # PopPool Map Core
//!
//! Store clustering and map marker reconciliation for the PopPool pop-up
//! store map, independent of any map SDK.
//!
//! This library provides:
//! - Zoom tier classification (country, region, city, district, detailed)
//! - Region-based store clustering over a declarative Korean region catalog
//! - Identity-keyed marker reconciliation that reuses unchanged markers
//! - Viewport queries over the loaded stores
//!
//! ## Features
//!
//! - **`parallel`** - Resolve store regions in parallel with rayon
//! - **`http`** - Enable HTTP client for viewport store fetching
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use poppool_map_core::{cluster_stores, Store, ZoomLevel};
//!
//! let stores = vec![
//!     Store::new(1, "Pop-up A", "서울특별시 강남구 테헤란로 1", 37.50, 127.04),
//!     Store::new(2, "Pop-up B", "서울특별시 서초구 강남대로 2", 37.49, 127.02),
//!     Store::new(3, "Pop-up C", "부산광역시 해운대구 우동 3", 35.16, 129.16),
//! ];
//!
//! assert_eq!(ZoomLevel::from_zoom(12.0), ZoomLevel::District);
//!
//! for cluster in cluster_stores(&stores, 12.0).clusters() {
//!     println!("{}: {} stores", cluster.name, cluster.store_count);
//! }
//! ```

use serde::{Deserialize, Serialize};

pub mod clustering;
pub mod error;
pub mod markers;
pub mod regions;
pub mod viewport;
pub mod zoom;

// HTTP module for store fetching
#[cfg(feature = "http")]
pub mod http;

pub use clustering::{
    cluster_stores, Cluster, ClusterOutcome, ClusterSet, ClusteringManager, DropReason,
    DroppedStore,
};
pub use error::CatalogError;
#[cfg(feature = "http")]
pub use error::FetchError;
#[cfg(feature = "http")]
pub use http::{FetchConfig, StoreFetcher};
pub use markers::{
    group_by_location, LocationGroup, LocationKey, MapMarker, MarkerData, MarkerFactory,
    MarkerIcon, MarkerKey, MarkerReconciler, ReconcileConfig, ReconcileReport, SelectionChange,
    COORDINATE_SCALE,
};
pub use regions::{Region, RegionCatalog, RegionTier};
pub use viewport::{MapBounds, StoreIndex};
pub use zoom::ZoomLevel;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PopPoolMapCore"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use poppool_map_core::GpsPoint;
/// let point = GpsPoint::new(37.5445, 127.0560); // Seongsu
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A pop-up store as delivered by one fetch.
///
/// Store lists are replaced wholesale on every viewport or filter refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// Full road address, leading with the city or province
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO date (`YYYY-MM-DD`)
    pub start_date: String,
    pub end_date: String,
    pub main_image_url: Option<String>,
}

impl Store {
    /// Store with only the fields clustering and markers need.
    pub fn new(id: i64, name: &str, address: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            category: String::new(),
            address: address.to_string(),
            latitude,
            longitude,
            start_date: String::new(),
            end_date: String::new(),
            main_image_url: None,
        }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};
    use std::sync::{Arc, Mutex};

    /// Map SDK surface implemented in Kotlin/Swift. Markers are addressed by
    /// their key string (`store:<id>` or `cluster:<name>`).
    #[uniffi::export(callback_interface)]
    pub trait MarkerSurfaceCallback: Send + Sync {
        fn create_marker(&self, key: String);
        fn set_position(&self, key: String, position: GpsPoint);
        fn set_icon(&self, key: String, icon: MarkerIcon);
        /// `false` detaches the marker; the platform may release it
        fn set_visible(&self, key: String, visible: bool);
        fn set_user_data(&self, key: String, data: MarkerData);
    }

    type Surface = Arc<Box<dyn MarkerSurfaceCallback>>;

    struct CallbackMarker {
        key: String,
        surface: Surface,
    }

    impl MapMarker for CallbackMarker {
        fn set_position(&mut self, position: GpsPoint) {
            self.surface.set_position(self.key.clone(), position);
        }

        fn set_icon(&mut self, icon: &MarkerIcon) {
            self.surface.set_icon(self.key.clone(), icon.clone());
        }

        fn set_visible(&mut self, visible: bool) {
            self.surface.set_visible(self.key.clone(), visible);
        }

        fn set_user_data(&mut self, data: &MarkerData) {
            self.surface.set_user_data(self.key.clone(), data.clone());
        }
    }

    struct CallbackFactory {
        surface: Surface,
    }

    impl MarkerFactory for CallbackFactory {
        type Marker = CallbackMarker;

        fn create_marker(&mut self, key: &MarkerKey) -> CallbackMarker {
            let key = key.to_string();
            self.surface.create_marker(key.clone());
            CallbackMarker {
                key,
                surface: Arc::clone(&self.surface),
            }
        }
    }

    /// Marker state for one map screen.
    #[derive(uniffi::Object)]
    pub struct MapSession {
        reconciler: Mutex<MarkerReconciler<'static, CallbackFactory>>,
    }

    impl MapSession {
        fn with_reconciler<T>(
            &self,
            f: impl FnOnce(&mut MarkerReconciler<'static, CallbackFactory>) -> T,
        ) -> T {
            let mut guard = self.reconciler.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        }
    }

    #[uniffi::export]
    impl MapSession {
        #[uniffi::constructor]
        pub fn new(surface: Box<dyn MarkerSurfaceCallback>) -> Arc<Self> {
            init_logging();
            info!("[PopPoolMapCore] MapSession created");
            let factory = CallbackFactory { surface: Arc::new(surface) };
            Arc::new(Self {
                reconciler: Mutex::new(MarkerReconciler::new(factory)),
            })
        }

        /// Run one reconciliation pass; marker side effects arrive on the
        /// surface callback before this returns.
        pub fn reconcile(&self, stores: Vec<Store>, zoom: f64) -> ReconcileReport {
            let start = std::time::Instant::now();
            let report = self.with_reconciler(|r| r.reconcile(&stores, zoom));
            debug!(
                "[PopPoolMapCore] reconcile: {} stores at zoom {:.2} in {:?}",
                stores.len(),
                zoom,
                start.elapsed()
            );
            report
        }

        pub fn select_store(&self, store_id: i64) -> bool {
            self.with_reconciler(|r| r.select(&MarkerKey::Store(store_id)))
        }

        pub fn select_cluster(&self, name: String) -> bool {
            self.with_reconciler(|r| r.select(&MarkerKey::Cluster(name)))
        }

        pub fn clear_selection(&self) {
            self.with_reconciler(|r| r.clear_selection())
        }

        /// Payload of the selected marker, for the tooltip or carousel.
        pub fn selected_data(&self) -> Option<MarkerData> {
            self.with_reconciler(|r| r.selected_data().cloned())
        }

        pub fn marker_count(&self) -> u32 {
            self.with_reconciler(|r| r.len() as u32)
        }

        /// Detach every marker, e.g. when the map screen goes away.
        pub fn clear(&self) {
            self.with_reconciler(|r| r.clear())
        }
    }

    /// Classify a camera zoom value.
    #[uniffi::export]
    pub fn zoom_level(zoom: f64) -> ZoomLevel {
        ZoomLevel::from_zoom(zoom)
    }

    /// Camera zoom for tapping a cluster at `tier`.
    #[uniffi::export]
    pub fn ffi_zoom_in_target(tier: ZoomLevel) -> Option<f64> {
        tier.zoom_in_target()
    }

    /// Cluster stores against the built-in region catalog.
    #[uniffi::export]
    pub fn ffi_cluster_stores(stores: Vec<Store>, zoom: f64) -> ClusterOutcome {
        init_logging();
        let start = std::time::Instant::now();
        let outcome = ClusteringManager::default().cluster_stores_parallel(&stores, zoom);
        info!(
            "[PopPoolMapCore] Clustered {} stores into {} clusters in {:?}",
            stores.len(),
            outcome.clusters().len(),
            start.elapsed()
        );
        outcome
    }

    /// Group stores sharing a coordinate.
    #[uniffi::export]
    pub fn ffi_group_by_location(stores: Vec<Store>) -> Vec<LocationGroup> {
        group_by_location(&stores, COORDINATE_SCALE)
    }

    /// Stores inside the visible bounds, in input order.
    #[uniffi::export]
    pub fn ffi_stores_in_bounds(stores: Vec<Store>, bounds: MapBounds) -> Vec<Store> {
        let index = StoreIndex::new(stores);
        index.in_bounds(&bounds).into_iter().cloned().collect()
    }

    /// Store closest to a tapped point
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiNearestStore {
        pub store: Store,
        pub distance_meters: f64,
    }

    /// Store nearest to `point`, if any store has valid coordinates.
    #[uniffi::export]
    pub fn ffi_nearest_store(stores: Vec<Store>, point: GpsPoint) -> Option<FfiNearestStore> {
        let index = StoreIndex::new(stores);
        index.nearest(point).map(|(store, distance_meters)| FfiNearestStore {
            store: store.clone(),
            distance_meters,
        })
    }

    // ========================================================================
    // HTTP Store Fetching (requires "http" feature)
    // ========================================================================

    /// Result of fetching the stores for a viewport
    #[cfg(feature = "http")]
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiFetchResult {
        pub stores: Vec<Store>,
        pub success: bool,
        pub error: Option<String>,
    }

    /// Fetch the stores inside `bounds`, blocking the calling thread.
    #[cfg(feature = "http")]
    #[uniffi::export]
    pub fn ffi_fetch_viewport(
        base_url: String,
        access_token: Option<String>,
        bounds: MapBounds,
        categories: Vec<i64>,
    ) -> FfiFetchResult {
        init_logging();
        let config = crate::http::FetchConfig {
            base_url,
            access_token,
            ..crate::http::FetchConfig::default()
        };
        match crate::http::fetch_viewport_sync(config, bounds, categories) {
            Ok(stores) => FfiFetchResult { stores, success: true, error: None },
            Err(e) => {
                log::warn!("[PopPoolMapCore] Viewport fetch failed: {}", e);
                FfiFetchResult { stores: vec![], success: false, error: Some(e.to_string()) }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[derive(Default)]
        struct RecordingSurface {
            log: Arc<Mutex<Vec<String>>>,
        }

        impl RecordingSurface {
            fn push(&self, entry: String) {
                self.log.lock().unwrap().push(entry);
            }
        }

        impl MarkerSurfaceCallback for RecordingSurface {
            fn create_marker(&self, key: String) {
                self.push(format!("create {}", key));
            }
            fn set_position(&self, key: String, _position: GpsPoint) {
                self.push(format!("position {}", key));
            }
            fn set_icon(&self, key: String, icon: MarkerIcon) {
                self.push(format!("icon {} selected={}", key, icon.selected));
            }
            fn set_visible(&self, key: String, visible: bool) {
                self.push(format!("visible {} {}", key, visible));
            }
            fn set_user_data(&self, key: String, _data: MarkerData) {
                self.push(format!("data {}", key));
            }
        }

        fn drain(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
            std::mem::take(&mut *log.lock().unwrap())
        }

        #[test]
        fn test_session_forwards_marker_calls_to_surface() {
            let surface = RecordingSurface::default();
            let log = Arc::clone(&surface.log);
            let session = MapSession::new(Box::new(surface));
            let stores = vec![
                Store::new(1, "A", "서울특별시 강남구 테헤란로 1", 37.50, 127.04),
                Store::new(2, "B", "서울특별시 마포구 양화로 45", 37.55, 126.92),
            ];

            let report = session.reconcile(stores.clone(), 15.0);
            assert_eq!(report.created, 2);
            let calls = drain(&log);
            assert_eq!(
                &calls[..5],
                [
                    "create store:1",
                    "position store:1",
                    "icon store:1 selected=false",
                    "data store:1",
                    "visible store:1 true",
                ]
            );
            assert!(calls.contains(&"visible store:2 true".to_string()));

            assert!(session.select_store(1));
            assert!(!session.select_store(99));
            assert_eq!(drain(&log), vec!["icon store:1 selected=true"]);

            // Unchanged pass leaves the surface alone
            session.reconcile(stores.clone(), 15.0);
            assert!(drain(&log).is_empty());

            let report = session.reconcile(stores, 10.0);
            assert_eq!(report.selection, SelectionChange::Invalidated);
            let calls = drain(&log);
            assert!(calls.contains(&"create cluster:서울 남부".to_string()));
            assert!(calls.contains(&"create cluster:서울 북부".to_string()));
            assert!(calls.contains(&"visible store:1 false".to_string()));
            assert!(calls.contains(&"visible store:2 false".to_string()));
            assert!(session.selected_data().is_none());
            assert_eq!(session.marker_count(), 2);

            session.clear();
            let mut calls = drain(&log);
            calls.sort();
            assert_eq!(calls, vec!["visible cluster:서울 남부 false", "visible cluster:서울 북부 false"]);
            assert_eq!(session.marker_count(), 0);
        }

        #[test]
        fn test_nearest_store_export() {
            let stores = vec![
                Store::new(1, "A", "서울특별시 성동구", 37.5445, 127.0560),
                Store::new(2, "B", "서울특별시 중구", 37.5665, 126.9780),
            ];
            let nearest = ffi_nearest_store(stores, GpsPoint::new(37.5665, 126.9781)).unwrap();
            assert_eq!(nearest.store.id, 2);
            assert!(nearest.distance_meters < 20.0);
            assert!(ffi_nearest_store(vec![], GpsPoint::new(37.5, 127.0)).is_none());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

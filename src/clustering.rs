//! Store clustering by region.
//!
//! Groups the loaded stores into named regional buckets for the current zoom
//! tier. Each bucket is drawn at its region's fixed anchor, so clusters stay
//! put no matter which stores populate them.
//!
//! Stores that cannot be placed are not errors. They are reported in
//! [`ClusterSet::dropped`] with the reason, and the Region tier (which has no
//! breakdown of its own) comes back as [`ClusterOutcome::UnsupportedTier`]
//! rather than as an empty result.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::regions::{Region, RegionCatalog, RegionTier};
use crate::zoom::ZoomLevel;
use crate::{GpsPoint, Store};

/// A region paired with the loaded stores that fall into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Cluster {
    pub region_id: String,
    /// Display label, also the marker key
    pub name: String,
    pub anchor: GpsPoint,
    pub tier: RegionTier,
    pub store_ids: Vec<i64>,
    pub store_count: u32,
}

/// Why a store is missing from every cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropReason {
    /// No catalog region matches the address
    NoMatchingRegion,
    /// The store's area has no breakdown at this tier
    UnsupportedRegion { area: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DroppedStore {
    pub store_id: i64,
    pub reason: DropReason,
}

/// Clusters for one pass, plus the stores that didn't make it into any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ClusterSet {
    pub tier: ZoomLevel,
    /// Non-empty buckets in catalog order
    pub clusters: Vec<Cluster>,
    pub dropped: Vec<DroppedStore>,
}

/// Result of a clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ClusterOutcome {
    Clusters { set: ClusterSet },
    /// Detailed tier: render individual markers instead
    Individual,
    /// Tier with no clustering branch
    UnsupportedTier { tier: ZoomLevel },
}

impl ClusterOutcome {
    /// Clusters to render, empty for the non-cluster variants.
    pub fn clusters(&self) -> &[Cluster] {
        match self {
            ClusterOutcome::Clusters { set } => &set.clusters,
            _ => &[],
        }
    }

    pub fn dropped(&self) -> &[DroppedStore] {
        match self {
            ClusterOutcome::Clusters { set } => &set.dropped,
            _ => &[],
        }
    }
}

/// Clusters stores against a region catalog.
#[derive(Debug, Clone, Copy)]
pub struct ClusteringManager<'a> {
    catalog: &'a RegionCatalog,
}

impl Default for ClusteringManager<'static> {
    fn default() -> Self {
        Self::new(RegionCatalog::builtin())
    }
}

impl<'a> ClusteringManager<'a> {
    pub fn new(catalog: &'a RegionCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a RegionCatalog {
        self.catalog
    }

    /// Cluster stores for a camera zoom value.
    pub fn cluster_stores(&self, stores: &[Store], zoom: f64) -> ClusterOutcome {
        self.cluster_for_tier(stores, ZoomLevel::from_zoom(zoom))
    }

    /// Cluster stores for an already classified tier.
    pub fn cluster_for_tier(&self, stores: &[Store], tier: ZoomLevel) -> ClusterOutcome {
        match tier {
            ZoomLevel::Detailed => ClusterOutcome::Individual,
            ZoomLevel::Region => {
                debug!("[Clustering] No clustering for {} tier ({} stores)", tier, stores.len());
                ClusterOutcome::UnsupportedTier { tier }
            }
            ZoomLevel::Country | ZoomLevel::City | ZoomLevel::District => {
                let resolved: Vec<(i64, Result<&Region, DropReason>)> = unique_stores(stores)
                    .map(|s| (s.id, self.resolve(tier, &s.address)))
                    .collect();
                ClusterOutcome::Clusters { set: self.bucket(tier, resolved) }
            }
        }
    }

    /// Same result as [`cluster_stores`](Self::cluster_stores), resolving
    /// addresses on the rayon pool. Worth it for large store lists.
    #[cfg(feature = "parallel")]
    pub fn cluster_stores_parallel(&self, stores: &[Store], zoom: f64) -> ClusterOutcome {
        use rayon::prelude::*;

        let tier = ZoomLevel::from_zoom(zoom);
        if !matches!(tier, ZoomLevel::Country | ZoomLevel::City | ZoomLevel::District) {
            return self.cluster_for_tier(stores, tier);
        }

        let unique: Vec<&Store> = unique_stores(stores).collect();
        let resolved: Vec<(i64, Result<&Region, DropReason>)> = unique
            .par_iter()
            .map(|s| (s.id, self.resolve(tier, &s.address)))
            .collect();
        ClusterOutcome::Clusters { set: self.bucket(tier, resolved) }
    }

    /// Region a store address belongs to at `tier`.
    fn resolve(&self, tier: ZoomLevel, address: &str) -> Result<&'a Region, DropReason> {
        let catalog = self.catalog;
        match tier {
            ZoomLevel::Country => catalog
                .country_region_for(address)
                .ok_or(DropReason::NoMatchingRegion),
            ZoomLevel::City => {
                let area = catalog.area_for(address).ok_or(DropReason::NoMatchingRegion)?;
                if catalog.has_halves(&area.id) {
                    catalog
                        .half_for(&area.id, address)
                        .ok_or(DropReason::NoMatchingRegion)
                } else if area.tier == RegionTier::Metropolitan {
                    Ok(area)
                } else {
                    debug!("[Clustering] {} has no {} breakdown: {}", area.name, tier, address);
                    Err(DropReason::UnsupportedRegion { area: area.name.clone() })
                }
            }
            ZoomLevel::District => {
                let area = catalog.area_for(address).ok_or(DropReason::NoMatchingRegion)?;
                if catalog.has_sub_clusters(&area.id) {
                    catalog
                        .sub_cluster_for(&area.id, address)
                        .ok_or(DropReason::NoMatchingRegion)
                } else {
                    debug!("[Clustering] {} has no {} breakdown: {}", area.name, tier, address);
                    Err(DropReason::UnsupportedRegion { area: area.name.clone() })
                }
            }
            ZoomLevel::Region | ZoomLevel::Detailed => Err(DropReason::NoMatchingRegion),
        }
    }

    fn bucket(
        &self,
        tier: ZoomLevel,
        resolved: Vec<(i64, Result<&'a Region, DropReason>)>,
    ) -> ClusterSet {
        // Keyed by catalog position so output order never depends on hashing
        let mut buckets: BTreeMap<usize, (&Region, Vec<i64>)> = BTreeMap::new();
        let mut dropped = Vec::new();

        for (store_id, result) in resolved {
            match result {
                Ok(region) => {
                    let position = self.catalog.position(&region.id).unwrap_or(usize::MAX);
                    buckets
                        .entry(position)
                        .or_insert_with(|| (region, Vec::new()))
                        .1
                        .push(store_id);
                }
                Err(reason) => dropped.push(DroppedStore { store_id, reason }),
            }
        }

        let clusters: Vec<Cluster> = buckets
            .into_values()
            .map(|(region, store_ids)| Cluster {
                region_id: region.id.clone(),
                name: region.name.clone(),
                anchor: region.anchor,
                tier: region.tier,
                store_count: store_ids.len() as u32,
                store_ids,
            })
            .collect();

        if !dropped.is_empty() {
            debug!(
                "[Clustering] {} tier: {} clusters, {} stores dropped",
                tier,
                clusters.len(),
                dropped.len()
            );
        }

        ClusterSet { tier, clusters, dropped }
    }
}

/// Stores in input order with repeated ids removed.
fn unique_stores(stores: &[Store]) -> impl Iterator<Item = &Store> {
    let mut seen = HashSet::with_capacity(stores.len());
    stores.iter().filter(move |s| seen.insert(s.id))
}

/// Cluster stores against the built-in region catalog.
///
/// # Example
/// ```
/// use poppool_map_core::{cluster_stores, Store};
///
/// let stores = vec![
///     Store::new(1, "Pop-up A", "서울특별시 강남구 테헤란로 1", 37.50, 127.04),
///     Store::new(2, "Pop-up B", "서울특별시 마포구 양화로 45", 37.55, 126.92),
/// ];
///
/// let outcome = cluster_stores(&stores, 10.0);
/// let names: Vec<&str> = outcome.clusters().iter().map(|c| c.name.as_str()).collect();
/// assert_eq!(names, vec!["서울 북부", "서울 남부"]);
/// ```
pub fn cluster_stores(stores: &[Store], zoom: f64) -> ClusterOutcome {
    ClusteringManager::default().cluster_stores(stores, zoom)
}

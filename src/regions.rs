//! Region catalog.
//!
//! Named geographic regions with fixed anchor coordinates and address
//! keywords. The catalog is plain data (`data/regions.json`) so it can be
//! validated and tested independently of the clustering algorithm.
//!
//! ## Address matching
//!
//! Korean addresses lead with the metropolitan city or province
//! ("서울특별시 강남구 ...", "경기도 남양주시 ..."). Matching works on
//! whitespace-separated tokens and compares keywords as token prefixes:
//!
//! - a top-level area (metropolitan city or province) matches when one of its
//!   keywords prefixes the first token;
//! - a child region (sub-cluster or half) is looked up inside its parent area.
//!   The earliest token that any child keyword prefixes decides, and catalog
//!   order breaks ties on the same token.
//!
//! Prefix matching keeps "남양주시" from matching the "양주" keyword, and
//! restricting areas to the first token keeps road names such as "경기대로"
//! from pulling a store into the wrong province.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::GpsPoint;

const BUILTIN_CATALOG: &str = include_str!("../data/regions.json");

static BUILTIN: OnceLock<RegionCatalog> = OnceLock::new();

/// Kind of region, from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum RegionTier {
    /// Multi-district group inside Seoul or Gyeonggi
    SubCluster,
    /// North or south half of Seoul or Gyeonggi
    Half,
    /// Metropolitan or special city
    Metropolitan,
    Province,
}

impl RegionTier {
    /// Metropolitan cities and provinces are the top-level areas.
    pub fn is_top_level(self) -> bool {
        matches!(self, RegionTier::Metropolitan | RegionTier::Province)
    }
}

/// A named geographic grouping with a fixed display anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub tier: RegionTier,
    /// Pre-authored display point, never derived from member stores
    pub anchor: GpsPoint,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Top-level area id for sub-clusters and halves
    #[serde(default)]
    pub parent: Option<String>,
    /// Half that receives every parent member the explicit half doesn't list
    #[serde(default)]
    pub remainder: bool,
}

impl Region {
    fn prefixes(&self, token: &str) -> bool {
        self.keywords.iter().any(|k| token.starts_with(k.as_str()))
    }

    fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent.as_deref() == Some(parent_id)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    regions: Vec<Region>,
}

/// Immutable, validated list of regions.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    by_id: HashMap<String, usize>,
}

impl RegionCatalog {
    /// The catalog shipped with the crate, parsed once per process.
    ///
    /// # Example
    /// ```
    /// use poppool_map_core::RegionCatalog;
    ///
    /// let catalog = RegionCatalog::builtin();
    /// let region = catalog.area_for("서울특별시 강남구 테헤란로 1").unwrap();
    /// assert_eq!(region.id, "seoul");
    /// ```
    pub fn builtin() -> &'static RegionCatalog {
        BUILTIN.get_or_init(|| match RegionCatalog::from_json(BUILTIN_CATALOG) {
            Ok(catalog) => catalog,
            // Embedded at compile time and covered by tests
            Err(e) => panic!("embedded region catalog is invalid: {}", e),
        })
    }

    /// Parse and validate a catalog from JSON (`{"regions": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json).map_err(CatalogError::Parse)?;
        Self::new(file.regions)
    }

    /// Validate a list of regions. Order is significant: it breaks matching
    /// ties and fixes the order clusters are reported in.
    pub fn new(regions: Vec<Region>) -> Result<Self, CatalogError> {
        if regions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut by_id = HashMap::with_capacity(regions.len());
        let mut names = HashSet::with_capacity(regions.len());

        for (idx, region) in regions.iter().enumerate() {
            if by_id.insert(region.id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateId(region.id.clone()));
            }
            if !names.insert(region.name.as_str()) {
                return Err(CatalogError::DuplicateName(region.name.clone()));
            }
            if !region.anchor.is_valid() {
                return Err(CatalogError::InvalidAnchor { id: region.id.clone() });
            }
            if region.remainder && region.tier != RegionTier::Half {
                return Err(CatalogError::InvalidRemainder { id: region.id.clone() });
            }
            if region.keywords.is_empty() && !region.remainder {
                return Err(CatalogError::MissingKeywords { id: region.id.clone() });
            }
        }

        for region in &regions {
            match (&region.parent, region.tier.is_top_level()) {
                (Some(_), true) => {
                    return Err(CatalogError::UnexpectedParent { id: region.id.clone() });
                }
                (None, false) => {
                    return Err(CatalogError::MissingParent { id: region.id.clone() });
                }
                (Some(parent), false) => {
                    let parent_is_area = by_id
                        .get(parent)
                        .map(|&idx| regions[idx].tier.is_top_level())
                        .unwrap_or(false);
                    if !parent_is_area {
                        return Err(CatalogError::UnknownParent {
                            id: region.id.clone(),
                            parent: parent.clone(),
                        });
                    }
                }
                (None, true) => {}
            }
        }

        let catalog = Self { regions, by_id };
        catalog.validate_splits()?;
        Ok(catalog)
    }

    fn validate_splits(&self) -> Result<(), CatalogError> {
        for area in self.top_level() {
            let halves: Vec<&Region> = self.halves(&area.id).collect();
            if halves.is_empty() {
                continue;
            }
            let remainders = halves.iter().filter(|h| h.remainder).count();
            if remainders != 1 {
                return Err(CatalogError::InvalidSplit {
                    parent: area.id.clone(),
                    reason: format!("expected exactly one remainder half, found {}", remainders),
                });
            }
            if halves.len() < 2 {
                return Err(CatalogError::InvalidSplit {
                    parent: area.id.clone(),
                    reason: "remainder half has no explicit counterpart".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// All regions in catalog order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.by_id.get(id).map(|&idx| &self.regions[idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Catalog position of a region, used to order clusters.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Metropolitan cities and provinces.
    pub fn top_level(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.tier.is_top_level())
    }

    pub fn sub_clusters<'a, 'p>(
        &'a self,
        parent_id: &'p str,
    ) -> impl Iterator<Item = &'a Region> + 'p
    where
        'a: 'p,
    {
        self.regions
            .iter()
            .filter(move |r| r.tier == RegionTier::SubCluster && r.is_child_of(parent_id))
    }

    pub fn halves<'a, 'p>(
        &'a self,
        parent_id: &'p str,
    ) -> impl Iterator<Item = &'a Region> + 'p
    where
        'a: 'p,
    {
        self.regions
            .iter()
            .filter(move |r| r.tier == RegionTier::Half && r.is_child_of(parent_id))
    }

    pub fn has_sub_clusters(&self, parent_id: &str) -> bool {
        self.sub_clusters(parent_id).next().is_some()
    }

    pub fn has_halves(&self, parent_id: &str) -> bool {
        self.halves(parent_id).next().is_some()
    }

    /// Flattened country-tier list: sub-clusters first, then top-level areas.
    pub fn all_clusters(&self) -> Vec<&Region> {
        self.regions
            .iter()
            .filter(|r| r.tier == RegionTier::SubCluster)
            .chain(self.top_level())
            .collect()
    }

    /// Top-level area named by the address.
    ///
    /// The earliest token that a metropolitan or province keyword prefixes
    /// decides, so leading noise such as a country name or a postal code is
    /// skipped while later road names (`경기대로`) never override the area.
    pub fn area_for(&self, address: &str) -> Option<&Region> {
        self.area_match(address).map(|(_, area)| area)
    }

    fn area_match(&self, address: &str) -> Option<(usize, &Region)> {
        address
            .split_whitespace()
            .enumerate()
            .find_map(|(idx, token)| self.top_level().find(|r| r.prefixes(token)).map(|r| (idx, r)))
    }

    /// Index of the first token past the one naming `parent_id`; 0 when the
    /// address never names it.
    fn child_tokens_start(&self, parent_id: &str, address: &str) -> usize {
        let Some(parent) = self.get(parent_id) else {
            return 0;
        };
        address
            .split_whitespace()
            .position(|token| parent.prefixes(token))
            .map_or(0, |idx| idx + 1)
    }

    /// Sub-cluster of `parent_id` that the address falls into.
    pub fn sub_cluster_for(&self, parent_id: &str, address: &str) -> Option<&Region> {
        let candidates: Vec<&Region> = self.sub_clusters(parent_id).collect();
        let start = self.child_tokens_start(parent_id, address);
        earliest_token_match(&candidates, address, start)
    }

    /// Half of `parent_id` that the address falls into. Addresses the
    /// explicit half doesn't list land in the remainder half.
    pub fn half_for(&self, parent_id: &str, address: &str) -> Option<&Region> {
        let (remainder, explicit): (Vec<&Region>, Vec<&Region>) =
            self.halves(parent_id).partition(|h| h.remainder);
        let start = self.child_tokens_start(parent_id, address);
        earliest_token_match(&explicit, address, start).or_else(|| remainder.first().copied())
    }

    /// First match over [`all_clusters`](Self::all_clusters).
    pub fn country_region_for(&self, address: &str) -> Option<&Region> {
        let (idx, area) = self.area_match(address)?;
        let candidates: Vec<&Region> = self.sub_clusters(&area.id).collect();
        earliest_token_match(&candidates, address, idx + 1).or(Some(area))
    }
}

/// Earliest address token from `start` on that a candidate keyword
/// prefixes. Ties on one token go to the first candidate.
fn earliest_token_match<'a>(
    candidates: &[&'a Region],
    address: &str,
    start: usize,
) -> Option<&'a Region> {
    address
        .split_whitespace()
        .skip(start)
        .find_map(|token| candidates.iter().find(|r| r.prefixes(token)).copied())
}

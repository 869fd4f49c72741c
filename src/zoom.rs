//! Zoom tier classification.
//!
//! Every camera zoom value maps to exactly one of five ordered tiers. The
//! tier decides whether the map shows clusters or individual store markers.
//!
//! | Zoom          | Tier       | Rendering                       |
//! |---------------|------------|---------------------------------|
//! | `< 7`         | Country    | clusters over the full catalog  |
//! | `[7, 9)`      | Region     | unsupported by clustering       |
//! | `[9, 11)`     | City       | north/south halves, metro cities |
//! | `[11, 14)`    | District   | Seoul / Gyeonggi sub-clusters   |
//! | `>= 14`       | Detailed   | individual markers              |

use serde::{Deserialize, Serialize};

/// Lower bound of the Region tier.
pub const REGION_MIN_ZOOM: f64 = 7.0;
/// Lower bound of the City tier.
pub const CITY_MIN_ZOOM: f64 = 9.0;
/// Lower bound of the District tier.
pub const DISTRICT_MIN_ZOOM: f64 = 11.0;
/// Lower bound of the Detailed tier.
pub const DETAILED_MIN_ZOOM: f64 = 14.0;

/// Discrete zoom band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum ZoomLevel {
    Country,
    Region,
    City,
    District,
    Detailed,
}

impl ZoomLevel {
    /// Classify a camera zoom value.
    ///
    /// Thresholds are half-open, so a value sitting exactly on a boundary
    /// belongs to the deeper tier. NaN is treated as fully zoomed out.
    ///
    /// # Example
    /// ```
    /// use poppool_map_core::ZoomLevel;
    ///
    /// assert_eq!(ZoomLevel::from_zoom(6.9), ZoomLevel::Country);
    /// assert_eq!(ZoomLevel::from_zoom(9.0), ZoomLevel::City);
    /// assert_eq!(ZoomLevel::from_zoom(16.5), ZoomLevel::Detailed);
    /// ```
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom.is_nan() || zoom < REGION_MIN_ZOOM {
            ZoomLevel::Country
        } else if zoom < CITY_MIN_ZOOM {
            ZoomLevel::Region
        } else if zoom < DISTRICT_MIN_ZOOM {
            ZoomLevel::City
        } else if zoom < DETAILED_MIN_ZOOM {
            ZoomLevel::District
        } else {
            ZoomLevel::Detailed
        }
    }

    /// True for every tier rendered as clusters.
    pub fn shows_clusters(self) -> bool {
        self != ZoomLevel::Detailed
    }

    /// Zoom the camera should move to when a cluster at this tier is tapped.
    ///
    /// The Region tier has no cluster breakdown of its own, so it jumps
    /// straight to City like Country does.
    pub fn zoom_in_target(self) -> Option<f64> {
        match self {
            ZoomLevel::Country | ZoomLevel::Region => Some(10.0),
            ZoomLevel::City => Some(12.0),
            ZoomLevel::District => Some(DETAILED_MIN_ZOOM),
            ZoomLevel::Detailed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoomLevel::Country => "country",
            ZoomLevel::Region => "region",
            ZoomLevel::City => "city",
            ZoomLevel::District => "district",
            ZoomLevel::Detailed => "detailed",
        }
    }
}

impl std::fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// EPSG codes of the geographic (lon/lat, angular unit) systems we recognise.
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4269, 4258, 4283, 4617, 4674];

/// Coordinate Reference System tag.
///
/// The engine never reprojects; a CRS only travels with grids and point
/// tables so that operations can refuse to combine data from different
/// projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326), the native system of GEDI shots
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// California Albers (EPSG:3310), an equal-area projection in meters
    pub fn california_albers() -> Self {
        Self::from_epsg(3310)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether coordinates in this CRS are longitude/latitude degrees.
    ///
    /// Known EPSG codes are checked against a fixed list; PROJ strings with
    /// `+proj=longlat` and WKT starting with `GEOGCS`/`GEOGCRS` are also
    /// treated as geographic.
    pub fn is_geographic(&self) -> bool {
        if let Some(code) = self.epsg {
            return GEOGRAPHIC_EPSG.contains(&code);
        }
        if let Some(proj) = &self.proj {
            return proj.contains("+proj=longlat") || proj.contains("+proj=latlong");
        }
        if let Some(wkt) = &self.wkt {
            let head = wkt.trim_start();
            return head.starts_with("GEOGCS") || head.starts_with("GEOGCRS");
        }
        false
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison is imperfect but never produces false positives
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Fail with [`Error::CrsMismatch`] unless `actual` is equivalent to `self`.
    pub fn ensure_matches(&self, actual: &CRS) -> Result<()> {
        if self.is_equivalent(actual) {
            Ok(())
        } else {
            Err(Error::CrsMismatch {
                expected: self.identifier(),
                actual: actual.identifier(),
            })
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

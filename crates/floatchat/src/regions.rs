//! Fixed geographic region registry.
//!
//! Maps region names to bounding boxes used for spatial filtering. The table
//! is immutable and loaded once; `bounds` is total over the registered keys.

use serde::{Deserialize, Serialize};

/// Named ocean regions with known bounding boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Equator,
    ArabianSea,
    IndianOcean,
    BayOfBengal,
    SouthAtlantic,
    NorthPacific,
}

/// Bounding box in degrees: (lat_min..lat_max, lon_min..lon_max).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Equator,
        Region::ArabianSea,
        Region::IndianOcean,
        Region::BayOfBengal,
        Region::SouthAtlantic,
        Region::NorthPacific,
    ];

    /// Canonical registry key, e.g. `arabian_sea`.
    pub fn key(&self) -> &'static str {
        match self {
            Region::Equator => "equator",
            Region::ArabianSea => "arabian_sea",
            Region::IndianOcean => "indian_ocean",
            Region::BayOfBengal => "bay_of_bengal",
            Region::SouthAtlantic => "south_atlantic",
            Region::NorthPacific => "north_pacific",
        }
    }

    pub fn bounds(&self) -> RegionBounds {
        let (lat_min, lat_max, lon_min, lon_max) = match self {
            Region::Equator => (-5.0, 5.0, -180.0, 180.0),
            Region::ArabianSea => (5.0, 25.0, 50.0, 75.0),
            Region::IndianOcean => (-40.0, 25.0, 40.0, 120.0),
            Region::BayOfBengal => (5.0, 22.0, 80.0, 95.0),
            Region::SouthAtlantic => (-40.0, 0.0, -50.0, 20.0),
            Region::NorthPacific => (0.0, 60.0, 120.0, -120.0),
        };
        RegionBounds {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Parse a region name, folding case, surrounding whitespace and
    /// space-vs-underscore differences onto the canonical key.
    pub fn parse(name: &str) -> Option<Region> {
        let folded = name.trim().to_lowercase().replace([' ', '-'], "_");
        Region::ALL.into_iter().find(|r| r.key() == folded)
    }

    /// Find the first registered region mentioned in free text.
    pub fn find_in_text(text: &str) -> Option<Region> {
        let lower = text.to_lowercase();
        Region::ALL.into_iter().find(|r| {
            lower.contains(r.key()) || lower.contains(&r.key().replace('_', " "))
        })
    }
}

/// Name-keyed facade over the region table, for callers that work with
/// untrusted strings rather than the enum.
pub struct RegionRegistry;

impl RegionRegistry {
    pub fn bounds(name: &str) -> Option<RegionBounds> {
        Region::parse(name).map(|r| r.bounds())
    }

    pub fn keys() -> Vec<&'static str> {
        Region::ALL.iter().map(|r| r.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_total_over_key_set() {
        for key in RegionRegistry::keys() {
            assert!(RegionRegistry::bounds(key).is_some(), "missing: {}", key);
        }
    }

    #[test]
    fn test_bounds_stable_across_lookups() {
        let a = RegionRegistry::bounds("arabian_sea").unwrap();
        let b = RegionRegistry::bounds("arabian_sea").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lat_min, 5.0);
        assert_eq!(a.lon_max, 75.0);
    }

    #[test]
    fn test_parse_normalizes_case_and_spaces() {
        assert_eq!(Region::parse("Arabian Sea"), Some(Region::ArabianSea));
        assert_eq!(Region::parse("  BAY_OF_BENGAL "), Some(Region::BayOfBengal));
        assert_eq!(Region::parse("coral sea"), None);
    }

    #[test]
    fn test_find_in_text_matches_spaced_form() {
        assert_eq!(
            Region::find_in_text("show floats in the indian ocean"),
            Some(Region::IndianOcean)
        );
        assert_eq!(Region::find_in_text("floats near iceland"), None);
    }
}

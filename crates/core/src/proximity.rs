//! Nearby-location search.
//!
//! Locations store their coordinates as text. They are parsed at query time and any location
//! whose coordinates do not parse, or fall outside the valid latitude/longitude range, is
//! skipped.

use crate::constants::{DEFAULT_RADIUS_KM, EARTH_RADIUS_KM};
use crate::error::{CoreError, CoreResult};
use crate::models::Location;
use crate::store::LocationStore;
use serde::Serialize;
use std::sync::Arc;

/// A location within the search radius.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NearbyLocation {
    pub location: Location,
    pub distance_km: f64,
}

fn valid_coordinate(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Great-circle distance in kilometres between two points given in degrees.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Parses a stored latitude/longitude pair. `None` if either is not a valid coordinate.
pub fn parse_coordinates(latitude: &str, longitude: &str) -> Option<(f64, f64)> {
    let lat: f64 = latitude.trim().parse().ok()?;
    let lng: f64 = longitude.trim().parse().ok()?;
    valid_coordinate(lat, lng).then_some((lat, lng))
}

/// Locations within `radius_km` of the origin, nearest first.
///
/// A non-positive or non-finite radius falls back to 10 km. The radius is inclusive.
pub fn find_nearby(lat: f64, lng: f64, radius_km: f64, locations: &[Location]) -> Vec<NearbyLocation> {
    let radius_km = if radius_km.is_finite() && radius_km > 0.0 {
        radius_km
    } else {
        DEFAULT_RADIUS_KM
    };

    let mut nearby: Vec<NearbyLocation> = locations
        .iter()
        .filter_map(|location| {
            let Some((loc_lat, loc_lng)) =
                parse_coordinates(&location.latitude, &location.longitude)
            else {
                tracing::debug!(id = %location.id, name = %location.name, "skipping location with invalid coordinates");
                return None;
            };
            let distance_km = haversine_km(lat, lng, loc_lat, loc_lng);
            (distance_km <= radius_km).then(|| NearbyLocation {
                location: location.clone(),
                distance_km,
            })
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}

/// Runs nearby searches against the location store.
#[derive(Clone)]
pub struct ProximityService {
    locations: Arc<dyn LocationStore>,
}

impl ProximityService {
    pub fn new(locations: Arc<dyn LocationStore>) -> Self {
        Self { locations }
    }

    /// Locations near `(lat, lng)`. `radius_km` defaults to 10 when absent or non-positive.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the origin is not a valid coordinate, or store
    /// errors from listing locations.
    pub fn nearby(&self, lat: f64, lng: f64, radius_km: Option<f64>) -> CoreResult<Vec<NearbyLocation>> {
        if !valid_coordinate(lat, lng) {
            return Err(CoreError::InvalidInput(format!(
                "origin ({lat}, {lng}) is not a valid coordinate"
            )));
        }
        let locations = self.locations.list_locations()?;
        Ok(find_nearby(
            lat,
            lng,
            radius_km.unwrap_or(DEFAULT_RADIUS_KM),
            &locations,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::RecordId;
    use crate::store::MemoryStore;

    fn location(name: &str, latitude: &str, longitude: &str) -> Location {
        Location {
            id: RecordId::new(),
            name: name.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            description: String::new(),
        }
    }

    #[test]
    fn test_haversine_is_symmetric_and_zero_on_same_point() {
        let nairobi = (-1.2921, 36.8219);
        let mombasa = (-4.0435, 39.6682);
        let there = haversine_km(nairobi.0, nairobi.1, mombasa.0, mombasa.1);
        let back = haversine_km(mombasa.0, mombasa.1, nairobi.0, nairobi.1);

        assert!((there - back).abs() < 1e-9);
        assert!((there - 440.0).abs() < 5.0, "got {there}");
        assert_eq!(haversine_km(nairobi.0, nairobi.1, nairobi.0, nairobi.1), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_parse_coordinates_rejects_garbage_and_out_of_range() {
        assert_eq!(parse_coordinates(" -1.5 ", "36.8"), Some((-1.5, 36.8)));
        assert_eq!(parse_coordinates("abc", "36.8"), None);
        assert_eq!(parse_coordinates("", ""), None);
        assert_eq!(parse_coordinates("91", "0"), None);
        assert_eq!(parse_coordinates("0", "-180.5"), None);
    }

    #[test]
    fn test_find_nearby_sorts_and_skips_invalid() {
        let locations = vec![
            location("far", "0.5", "0"),
            location("broken", "north", "0"),
            location("near", "0.01", "0"),
            location("out of range", "120", "0"),
        ];

        let found = find_nearby(0.0, 0.0, 100.0, &locations);

        let names: Vec<&str> = found.iter().map(|n| n.location.name.as_str()).collect();
        assert_eq!(names, vec!["near", "far"]);
        assert!(found[0].distance_km < found[1].distance_km);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let target = location("edge", "1", "0");
        let exact = haversine_km(0.0, 0.0, 1.0, 0.0);

        assert_eq!(find_nearby(0.0, 0.0, exact, &[target.clone()]).len(), 1);
        assert!(find_nearby(0.0, 0.0, exact - 0.001, &[target]).is_empty());
    }

    #[test]
    fn test_non_positive_radius_defaults_to_ten_km() {
        let locations = vec![location("5km", "0.045", "0"), location("20km", "0.18", "0")];
        for radius in [0.0, -3.0] {
            let found = find_nearby(0.0, 0.0, radius, &locations);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].location.name, "5km");
        }
    }

    #[test]
    fn test_service_rejects_invalid_origin() {
        let store = Arc::new(MemoryStore::new());
        store.insert_location(location("clinic", "0.01", "0")).unwrap();
        let service = ProximityService::new(store);

        assert!(service.nearby(95.0, 0.0, None).unwrap_err().is_validation());
        assert!(service.nearby(0.0, f64::NAN, None).unwrap_err().is_validation());
        assert_eq!(service.nearby(0.0, 0.0, None).unwrap().len(), 1);
    }
}

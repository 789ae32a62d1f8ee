use serde::{Deserialize, Serialize};

/// Mean earth radius used by the host map's spherical geometry helpers.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64, // degrees, north positive
    pub lng: f64, // degrees, east positive
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle destination `distance_m` meters away along `heading_deg`
    /// (clockwise from north). Negative distances travel backward along the
    /// same bearing.
    pub fn offset(self, distance_m: f64, heading_deg: f64) -> Self {
        let angular = distance_m / EARTH_RADIUS_METERS;
        let heading = heading_deg.to_radians();
        let from_lat = self.lat.to_radians();
        let from_lng = self.lng.to_radians();

        let (sin_dist, cos_dist) = angular.sin_cos();
        let (sin_from_lat, cos_from_lat) = from_lat.sin_cos();

        let sin_lat = cos_dist * sin_from_lat + sin_dist * cos_from_lat * heading.cos();
        let d_lng =
            (sin_dist * cos_from_lat * heading.sin()).atan2(cos_dist - sin_from_lat * sin_lat);

        Self {
            lat: sin_lat.clamp(-1.0, 1.0).asin().to_degrees(),
            lng: wrap_longitude((from_lng + d_lng).to_degrees()),
        }
    }

    /// Haversine distance in meters.
    pub fn distance_to(self, other: LatLng) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng * 0.5).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Maps any heading into `[0, 360)`.
pub fn normalize_heading(heading_deg: f64) -> f64 {
    if !heading_deg.is_finite() {
        return 0.0;
    }
    let wrapped = heading_deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

fn wrap_longitude(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 { -180.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn offset_north_moves_latitude_only() {
        let start = LatLng::new(48.8584, 2.2945);
        let moved = start.offset(1_000.0, 0.0);

        assert!(moved.lat > start.lat);
        assert_close(moved.lng, start.lng, 1e-9);
        assert_close(start.distance_to(moved), 1_000.0, 1e-6);
    }

    #[test]
    fn offset_east_at_equator_moves_longitude_only() {
        let start = LatLng::new(0.0, 10.0);
        let moved = start.offset(500.0, 90.0);

        assert_close(moved.lat, 0.0, 1e-9);
        assert!(moved.lng > start.lng);
        assert_close(start.distance_to(moved), 500.0, 1e-6);
    }

    #[test]
    fn negative_distance_travels_backward() {
        let start = LatLng::new(37.7749, -122.4194);
        let forward = start.offset(25.0, 45.0);
        let backward = start.offset(-25.0, 45.0);

        assert!(forward.lat > start.lat && backward.lat < start.lat);
        assert_close(start.distance_to(backward), 25.0, 1e-6);
    }

    #[test]
    fn offset_wraps_across_antimeridian() {
        let start = LatLng::new(0.0, 179.9999);
        let moved = start.offset(1_000.0, 90.0);

        assert!(moved.lng < -179.0);
        assert_close(start.distance_to(moved), 1_000.0, 1e-6);
    }

    #[test]
    fn normalize_heading_stays_in_range() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_close(normalize_heading(-90.0), 270.0, 1e-12);
        assert_close(normalize_heading(725.0), 5.0, 1e-12);
        assert_eq!(normalize_heading(-1e-17), 0.0);
        assert_eq!(normalize_heading(f64::NAN), 0.0);
    }
}

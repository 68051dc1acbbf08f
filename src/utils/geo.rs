use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Moving further than this from the last known location triggers a refetch.
pub const REFRESH_DISTANCE_M: f64 = 50_000.0;

/// Cells per degree of the cache grid. Points that round to the same 0.1° cell
/// share cached prayer times.
const CELLS_PER_DEGREE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Same point snapped to the 0.1° grid used for cache keys.
    pub fn rounded(&self) -> Self {
        Self {
            latitude: round_coord(self.latitude),
            longitude: round_coord(self.longitude),
        }
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_distance(self, other)
    }
}

/// Great-circle distance in metres.
pub fn haversine_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Whether a location update warrants refetching prayer times.
/// No previous location always refreshes; otherwise the move must exceed 50 km.
pub fn should_refresh(old: Option<&Coordinates>, new: &Coordinates) -> bool {
    match old {
        None => true,
        Some(old) => haversine_distance(old, new) > REFRESH_DISTANCE_M,
    }
}

pub fn round_coord(value: f64) -> f64 {
    grid_cell(value) as f64 / CELLS_PER_DEGREE
}

fn grid_cell(value: f64) -> i64 {
    (value * CELLS_PER_DEGREE).round() as i64
}

/// Two points share a cache entry when their rounded difference is under 0.1°
/// on both axes, i.e. they fall in the same grid cell. Compared in whole
/// cells so float noise never merges neighbouring cells.
pub fn same_place(a: &Coordinates, b: &Coordinates) -> bool {
    grid_cell(a.latitude) == grid_cell(b.latitude)
        && grid_cell(a.longitude) == grid_cell(b.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_distance_mecca_medina() {
        let mecca = Coordinates::new(21.4225, 39.8262);
        let medina = Coordinates::new(24.4672, 39.6112);
        let km = haversine_distance(&mecca, &medina) / 1000.0;
        assert!((km - 339.0).abs() < 5.0, "got {} km", km);
    }

    #[test]
    fn test_no_previous_location_always_refreshes() {
        assert!(should_refresh(None, &Coordinates::new(0.0, 0.0)));
        assert!(should_refresh(None, &Coordinates::new(33.69, 73.06)));
    }

    #[test]
    fn test_small_move_does_not_refresh() {
        let old = Coordinates::new(33.6938, 73.0651);
        let new = Coordinates::new(33.7938, 73.0651); // ~11 km north
        assert!(!should_refresh(Some(&old), &new));
    }

    #[test]
    fn test_large_move_refreshes() {
        let islamabad = Coordinates::new(33.6938, 73.0651);
        let lahore = Coordinates::new(31.5204, 74.3587);
        assert!(should_refresh(Some(&islamabad), &lahore));
    }

    #[test]
    fn test_refresh_boundary_is_strict() {
        // Along a meridian the distance is exactly R * dlat.
        let old = Coordinates::new(0.0, 0.0);
        let dlat = (REFRESH_DISTANCE_M / EARTH_RADIUS_M).to_degrees();
        let at = Coordinates::new(dlat, 0.0);
        let d = haversine_distance(&old, &at);
        assert!((d - REFRESH_DISTANCE_M).abs() < 1e-6);

        // Nudge onto either side of the threshold to avoid float noise at equality.
        let below = Coordinates::new(dlat - 1e-7, 0.0);
        let above = Coordinates::new(dlat + 1e-7, 0.0);
        assert!(!should_refresh(Some(&old), &below));
        assert!(should_refresh(Some(&old), &above));
    }

    #[test]
    fn test_round_coord() {
        assert_eq!(round_coord(33.6938), 33.7);
        assert_eq!(round_coord(-6.2088), -6.2);
        assert_eq!(round_coord(73.04), 73.0);
    }

    #[test]
    fn test_same_place_tolerates_gps_jitter() {
        let a = Coordinates::new(33.6938, 73.0651);
        let b = Coordinates::new(33.7012, 73.0702);
        assert!(same_place(&a, &b));

        let c = Coordinates::new(33.8938, 73.0651);
        assert!(!same_place(&a, &c));
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let a = Coordinates::new(lat1, lon1);
            let b = Coordinates::new(lat2, lon2);
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-6, "{} != {}", ab, ba);
        }

        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..90.0, lon in -180.0f64..180.0) {
            let a = Coordinates::new(lat, lon);
            prop_assert_eq!(haversine_distance(&a, &a), 0.0);
        }

        #[test]
        fn distance_never_exceeds_half_circumference(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let d = haversine_distance(&Coordinates::new(lat1, lon1), &Coordinates::new(lat2, lon2));
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1e-3);
        }
    }
}

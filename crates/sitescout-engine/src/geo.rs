//! Great-circle distance and degree/meter conversions.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator).
pub(crate) const METERS_PER_DEGREE: f64 = 111_320.0;

/// Haversine distance between two points, in meters.
#[must_use]
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Degrees of latitude spanned by `meters`.
#[must_use]
pub(crate) fn lat_degrees_for_meters(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Degrees of longitude spanned by `meters` at the given latitude.
/// The cosine is clamped so polar boxes do not blow up the step size.
#[must_use]
pub(crate) fn lng_degrees_for_meters(meters: f64, at_lat: f64) -> f64 {
    let cos_lat = at_lat.to_radians().cos().max(0.01);
    meters / (METERS_PER_DEGREE * cos_lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(haversine_m(52.52, 13.405, 52.52, 13.405) < 1e-6);
    }

    #[test]
    fn berlin_to_hamburg_is_about_255_km() {
        let d = haversine_m(52.5200, 13.4050, 53.5511, 9.9937);
        assert!((d - 255_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = haversine_m(48.1351, 11.5820, 50.9375, 6.9603);
        let b = haversine_m(50.9375, 6.9603, 48.1351, 11.5820);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_m(50.0, 10.0, 51.0, 10.0);
        assert!((d - 111_000.0).abs() < 1_000.0, "got {d}");
    }

    #[test]
    fn lng_step_grows_with_latitude() {
        assert!(lng_degrees_for_meters(1000.0, 60.0) > lng_degrees_for_meters(1000.0, 0.0));
    }
}

//! Great-circle distance helpers

/// Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two WGS84 points, in meters.
///
/// Symmetric, zero at coincident points.
pub fn haversine(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_at_coincident_points() {
        assert_eq!(haversine(53.9, 27.56, 53.9, 27.56), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let d1 = haversine(55.1904, 30.2049, 53.9006, 27.559);
        let d2 = haversine(53.9006, 27.559, 55.1904, 30.2049);
        assert!((d1 - d2).abs() < 1e-4);
    }

    #[test]
    fn test_known_distance_vitebsk_minsk() {
        // Vitebsk to Minsk is roughly 222 km as the crow flies
        let d = haversine(55.1904, 30.2049, 53.9006, 27.559);
        assert!(d > 215_000.0 && d < 230_000.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_short_distance() {
        // ~1.11 km per 0.01 degree of latitude
        let d = haversine(53.90, 27.56, 53.91, 27.56);
        assert!((d - 1_112.0).abs() < 10.0, "unexpected distance: {}", d);
    }
}

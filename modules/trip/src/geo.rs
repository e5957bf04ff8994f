//! Great-circle distance helpers

/// Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two WGS84 points, in meters.
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
    fn test_symmetry() {
        let d1 = haversine(53.9006, 27.559, 52.0976, 23.7341);
        let d2 = haversine(52.0976, 23.7341, 53.9006, 27.559);
        assert!((d1 - d2).abs() < 1e-4);
    }

    #[test]
    fn test_city_block_scale() {
        // ~5 km is the default carrier selection radius; a point 0.04 degrees
        // of latitude away sits just inside it
        let d = haversine(53.90, 27.56, 53.94, 27.56);
        assert!(d > 4_000.0 && d < 5_000.0, "unexpected distance: {}", d);
    }
}

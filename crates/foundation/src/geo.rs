/// WGS84 longitude/latitude in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Wraps longitude into [-180, 180) and clamps latitude to the Web Mercator limit.
    pub fn normalized(self) -> Self {
        let lng = (self.lng + 180.0).rem_euclid(360.0) - 180.0;
        let lat = self.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        Self { lng, lat }
    }
}

pub const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

#[cfg(test)]
mod tests {
    use super::{LngLat, MERCATOR_MAX_LAT};

    #[test]
    fn normalizes_wrapped_longitude_and_polar_latitude() {
        let p = LngLat::new(190.0, 89.0).normalized();
        assert!((p.lng - (-170.0)).abs() < 1e-9);
        assert_eq!(p.lat, MERCATOR_MAX_LAT);
    }
}

/// Camera projection parameters derived from the host view each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub zoom: f64,
    pub fov_degrees: f64,
    pub aspect: f64,
}

pub const BASE_FOV_DEGREES: f64 = 90.0;

impl Projection {
    /// Field of view halves with every zoom level, matching the panorama's
    /// zoom convention.
    pub fn from_zoom(zoom: f64, aspect: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom } else { 0.0 };
        Self {
            zoom,
            fov_degrees: BASE_FOV_DEGREES / 2f64.powf(zoom),
            aspect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fov_halves_per_zoom_level() {
        assert_eq!(Projection::from_zoom(0.0, 1.5).fov_degrees, 90.0);
        assert_eq!(Projection::from_zoom(1.0, 1.5).fov_degrees, 45.0);
        assert_eq!(Projection::from_zoom(2.0, 1.5).fov_degrees, 22.5);
        assert_eq!(Projection::from_zoom(f64::NAN, 1.0).fov_degrees, 90.0);
    }
}

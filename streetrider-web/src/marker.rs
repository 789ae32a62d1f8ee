use macroquad::prelude::*;
use streetrider_core::{EARTH_RADIUS_METERS, LatLng, VehicleId};

#[derive(Debug, Clone)]
pub struct MarkerDrawConfig {
    pub radius_px: f32,
    pub stroke_ratio: f32,         // stroke width as a fraction of radius
    pub line_start_ratio: f32,     // where the heading tick begins, fraction of radius
    pub line_length_ratio: f32,    // tick length as a fraction of radius
    pub line_thickness_ratio: f32, // tick thickness as a fraction of radius
    pub stroke_color: Color,
    pub fill_color: Color,
}

impl MarkerDrawConfig {
    pub fn for_vehicle(vehicle: VehicleId) -> Self {
        let fill_color = match vehicle {
            VehicleId::CarSedan => WHITE,
            VehicleId::CarSport => Color::from_rgba(250, 90, 70, 255),
            VehicleId::BikeRoad => Color::from_rgba(120, 210, 120, 255),
        };
        let radius_px = match vehicle {
            VehicleId::BikeRoad => 9.0,
            _ => 12.0,
        };
        Self {
            radius_px,
            fill_color,
            ..Self::default()
        }
    }
}

impl Default for MarkerDrawConfig {
    fn default() -> Self {
        Self {
            radius_px: 12.0,
            stroke_ratio: 0.4,
            line_start_ratio: 1.0 / 3.0,
            line_length_ratio: 4.0 / 3.0,
            line_thickness_ratio: 0.4,
            stroke_color: BLACK,
            fill_color: WHITE,
        }
    }
}

/// Local equirectangular view centred on `center`. Good for the few hundred
/// metres around the vehicle; distortion grows with distance.
#[derive(Debug, Clone, Copy)]
pub struct MapView {
    pub center: LatLng,
    pub meters_per_pixel: f64,
}

impl MapView {
    pub fn new(center: LatLng, meters_per_pixel: f64) -> Self {
        Self {
            center,
            meters_per_pixel: meters_per_pixel.max(f64::EPSILON),
        }
    }

    /// East/north offset of `position` from the view centre, in metres.
    pub fn local_meters(&self, position: LatLng) -> (f64, f64) {
        let mut d_lng = position.lng - self.center.lng;
        if d_lng > 180.0 {
            d_lng -= 360.0;
        } else if d_lng < -180.0 {
            d_lng += 360.0;
        }
        let east = d_lng.to_radians() * EARTH_RADIUS_METERS * self.center.lat.to_radians().cos();
        let north = (position.lat - self.center.lat).to_radians() * EARTH_RADIUS_METERS;
        (east, north)
    }

    pub fn to_screen(&self, position: LatLng, screen_center: Vec2) -> Vec2 {
        let (east, north) = self.local_meters(position);
        screen_center
            + vec2(
                (east / self.meters_per_pixel) as f32,
                (-north / self.meters_per_pixel) as f32,
            )
    }
}

/// Screen direction for a compass heading (degrees clockwise from north).
pub fn heading_vector(heading_deg: f64) -> Vec2 {
    let radians = heading_deg.to_radians();
    vec2(radians.sin() as f32, -radians.cos() as f32)
}

pub fn draw_vehicle_marker(heading_deg: f64, center_screen: Vec2, config: &MarkerDrawConfig) {
    let radius_px = config.radius_px;
    let stroke_px = (radius_px * config.stroke_ratio).max(1.0);
    let outer_radius_px = radius_px + stroke_px * 0.5;
    let inner_radius_px = (radius_px - stroke_px * 0.5).max(0.0);
    let heading = heading_vector(heading_deg);

    let line_start = center_screen + heading * (radius_px * config.line_start_ratio);
    let line_end = line_start + heading * (radius_px * config.line_length_ratio);
    let line_thickness_px = (radius_px * config.line_thickness_ratio).max(1.0);

    draw_circle(
        center_screen.x,
        center_screen.y,
        outer_radius_px,
        config.stroke_color,
    );
    if inner_radius_px > 0.0 {
        draw_circle(
            center_screen.x,
            center_screen.y,
            inner_radius_px,
            config.fill_color,
        );
    }
    draw_line(
        line_start.x,
        line_start.y,
        line_end.x,
        line_end.y,
        line_thickness_px,
        config.stroke_color,
    );
    draw_circle(
        line_end.x,
        line_end.y,
        line_thickness_px * 0.5,
        config.stroke_color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "{a} != {b}");
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let north = heading_vector(0.0);
        approx(north.x, 0.0);
        approx(north.y, -1.0);

        let east = heading_vector(90.0);
        approx(east.x, 1.0);
        approx(east.y, 0.0);
    }

    #[test]
    fn offset_lands_at_expected_pixels() {
        let center = LatLng::new(48.8584, 2.2945);
        let view = MapView::new(center, 0.5);
        let screen_center = vec2(400.0, 300.0);

        let ahead = center.offset(50.0, 0.0);
        let point = view.to_screen(ahead, screen_center);
        approx(point.x, 400.0);
        assert!((point.y - 200.0).abs() < 0.5, "{}", point.y);

        let right = center.offset(50.0, 90.0);
        let point = view.to_screen(right, screen_center);
        assert!((point.x - 500.0).abs() < 0.5, "{}", point.x);
        assert!((point.y - 300.0).abs() < 0.5, "{}", point.y);
    }

    #[test]
    fn longitude_difference_wraps_across_antimeridian() {
        let view = MapView::new(LatLng::new(0.0, 179.9999), 1.0);
        let (east, _) = view.local_meters(LatLng::new(0.0, -179.9999));
        assert!(east > 0.0 && east < 50.0, "{east}");
    }
}

use streetrider_core::{Projection, RenderSurface, VehicleId};

/// Simulated model fetch time after a vehicle change.
pub const ASSET_LOAD_SECONDS: f64 = 0.6;

/// Overlay the vehicle is drawn on. Tracks the window size, which vehicle
/// model is loaded, and the projection last pushed by the drive loop.
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    width: f32,
    height: f32,
    vehicle: VehicleId,
    asset_ready_at: Option<f64>,
    projection: Option<Projection>,
}

impl OverlaySurface {
    pub fn new(vehicle: VehicleId, now: f64) -> Self {
        let mut surface = Self {
            width: 0.0,
            height: 0.0,
            vehicle,
            asset_ready_at: None,
            projection: None,
        };
        surface.begin_asset_load(vehicle, now);
        surface
    }

    /// Starts (re)loading the model for `vehicle`; the asset reports not
    /// ready until the load delay passes.
    pub fn begin_asset_load(&mut self, vehicle: VehicleId, now: f64) {
        log::info!("loading vehicle model {}", vehicle.model_path());
        self.vehicle = vehicle;
        self.asset_ready_at = Some(now + ASSET_LOAD_SECONDS);
    }

    pub fn update(&mut self, width: f32, height: f32, now: f64) {
        self.width = width;
        self.height = height;
        if self.asset_ready_at.is_some_and(|ready_at| now >= ready_at) {
            log::debug!("vehicle model {} ready", self.vehicle.id());
            self.asset_ready_at = None;
        }
    }

    pub fn vehicle(&self) -> VehicleId {
        self.vehicle
    }

    pub fn projection(&self) -> Option<Projection> {
        self.projection
    }
}

impl RenderSurface for OverlaySurface {
    fn is_ready(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    fn asset_ready(&self) -> bool {
        self.asset_ready_at.is_none()
    }

    fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            f64::from(self.width / self.height)
        } else {
            1.0
        }
    }

    fn apply_projection(&mut self, projection: Projection) {
        self.projection = Some(projection);
    }
}

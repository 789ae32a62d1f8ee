use streetrider_core::{HostCamera, HostError, LatLng, Pose};

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 3.0;

/// Stand-in for a street-level panorama viewer: holds a pose and a zoom
/// level, and can be detached to simulate the viewer going away.
#[derive(Debug, Clone)]
pub struct SimulatedPanorama {
    pose: Pose,
    zoom: f64,
    attached: bool,
    applied: u64,
}

impl SimulatedPanorama {
    pub fn new(start: LatLng, heading: f64) -> Self {
        Self {
            pose: Pose::new(start, heading),
            zoom: MIN_ZOOM,
            attached: true,
            applied: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn toggle_attached(&mut self) -> bool {
        self.attached = !self.attached;
        log::debug!("panorama attached: {}", self.attached);
        self.attached
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn applied_updates(&self) -> u64 {
        self.applied
    }
}

impl HostCamera for SimulatedPanorama {
    fn current_pose(&self) -> Result<Pose, HostError> {
        if !self.attached {
            return Err(HostError::Unavailable("panorama detached".to_string()));
        }
        Ok(self.pose)
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn apply_pose(&mut self, pose: Pose) -> Result<(), HostError> {
        if !self.attached {
            return Err(HostError::Rejected("panorama detached".to_string()));
        }
        self.pose = pose;
        self.applied += 1;
        Ok(())
    }
}

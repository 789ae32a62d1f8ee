use crate::geo::{LatLng, normalize_heading};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: LatLng,
    pub heading: f64, // degrees clockwise from north, [0, 360)
}

impl Pose {
    pub fn new(position: LatLng, heading: f64) -> Self {
        Self {
            position,
            heading: normalize_heading(heading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_heading() {
        let pose = Pose::new(LatLng::new(1.0, 2.0), -30.0);
        assert_eq!(pose.heading, 330.0);
        assert_eq!(pose.position, LatLng::new(1.0, 2.0));
    }
}

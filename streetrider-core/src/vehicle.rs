use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleId {
    #[default]
    CarSedan,
    CarSport,
    BikeRoad,
}

impl VehicleId {
    pub const ALL: [VehicleId; 3] = [VehicleId::CarSedan, VehicleId::CarSport, VehicleId::BikeRoad];

    pub fn id(self) -> &'static str {
        match self {
            VehicleId::CarSedan => "car-sedan",
            VehicleId::CarSport => "car-sport",
            VehicleId::BikeRoad => "bike-road",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            VehicleId::CarSedan => "Sedan",
            VehicleId::CarSport => "Sport",
            VehicleId::BikeRoad => "Road Bike",
        }
    }

    /// Asset path of the vehicle's 3D model, relative to the asset root.
    pub fn model_path(self) -> String {
        format!("assets/models/{}.glb", self.id())
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for VehicleId {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleId::ALL
            .into_iter()
            .find(|vehicle| vehicle.id() == s)
            .ok_or_else(|| SettingsError::UnknownVehicle(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_ids() {
        assert_eq!("car-sport".parse::<VehicleId>().unwrap(), VehicleId::CarSport);
        assert_eq!(VehicleId::BikeRoad.model_path(), "assets/models/bike-road.glb");
    }

    #[test]
    fn rejects_unknown_id() {
        assert!(matches!(
            "hovercraft".parse::<VehicleId>(),
            Err(SettingsError::UnknownVehicle(id)) if id == "hovercraft"
        ));
    }

    #[test]
    fn serde_uses_kebab_case_ids() {
        let json = serde_json::to_string(&VehicleId::CarSedan).unwrap();
        assert_eq!(json, "\"car-sedan\"");
    }
}

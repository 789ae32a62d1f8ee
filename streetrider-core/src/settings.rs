use crate::dynamics::DynamicsParameters;
use crate::error::SettingsError;
use crate::input::KeyBindings;
use crate::vehicle::VehicleId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const KEY_VEHICLE_ID: &str = "vehicleId";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_TURN_SPEED: &str = "turnSpeed";
pub const KEY_MAX_SPEED: &str = "maxSpeed";
pub const KEY_ACCELERATION: &str = "acceleration";
pub const KEY_BRAKING_FORCE: &str = "brakingForce";
pub const KEY_DRAG_COEFFICIENT: &str = "dragCoefficient";
pub const KEY_CONTROLS: &str = "controls";

/// Older stores used these names for the vehicle and binding keys.
const LEGACY_VEHICLE_KEY: &str = "selectedVehicle";
const LEGACY_CONTROLS_KEY: &str = "controlsConfig";

pub const SETTINGS_KEYS: [&str; 8] = [
    KEY_VEHICLE_ID,
    KEY_VOLUME,
    KEY_TURN_SPEED,
    KEY_MAX_SPEED,
    KEY_ACCELERATION,
    KEY_BRAKING_FORCE,
    KEY_DRAG_COEFFICIENT,
    KEY_CONTROLS,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub vehicle_id: VehicleId,
    pub volume: f64,
    pub turn_speed: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub braking_force: f64,
    pub drag_coefficient: f64,
    pub controls: KeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        let dynamics = DynamicsParameters::default();
        Self {
            vehicle_id: VehicleId::default(),
            volume: 0.5,
            turn_speed: dynamics.turn_speed,
            max_speed: dynamics.max_speed,
            acceleration: dynamics.acceleration,
            braking_force: dynamics.braking_force,
            drag_coefficient: dynamics.drag_coefficient,
            controls: KeyBindings::default(),
        }
    }
}

impl Settings {
    pub fn dynamics(&self) -> DynamicsParameters {
        DynamicsParameters {
            turn_speed: self.turn_speed,
            max_speed: self.max_speed,
            acceleration: self.acceleration,
            braking_force: self.braking_force,
            drag_coefficient: self.drag_coefficient,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range(KEY_VOLUME, self.volume, 0.0, 1.0)?;
        check_non_negative(KEY_TURN_SPEED, self.turn_speed)?;
        check_finite(KEY_MAX_SPEED, self.max_speed)?;
        if self.max_speed <= 0.0 {
            return Err(SettingsError::invalid(KEY_MAX_SPEED, "must be greater than 0"));
        }
        check_non_negative(KEY_ACCELERATION, self.acceleration)?;
        check_non_negative(KEY_BRAKING_FORCE, self.braking_force)?;
        check_non_negative(KEY_DRAG_COEFFICIENT, self.drag_coefficient)?;

        if let Some((first, second, code)) = self.controls.duplicate() {
            return Err(SettingsError::DuplicateBinding {
                code: code.to_string(),
                first: first.name(),
                second: second.name(),
            });
        }
        Ok(())
    }

    /// Parses a stored settings document. Missing keys take their defaults;
    /// legacy key names are read only when the current name is absent.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        SettingsPatch::from_json(json)?.apply_to(&Settings::default())
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_map(&self) -> Result<Map<String, Value>, SettingsError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

/// A partial settings update. Present fields overwrite, absent ones keep
/// their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub vehicle_id: Option<VehicleId>,
    pub volume: Option<f64>,
    pub turn_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub braking_force: Option<f64>,
    pub drag_coefficient: Option<f64>,
    pub controls: Option<KeyBindings>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }

    pub fn vehicle(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id: Some(vehicle_id),
            ..Self::default()
        }
    }

    pub fn volume(volume: f64) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(SettingsError::invalid("settings", "expected an object")),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, SettingsError> {
        let mut patch = SettingsPatch::default();

        for (key, value) in map {
            match key.as_str() {
                LEGACY_VEHICLE_KEY if map.contains_key(KEY_VEHICLE_ID) => {}
                LEGACY_CONTROLS_KEY if map.contains_key(KEY_CONTROLS) => {}
                KEY_VEHICLE_ID | LEGACY_VEHICLE_KEY => {
                    let id = value
                        .as_str()
                        .ok_or_else(|| SettingsError::invalid(KEY_VEHICLE_ID, "expected a string"))?;
                    patch.vehicle_id = Some(id.parse()?);
                }
                KEY_VOLUME => patch.volume = Some(number(KEY_VOLUME, value)?),
                KEY_TURN_SPEED => patch.turn_speed = Some(number(KEY_TURN_SPEED, value)?),
                KEY_MAX_SPEED => patch.max_speed = Some(number(KEY_MAX_SPEED, value)?),
                KEY_ACCELERATION => patch.acceleration = Some(number(KEY_ACCELERATION, value)?),
                KEY_BRAKING_FORCE => patch.braking_force = Some(number(KEY_BRAKING_FORCE, value)?),
                KEY_DRAG_COEFFICIENT => {
                    patch.drag_coefficient = Some(number(KEY_DRAG_COEFFICIENT, value)?)
                }
                KEY_CONTROLS | LEGACY_CONTROLS_KEY => {
                    let bindings: KeyBindings = serde_json::from_value(value.clone())
                        .map_err(|err| SettingsError::invalid(KEY_CONTROLS, err.to_string()))?;
                    patch.controls = Some(bindings.with_defaults_for_blank());
                }
                other => log::debug!("ignoring unrecognized settings key {other}"),
            }
        }

        Ok(patch)
    }

    /// Overwrites the present fields on a copy of `current` and validates the
    /// result. `current` is untouched either way.
    pub fn apply_to(&self, current: &Settings) -> Result<Settings, SettingsError> {
        let mut next = current.clone();
        if let Some(vehicle_id) = self.vehicle_id {
            next.vehicle_id = vehicle_id;
        }
        overwrite(&mut next.volume, self.volume);
        overwrite(&mut next.turn_speed, self.turn_speed);
        overwrite(&mut next.max_speed, self.max_speed);
        overwrite(&mut next.acceleration, self.acceleration);
        overwrite(&mut next.braking_force, self.braking_force);
        overwrite(&mut next.drag_coefficient, self.drag_coefficient);
        if let Some(controls) = &self.controls {
            next.controls = controls.clone();
        }

        next.validate()?;
        Ok(next)
    }

    /// Folds a later patch into this one; later values win.
    pub fn merge(&mut self, later: SettingsPatch) {
        if later.vehicle_id.is_some() {
            self.vehicle_id = later.vehicle_id;
        }
        self.volume = later.volume.or(self.volume);
        self.turn_speed = later.turn_speed.or(self.turn_speed);
        self.max_speed = later.max_speed.or(self.max_speed);
        self.acceleration = later.acceleration.or(self.acceleration);
        self.braking_force = later.braking_force.or(self.braking_force);
        self.drag_coefficient = later.drag_coefficient.or(self.drag_coefficient);
        if later.controls.is_some() {
            self.controls = later.controls;
        }
    }
}

fn overwrite(slot: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Accepts JSON numbers and numeric strings, the two shapes form inputs
/// arrive in.
fn number(key: &'static str, value: &Value) -> Result<f64, SettingsError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(SettingsError::invalid(key, format!("{value} is not a number"))),
    }
}

fn check_finite(key: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SettingsError::invalid(key, "must be a finite number"))
    }
}

fn check_non_negative(key: &'static str, value: f64) -> Result<(), SettingsError> {
    check_finite(key, value)?;
    if value < 0.0 {
        return Err(SettingsError::invalid(key, "must not be negative"));
    }
    Ok(())
}

fn check_range(key: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    check_finite(key, value)?;
    if value < min || value > max {
        return Err(SettingsError::invalid(key, format!("must be between {min} and {max}")));
    }
    Ok(())
}

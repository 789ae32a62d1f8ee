//! Vehicle motion model.
//!
//! [`step`] advances a [`MotionState`] by one elapsed time slice. It has no
//! side effects and no hidden state, so identical inputs always produce
//! identical outputs.

use crate::geo::{LatLng, normalize_heading};
use crate::input::ControlInput;
use crate::pose::Pose;
use serde::{Deserialize, Serialize};

/// Coasting speeds below this magnitude (m/s) snap to zero.
pub const STOP_SPEED_THRESHOLD: f64 = 0.1;
/// Fraction of steering authority lost at top speed.
pub const HIGH_SPEED_TURN_REDUCTION: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicsParameters {
    pub turn_speed: f64,       // deg/s at zero speed
    pub max_speed: f64,        // m/s
    pub acceleration: f64,     // m/s^2
    pub braking_force: f64,    // m/s^2
    pub drag_coefficient: f64, // m/s^2 while coasting
}

impl Default for DynamicsParameters {
    fn default() -> Self {
        Self {
            turn_speed: 60.0,
            max_speed: 25.0,
            acceleration: 8.0,
            braking_force: 15.0,
            drag_coefficient: 2.5,
        }
    }
}

impl DynamicsParameters {
    /// Reverse travel is capped at half the forward maximum.
    pub fn reverse_limit(&self) -> f64 {
        -self.max_speed / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub speed: f64,   // m/s, negative while reversing
    pub heading: f64, // degrees clockwise from north, [0, 360)
    pub position: LatLng,
}

impl MotionState {
    /// Stationary state at the host's current pose.
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            speed: 0.0,
            heading: normalize_heading(pose.heading),
            position: pose.position,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            heading: self.heading,
        }
    }
}

/// Steering multiplier for the current speed: 1.0 at rest, 0.3 at or above
/// `max_speed`.
pub fn turn_factor(speed: f64, max_speed: f64) -> f64 {
    let ratio = if max_speed > 0.0 {
        (speed.abs() / max_speed).min(1.0)
    } else {
        1.0
    };
    1.0 - ratio * HIGH_SPEED_TURN_REDUCTION
}

pub fn step(
    state: &MotionState,
    input: ControlInput,
    params: &DynamicsParameters,
    elapsed_seconds: f64,
) -> MotionState {
    let dt = if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
        elapsed_seconds
    } else {
        0.0
    };

    let speed = longitudinal(state.speed, input, params, dt);
    let heading = steer(state.heading, state.speed, speed, input, params, dt);
    let distance = speed * dt;
    let position = if distance != 0.0 {
        state.position.offset(distance, heading)
    } else {
        state.position
    };

    MotionState {
        speed,
        heading,
        position,
    }
}

fn longitudinal(speed: f64, input: ControlInput, params: &DynamicsParameters, dt: f64) -> f64 {
    let next = if input.forward {
        speed + params.acceleration * dt
    } else if input.backward {
        speed - params.braking_force * dt
    } else {
        let coasted = speed - speed.signum() * params.drag_coefficient * dt;
        // drag stops the vehicle, it never pushes it the other way
        if speed == 0.0
            || coasted.signum() != speed.signum()
            || coasted.abs() < STOP_SPEED_THRESHOLD
        {
            0.0
        } else {
            coasted
        }
    };

    // max/min rather than clamp: degenerate limits must not panic
    next.min(params.max_speed).max(params.reverse_limit())
}

/// Authority comes from the speed at the start of the tick, direction from
/// the speed after the longitudinal update.
fn steer(
    heading: f64,
    entry_speed: f64,
    speed: f64,
    input: ControlInput,
    params: &DynamicsParameters,
    dt: f64,
) -> f64 {
    let direction = if speed >= 0.0 { 1.0 } else { -1.0 };
    let rate = params.turn_speed * turn_factor(entry_speed, params.max_speed) * dt * direction;

    let mut next = heading;
    if input.left {
        next -= rate;
    }
    if input.right {
        next += rate;
    }
    normalize_heading(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPSILON,
            "expected {expected}, got {actual}"
        );
    }

    fn state(speed: f64, heading: f64) -> MotionState {
        MotionState {
            speed,
            heading,
            position: LatLng::new(51.5007, -0.1246),
        }
    }

    fn input(forward: bool, backward: bool, left: bool, right: bool) -> ControlInput {
        ControlInput {
            forward,
            backward,
            left,
            right,
        }
    }

    #[test]
    fn forward_accelerates_from_rest() {
        let params = DynamicsParameters::default();
        let next = step(&state(0.0, 0.0), input(true, false, false, false), &params, 1.0);
        assert_close(next.speed, 8.0);
    }

    #[test]
    fn forward_wins_when_both_pedals_held() {
        let params = DynamicsParameters::default();
        let both = step(&state(5.0, 0.0), input(true, true, false, false), &params, 0.5);
        let forward = step(&state(5.0, 0.0), input(true, false, false, false), &params, 0.5);
        assert_eq!(both, forward);
    }

    #[test]
    fn braking_reverses_down_to_half_max_speed() {
        let params = DynamicsParameters::default();
        let mut current = state(0.0, 0.0);
        for _ in 0..10 {
            current = step(&current, input(false, true, false, false), &params, 1.0);
        }
        assert_close(current.speed, -12.5);
    }

    #[test]
    fn forward_speed_clamps_at_max() {
        let params = DynamicsParameters::default();
        let next = step(&state(24.0, 0.0), input(true, false, false, false), &params, 1.0);
        assert_close(next.speed, 25.0);
    }

    #[test]
    fn coasting_applies_drag_then_stops_without_overshoot() {
        let params = DynamicsParameters::default();
        let first = step(&state(5.0, 0.0), ControlInput::NONE, &params, 1.0);
        assert_close(first.speed, 2.5);

        let second = step(&first, ControlInput::NONE, &params, 1.0);
        assert_eq!(second.speed, 0.0);

        let reversing = step(&state(-1.0, 0.0), ControlInput::NONE, &params, 1.0);
        assert_eq!(reversing.speed, 0.0);
    }

    #[test]
    fn coasting_snaps_tiny_speeds_to_zero() {
        let params = DynamicsParameters {
            drag_coefficient: 0.01,
            ..DynamicsParameters::default()
        };
        let next = step(&state(0.105, 0.0), ControlInput::NONE, &params, 1.0);
        assert_eq!(next.speed, 0.0);

        let slow = step(&state(0.5, 0.0), ControlInput::NONE, &params, 1.0);
        assert_close(slow.speed, 0.49);
    }

    #[test]
    fn turn_factor_spans_full_to_thirty_percent() {
        assert_close(turn_factor(0.0, 25.0), 1.0);
        assert_close(turn_factor(25.0, 25.0), 0.3);
        assert_close(turn_factor(-40.0, 25.0), 0.3);
        assert_close(turn_factor(10.0, 25.0), 0.72);
        assert_close(turn_factor(3.0, 0.0), 0.3);
    }

    #[test]
    fn left_turn_at_speed_uses_reduced_authority() {
        let params = DynamicsParameters::default();
        let next = step(&state(10.0, 90.0), input(false, false, true, false), &params, 1.0);
        // turn factor 1 - 0.4 * 0.7 = 0.72 from the entry speed
        assert_close(next.heading, 46.8);
        assert_close(next.speed, 7.5);
    }

    #[test]
    fn right_turn_mirrors_left() {
        let params = DynamicsParameters::default();
        let next = step(&state(10.0, 90.0), input(false, false, false, true), &params, 1.0);
        assert_close(next.heading, 133.2);
    }

    #[test]
    fn reversing_inverts_steering() {
        let params = DynamicsParameters::default();
        // entry speed -5 gives 1 - 0.2 * 0.7 = 0.86, still reversing after drag
        let left = step(&state(-5.0, 90.0), input(false, false, true, false), &params, 1.0);
        assert!(left.speed < 0.0);
        assert_close(left.heading, 90.0 + 60.0 * 0.86);

        let right = step(&state(-5.0, 90.0), input(false, false, false, true), &params, 1.0);
        assert_close(right.heading, 90.0 - 60.0 * 0.86);
    }

    #[test]
    fn opposite_steering_inputs_cancel() {
        let params = DynamicsParameters::default();
        let next = step(&state(0.0, 10.0), input(false, false, true, true), &params, 1.0);
        assert_close(next.heading, 10.0);
    }

    #[test]
    fn heading_wraps_below_zero() {
        let params = DynamicsParameters::default();
        let next = step(&state(0.0, 10.0), input(false, false, true, false), &params, 1.0);
        assert_close(next.heading, 310.0);
    }

    #[test]
    fn full_turn_returns_to_start_heading() {
        let params = DynamicsParameters::default();
        // 6 seconds at 60 deg/s from rest is exactly one revolution
        let mut current = state(0.0, 123.0);
        for _ in 0..6 {
            current = step(&current, input(false, false, false, true), &params, 1.0);
        }
        assert!((current.heading - 123.0).abs() < 1e-6);
    }

    #[test]
    fn position_unchanged_at_zero_speed() {
        let params = DynamicsParameters::default();
        let start = state(0.0, 45.0);
        let next = step(&start, input(false, false, true, false), &params, 10.0);
        assert_eq!(next.position, start.position);
    }

    #[test]
    fn position_advances_along_heading() {
        let params = DynamicsParameters {
            acceleration: 0.0,
            ..DynamicsParameters::default()
        };
        let start = state(10.0, 0.0);
        let next = step(&start, input(true, false, false, false), &params, 2.0);

        assert!(next.position.lat > start.position.lat);
        assert!((start.position.distance_to(next.position) - 20.0).abs() < 1e-6);
    }

    #[test]
    fn reversing_moves_opposite_to_heading() {
        let params = DynamicsParameters {
            braking_force: 0.0,
            ..DynamicsParameters::default()
        };
        let start = state(-4.0, 0.0);
        let next = step(&start, input(false, true, false, false), &params, 1.0);
        assert!(next.position.lat < start.position.lat);
    }

    #[test]
    fn negative_or_nan_elapsed_is_a_no_op() {
        let params = DynamicsParameters::default();
        let start = state(7.0, 200.0);
        for dt in [-1.0, f64::NAN, f64::INFINITY, 0.0] {
            let next = step(&start, input(true, false, true, false), &params, dt);
            assert_eq!(next, start);
        }
    }

    #[test]
    fn degenerate_max_speed_does_not_panic() {
        let params = DynamicsParameters {
            max_speed: 0.0,
            ..DynamicsParameters::default()
        };
        let next = step(&state(3.0, 0.0), input(true, false, true, false), &params, 1.0);
        assert_eq!(next.speed, 0.0);
        assert!((0.0..360.0).contains(&next.heading));

        let negative = DynamicsParameters {
            max_speed: -10.0,
            ..DynamicsParameters::default()
        };
        let next = step(&state(3.0, 0.0), ControlInput::NONE, &negative, 1.0);
        assert!(next.speed.is_finite());
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let params = DynamicsParameters::default();
        let start = state(12.3, 271.0);
        let controls = input(true, false, false, true);
        let first = step(&start, controls, &params, 0.016);
        let second = step(&start, controls, &params, 0.016);
        assert_eq!(first, second);
    }

    #[test]
    fn random_drives_respect_speed_and_heading_bounds() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let params = DynamicsParameters::default();
        let mut current = state(0.0, 0.0);

        for _ in 0..5_000 {
            let controls = input(rng.bool(), rng.bool(), rng.bool(), rng.bool());
            let dt = rng.f64() * 0.25;
            let previous = current;
            current = step(&current, controls, &params, dt);

            assert!(current.speed <= params.max_speed);
            assert!(current.speed >= params.reverse_limit());
            assert!((0.0..360.0).contains(&current.heading));
            if controls.is_coasting() {
                assert!(current.speed.abs() <= previous.speed.abs());
                let same_sign = current.speed.signum() == previous.speed.signum();
                assert!(current.speed == 0.0 || same_sign);
            }
        }
    }
}

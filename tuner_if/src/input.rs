//! # Operator input
//!
//! One frame of operator input, sampled once per cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of operator input.
pub trait InputDevice {
    /// Sample the device for the current cycle.
    ///
    /// Returns `None` once the device has no more input to give, for example at the end of a
    /// script.
    fn poll(&mut self) -> Option<OperatorInput>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Input frame.
///
/// Button fields are true only on the cycle in which the button was pressed. Axes are in the range
/// [-1, 1].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorInput {
    pub a_pressed: bool,
    pub b_pressed: bool,
    pub x_pressed: bool,
    pub y_pressed: bool,

    /// Stop all output and release the constant output latch
    pub disable_pressed: bool,

    /// Latch constant percent output
    pub run_constant_pressed: bool,

    /// Toggle the solenoids between extended and retracted
    pub extend_solenoid_pressed: bool,

    /// Toggle the compressor
    pub toggle_compressor_pressed: bool,

    /// Percent output axis
    pub throttle_axis: f64,

    /// Velocity axis
    pub velocity_axis: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The four set point buttons, in priority order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPointButton {
    A,
    B,
    X,
    Y
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OperatorInput {
    /// Parse a frame from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// The set point button pressed in this frame, if any.
    ///
    /// If more than one is pressed the first in A, B, X, Y order wins.
    pub fn set_point_pressed(&self) -> Option<SetPointButton> {
        if self.a_pressed {
            Some(SetPointButton::A)
        }
        else if self.b_pressed {
            Some(SetPointButton::B)
        }
        else if self.x_pressed {
            Some(SetPointButton::X)
        }
        else if self.y_pressed {
            Some(SetPointButton::Y)
        }
        else {
            None
        }
    }

    /// The same frame with all buttons released, axes kept.
    pub fn without_presses(&self) -> Self {
        Self {
            throttle_axis: self.throttle_axis,
            velocity_axis: self.velocity_axis,
            ..Self::default()
        }
    }

    /// Whether both axes are finite and within [-1, 1].
    pub fn is_valid(&self) -> bool {
        let in_range = |v: f64| v.is_finite() && v >= -1.0 && v <= 1.0;

        in_range(self.throttle_axis) && in_range(self.velocity_axis)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_partial_frame() {
        let input = OperatorInput::from_json(r#"{"bPressed": true, "throttleAxis": 0.9}"#).unwrap();

        assert_eq!(input.set_point_pressed(), Some(SetPointButton::B));
        assert_eq!(input.throttle_axis, 0.9);
        assert_eq!(input.velocity_axis, 0.0);
        assert!(!input.disable_pressed);
    }

    #[test]
    fn test_set_point_priority() {
        let input = OperatorInput {
            x_pressed: true,
            y_pressed: true,
            ..Default::default()
        };
        assert_eq!(input.set_point_pressed(), Some(SetPointButton::X));
        assert_eq!(OperatorInput::default().set_point_pressed(), None);
    }

    #[test]
    fn test_without_presses() {
        let input = OperatorInput {
            a_pressed: true,
            disable_pressed: true,
            run_constant_pressed: true,
            extend_solenoid_pressed: true,
            toggle_compressor_pressed: true,
            throttle_axis: -0.3,
            velocity_axis: 0.4,
            ..Default::default()
        };
        let held = input.without_presses();

        assert_eq!(held.set_point_pressed(), None);
        assert!(!held.disable_pressed && !held.run_constant_pressed);
        assert!(!held.extend_solenoid_pressed && !held.toggle_compressor_pressed);
        assert_eq!(held.throttle_axis, -0.3);
        assert_eq!(held.velocity_axis, 0.4);
    }

    #[test]
    fn test_validity() {
        assert!(OperatorInput::default().is_valid());
        assert!(!OperatorInput { throttle_axis: 1.5, ..Default::default() }.is_valid());
        assert!(!OperatorInput { velocity_axis: f64::NAN, ..Default::default() }.is_valid());
    }
}

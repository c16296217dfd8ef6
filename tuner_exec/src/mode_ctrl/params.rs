//! Parameters structure for ModeCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use tuner_if::input::SetPointButton;
use crate::params::{ArmFeedForward, RobotTuningConfig};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for mode control, taken from the tuning configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Params {
    /// Set points bound to the A, B, X and Y buttons, in output units.
    pub set_points: [f64; 4],

    pub dead_band: f64,

    pub percent_output_multiplier: f64,

    pub velocity_multiplier: f64,

    /// Percent output while the constant output is latched.
    pub percent_output_run: f64,

    pub hold_set_point: bool,

    /// Velocity commanded at full velocity axis deflection (before the multiplier).
    ///
    /// Units: output units per second
    pub max_velocity: f64,

    /// Base arbitrary feed forward.
    pub base_ff: f64,

    pub arm_feed_forward: Option<ArmFeedForward>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    pub fn from_config(config: &RobotTuningConfig) -> Self {
        Self {
            set_points: [
                config.set_point(SetPointButton::A),
                config.set_point(SetPointButton::B),
                config.set_point(SetPointButton::X),
                config.set_point(SetPointButton::Y)
            ],
            dead_band: config.dead_band,
            percent_output_multiplier: config.percent_output_multiplier,
            velocity_multiplier: config.velocity_multiplier,
            percent_output_run: config.percent_output_run,
            hold_set_point: config.hold_set_point,
            max_velocity: config.master.gains.max_velocity,
            base_ff: config.master.gains.ff,
            arm_feed_forward: config.master.arm_feed_forward,
        }
    }

    pub fn set_point(&self, button: SetPointButton) -> f64 {
        match button {
            SetPointButton::A => self.set_points[0],
            SetPointButton::B => self.set_points[1],
            SetPointButton::X => self.set_points[2],
            SetPointButton::Y => self.set_points[3],
        }
    }
}

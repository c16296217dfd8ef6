//! # REV Spark SDK
//!
//! Controllers of this family run closed loop control and motion profiling onboard, and apply
//! the sensor conversion factors themselves. All positions and velocities passed to or read from
//! the device are in converted (output) units.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{DeviceId, LimitDirection, VendorCode};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A Spark motor controller, as exposed by the vendor SDK.
pub trait SparkDevice {

    /// CAN ID of the device.
    fn device_id(&self) -> DeviceId;

    /// Apply a single configuration parameter.
    fn set_param(&mut self, param: SparkParam) -> Result<(), VendorCode>;

    /// Mirror the output of the leader device, optionally inverted.
    fn follow(&mut self, leader: DeviceId, inverted: bool) -> Result<(), VendorCode>;

    /// Command the device.
    ///
    /// ## Arguments
    /// - `value` - Duty cycle for `DutyCycle`, otherwise a position or velocity in output units
    /// - `control_type` - How `value` is to be interpreted
    /// - `arb_ff` - Arbitrary feed forward, in duty cycle, added to the closed loop output
    fn set_reference(
        &mut self, 
        value: f64, 
        control_type: SparkControlType, 
        arb_ff: f64
    ) -> Result<(), VendorCode>;

    /// Motor output current in amps.
    fn output_current(&self) -> f64;

    /// Encoder position in output units.
    fn encoder_position(&self) -> f64;

    /// Encoder velocity in output units.
    fn encoder_velocity(&self) -> f64;

    /// Applied duty cycle, between -1 and +1.
    fn applied_output(&self) -> f64;

    /// Position conversion factor currently applied by the device.
    fn position_conversion_factor(&self) -> f64;

    /// Velocity conversion factor currently applied by the device.
    fn velocity_conversion_factor(&self) -> f64;

    /// Whether the soft limit in the given direction is enabled.
    fn is_soft_limit_enabled(&self, direction: LimitDirection) -> bool;

    /// Release the device.
    fn close(&mut self);
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Behaviour of the motor when no output is commanded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleMode {
    Brake,
    Coast
}

/// Acceleration profile used by smart motion.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelStrategy {
    Trapezoidal,
    SCurve
}

/// How the reference of `set_reference` is interpreted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparkControlType {
    DutyCycle,
    SmartMotion,
    SmartVelocity
}

/// Configuration parameters of a Spark controller. Closed loop parameters apply to PID slot 0.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum SparkParam {
    FactoryDefaults,
    Inverted(bool),
    IdleMode(IdleMode),
    VoltageCompensation(f64),
    OpenLoopRampRate(f64),
    ClosedLoopRampRate(f64),
    SoftLimitEnabled(LimitDirection, bool),
    SoftLimit(LimitDirection, f64),
    P(f64),
    I(f64),
    D(f64),
    Ff(f64),
    IMaxAccum(f64),
    IZone(f64),
    OutputRange { min: f64, max: f64 },
    SmartMotionAccelStrategy(AccelStrategy),
    SmartMotionMaxVelocity(f64),
    SmartMotionMaxAccel(f64),
    SmartMotionAllowedClosedLoopError(f64),
    SmartMotionMinOutputVelocity(f64),
    PositionConversionFactor(f64),
    VelocityConversionFactor(f64),
    EncoderPosition(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SparkParam {
    /// Human readable name of the parameter, used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            SparkParam::FactoryDefaults => "factory defaults",
            SparkParam::Inverted(_) => "inverted",
            SparkParam::IdleMode(_) => "idle mode",
            SparkParam::VoltageCompensation(_) => "voltage compensation",
            SparkParam::OpenLoopRampRate(_) => "open loop ramp",
            SparkParam::ClosedLoopRampRate(_) => "closed loop ramp",
            SparkParam::SoftLimitEnabled(LimitDirection::Forward, _) => "enable forward soft limit",
            SparkParam::SoftLimitEnabled(LimitDirection::Reverse, _) => "enable reverse soft limit",
            SparkParam::SoftLimit(LimitDirection::Forward, _) => "forward soft limit",
            SparkParam::SoftLimit(LimitDirection::Reverse, _) => "reverse soft limit",
            SparkParam::P(_) => "p",
            SparkParam::I(_) => "i",
            SparkParam::D(_) => "d",
            SparkParam::Ff(_) => "f",
            SparkParam::IMaxAccum(_) => "i max",
            SparkParam::IZone(_) => "i zone",
            SparkParam::OutputRange { .. } => "output range",
            SparkParam::SmartMotionAccelStrategy(_) => "strategy",
            SparkParam::SmartMotionMaxVelocity(_) => "max velocity",
            SparkParam::SmartMotionMaxAccel(_) => "max acceleration",
            SparkParam::SmartMotionAllowedClosedLoopError(_) => "allowable error",
            SparkParam::SmartMotionMinOutputVelocity(_) => "min velocity",
            SparkParam::PositionConversionFactor(_) => "position conversion",
            SparkParam::VelocityConversionFactor(_) => "velocity conversion",
            SparkParam::EncoderPosition(_) => "starting position",
        }
    }
}

//! # CTRE SDK
//!
//! Controllers of this family work in raw sensor units. Conversion to output units is the
//! responsibility of the caller. Closed loop parameters apply to PID slot 0.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{DeviceId, LimitDirection, VendorCode};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A CTRE motor controller, as exposed by the vendor SDK.
pub trait CtreDevice {

    /// CAN ID of the device.
    fn device_id(&self) -> DeviceId;

    /// Hardware model of the device.
    fn model(&self) -> CtreModel;

    /// Apply a single configuration parameter.
    fn set_param(&mut self, param: CtreParam) -> Result<(), VendorCode>;

    /// Mirror the output of the leader device, optionally inverted.
    fn follow(&mut self, leader: DeviceId, inverted: bool) -> Result<(), VendorCode>;

    /// Command the device.
    ///
    /// ## Arguments
    /// - `mode` - How `value` is to be interpreted
    /// - `value` - Percent output, or a position/velocity in raw sensor units
    /// - `arb_ff` - Arbitrary feed forward, in percent output
    fn set(&mut self, mode: CtreControlMode, value: f64, arb_ff: f64) -> Result<(), VendorCode>;

    /// Supply current in amps.
    fn supply_current(&self) -> f64;

    /// Selected sensor position in raw units.
    fn selected_sensor_position(&self) -> f64;

    /// Selected sensor velocity in raw units.
    fn selected_sensor_velocity(&self) -> f64;

    /// Motor output, between -1 and +1.
    fn motor_output_percent(&self) -> f64;

    /// Whether the soft limit in the given direction is enabled.
    fn is_soft_limit_enabled(&self, direction: LimitDirection) -> bool;

    /// Release the device.
    fn close(&mut self);
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// CTRE hardware models.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtreModel {
    TalonFx,
    TalonSrx,
    VictorSpx
}

/// Behaviour of the motor when no output is commanded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutralMode {
    Brake,
    Coast
}

/// How the value passed to `set` is interpreted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtreControlMode {
    Disabled,
    PercentOutput,
    Position,
    Velocity,
    MotionMagic
}

/// Configuration parameters of a CTRE controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum CtreParam {
    FactoryDefault,
    Inverted(bool),
    NeutralMode(NeutralMode),
    VoltageCompSaturation(f64),
    OpenloopRamp(f64),
    ClosedloopRamp(f64),
    SoftLimitEnable(LimitDirection, bool),
    SoftLimitThreshold(LimitDirection, i32),
    KP(f64),
    KI(f64),
    KD(f64),
    KF(f64),
    MaxIntegralAccumulator(f64),
    IntegralZone(i32),
    PeakOutputForward(f64),
    PeakOutputReverse(f64),
    MotionSCurveStrength(i32),
    MotionCruiseVelocity(i32),
    MotionAcceleration(i32),
    AllowableClosedloopError(i32),
    SelectedSensorPosition(i32),
    IntegratedSensorFeedback,
    BootToZero,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtreParam {
    /// Human readable name of the parameter, used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            CtreParam::FactoryDefault => "factory defaults",
            CtreParam::Inverted(_) => "inverted",
            CtreParam::NeutralMode(_) => "neutral mode",
            CtreParam::VoltageCompSaturation(_) => "voltage compensation",
            CtreParam::OpenloopRamp(_) => "open loop ramp",
            CtreParam::ClosedloopRamp(_) => "closed loop ramp",
            CtreParam::SoftLimitEnable(LimitDirection::Forward, _) => "enable forward soft limit",
            CtreParam::SoftLimitEnable(LimitDirection::Reverse, _) => "enable reverse soft limit",
            CtreParam::SoftLimitThreshold(LimitDirection::Forward, _) => "forward soft limit",
            CtreParam::SoftLimitThreshold(LimitDirection::Reverse, _) => "reverse soft limit",
            CtreParam::KP(_) => "p",
            CtreParam::KI(_) => "i",
            CtreParam::KD(_) => "d",
            CtreParam::KF(_) => "f",
            CtreParam::MaxIntegralAccumulator(_) => "i max",
            CtreParam::IntegralZone(_) => "i zone",
            CtreParam::PeakOutputForward(_) => "peak forward output",
            CtreParam::PeakOutputReverse(_) => "peak reverse output",
            CtreParam::MotionSCurveStrength(_) => "s curve",
            CtreParam::MotionCruiseVelocity(_) => "max velocity",
            CtreParam::MotionAcceleration(_) => "max acceleration",
            CtreParam::AllowableClosedloopError(_) => "allowable error",
            CtreParam::SelectedSensorPosition(_) => "starting position",
            CtreParam::IntegratedSensorFeedback => "selected sensor",
            CtreParam::BootToZero => "sensor initialization strategy",
        }
    }
}

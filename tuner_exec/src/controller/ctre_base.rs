//! # CTRE controller base
//!
//! Configuration, commanding and readback shared by the Talon and Victor controllers. CTRE
//! devices work in raw sensor units, so the conversion factors are kept here and applied in
//! software: readbacks are multiplied, references and thresholds divided.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{trace, warn};

// Internal
use tuner_if::eqpt::{
    Bus, BusError, CtreControlMode, CtreDevice, CtreModel, CtreParam, DeviceId, LimitDirection,
    NeutralMode
};
use super::{AppliedConfig, ConfigError};
use crate::params::{MechanismConfig, SmartGains};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Strength of the motion magic S-curve, 0 (trapezoidal) to 8 (smoothest).
const MOTION_S_CURVE_STRENGTH: i32 = 3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub(super) struct CtreBase {
    device: Box<dyn CtreDevice>,
    model: CtreModel,

    position_conversion: f64,
    velocity_conversion: f64,

    /// True once `configure` has completed without error
    pub(super) configured: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtreBase {
    pub fn open(bus: &mut dyn Bus, id: DeviceId, model: CtreModel) -> Result<Self, BusError> {
        Ok(Self {
            device: bus.open_ctre(id, model)?,
            model,
            position_conversion: 1.0,
            velocity_conversion: 1.0,
            configured: false
        })
    }

    pub fn id(&self) -> DeviceId {
        self.device.device_id()
    }

    /// Apply one parameter, naming it in the error on failure.
    pub fn set(&mut self, param: CtreParam) -> Result<(), ConfigError> {
        trace!("Device {}: {:?}", self.id(), param);

        let id = self.id();
        self.device.set_param(param).map_err(|vendor_code| ConfigError {
            id,
            which: param.name(),
            vendor_code
        })
    }

    /// Apply the parameters every CTRE mechanism has.
    ///
    /// The starting position is only set if `has_sensor` is true.
    pub fn configure_common(
        &mut self,
        config: &MechanismConfig,
        has_sensor: bool
    ) -> Result<(), ConfigError> {
        self.configured = false;

        self.set(CtreParam::FactoryDefault)?;

        if self.model == CtreModel::TalonFx {
            self.set(CtreParam::IntegratedSensorFeedback)?;
            self.set(CtreParam::BootToZero)?;
        }

        self.set(CtreParam::Inverted(config.is_inverted))?;
        self.set(CtreParam::NeutralMode(match config.is_braked {
            true => NeutralMode::Brake,
            false => NeutralMode::Coast
        }))?;
        self.set(CtreParam::VoltageCompSaturation(config.voltage_compensation))?;
        self.set(CtreParam::OpenloopRamp(config.ramp_rate))?;
        self.set(CtreParam::ClosedloopRamp(config.ramp_rate))?;

        self.position_conversion = config.position_conversion;
        self.velocity_conversion = config.velocity_conversion;

        for (dir, limit) in [
            (LimitDirection::Forward, config.forward_limit),
            (LimitDirection::Reverse, config.reverse_limit)
        ].iter() {
            match limit {
                Some(l) => {
                    self.set(CtreParam::SoftLimitThreshold(*dir, self.raw_position(*l)))?;
                    self.set(CtreParam::SoftLimitEnable(*dir, true))?;
                },
                None => self.set(CtreParam::SoftLimitEnable(*dir, false))?
            }
        }

        if has_sensor {
            self.set(CtreParam::SelectedSensorPosition(
                self.raw_position(config.starting_position)
            ))?;
        }

        Ok(())
    }

    /// Apply the slot 0 gains and motion magic constraints.
    pub fn configure_closed_loop(&mut self, gains: &SmartGains) -> Result<(), ConfigError> {
        self.set(CtreParam::KP(gains.p))?;
        self.set(CtreParam::KI(gains.i))?;
        self.set(CtreParam::KD(gains.d))?;
        self.set(CtreParam::KF(gains.f))?;
        self.set(CtreParam::MaxIntegralAccumulator(gains.i_max))?;
        self.set(CtreParam::IntegralZone(self.raw_position(gains.i_zone)))?;
        self.set(CtreParam::MotionSCurveStrength(MOTION_S_CURVE_STRENGTH))?;
        self.set(CtreParam::MotionCruiseVelocity(self.raw_velocity(gains.max_velocity)))?;
        self.set(CtreParam::MotionAcceleration(self.raw_velocity(gains.max_acceleration)))?;
        self.set(CtreParam::AllowableClosedloopError(
            self.raw_position(gains.allowable_closed_loop_error)
        ))?;

        Ok(())
    }

    /// Apply the peak output clamp.
    pub fn configure_output_clamp(&mut self, config: &MechanismConfig) -> Result<(), ConfigError> {
        self.set(CtreParam::PeakOutputForward(config.maximum_output))?;
        self.set(CtreParam::PeakOutputReverse(config.minimum_output))
    }

    pub fn follow(&mut self, master_id: DeviceId, inverted: bool) -> Result<(), ConfigError> {
        let id = self.id();
        self.device.follow(master_id, inverted).map_err(|vendor_code| ConfigError {
            id,
            which: "follow",
            vendor_code
        })
    }

    /// Send a command to the device. Closed loop values are in output units.
    pub fn command(&mut self, mode: CtreControlMode, value: f64, arb_ff: f64) {
        let raw_value = match mode {
            CtreControlMode::Position | CtreControlMode::MotionMagic =>
                value / self.position_conversion,
            CtreControlMode::Velocity => value / self.velocity_conversion,
            _ => value
        };

        trace!("Device {}: {:?} {} (arb ff {})", self.id(), mode, raw_value, arb_ff);

        if let Err(code) = self.device.set(mode, raw_value, arb_ff) {
            warn!("Device {} rejected {:?} command: {}", self.id(), mode, code);
        }
    }

    pub fn current(&self) -> f64 {
        self.device.supply_current()
    }

    pub fn position(&self) -> f64 {
        self.device.selected_sensor_position() * self.position_conversion
    }

    pub fn velocity(&self) -> f64 {
        self.device.selected_sensor_velocity() * self.velocity_conversion
    }

    pub fn percent_output(&self) -> f64 {
        self.device.motor_output_percent()
    }

    pub fn applied_config(&self) -> AppliedConfig {
        AppliedConfig {
            position_conversion: self.position_conversion,
            velocity_conversion: self.velocity_conversion,
            forward_limit_enabled: self.device.is_soft_limit_enabled(LimitDirection::Forward),
            reverse_limit_enabled: self.device.is_soft_limit_enabled(LimitDirection::Reverse)
        }
    }

    pub fn close(&mut self) {
        self.configured = false;
        self.device.close();
    }

    fn raw_position(&self, value: f64) -> i32 {
        (value / self.position_conversion).round() as i32
    }

    fn raw_velocity(&self, value: f64) -> i32 {
        (value / self.velocity_conversion).round() as i32
    }
}

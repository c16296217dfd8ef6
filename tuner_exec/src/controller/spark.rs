//! # Spark controller
//!
//! Spark MAX controllers run closed loop and smart motion profiling onboard. The conversion
//! factors are applied by the device itself, so positions, velocities and soft limits are passed
//! through in output units.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{trace, warn};

// Internal
use tuner_if::eqpt::{
    AccelStrategy, Bus, BusError, DeviceId, IdleMode, LimitDirection, SparkControlType,
    SparkDevice, SparkParam
};
use super::{
    check_follow, AppliedConfig, ConfigError, ControlMode, Controller, Family, FollowError
};
use crate::params::{MechanismConfig, SmartGains};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Controller for the onboard motion profile family.
pub struct SparkController {
    device: Box<dyn SparkDevice>,
    configured: bool
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SparkController {
    pub fn open(bus: &mut dyn Bus, id: DeviceId) -> Result<Self, BusError> {
        Ok(Self {
            device: bus.open_spark(id)?,
            configured: false
        })
    }

    fn set(&mut self, param: SparkParam) -> Result<(), ConfigError> {
        trace!("Device {}: {:?}", self.device_id(), param);

        let id = self.device_id();
        self.device.set_param(param).map_err(|vendor_code| ConfigError {
            id,
            which: param.name(),
            vendor_code
        })
    }
}

impl Controller for SparkController {
    fn family(&self) -> Family {
        Family::OnboardMotionProfile
    }

    fn device_id(&self) -> DeviceId {
        self.device.device_id()
    }

    fn configure(
        &mut self,
        config: &MechanismConfig,
        gains: Option<&SmartGains>
    ) -> Result<(), ConfigError> {
        self.configured = false;

        self.set(SparkParam::FactoryDefaults)?;
        self.set(SparkParam::Inverted(config.is_inverted))?;
        self.set(SparkParam::IdleMode(match config.is_braked {
            true => IdleMode::Brake,
            false => IdleMode::Coast
        }))?;
        self.set(SparkParam::VoltageCompensation(config.voltage_compensation))?;
        self.set(SparkParam::OpenLoopRampRate(config.ramp_rate))?;
        self.set(SparkParam::ClosedLoopRampRate(config.ramp_rate))?;

        // Conversion first, the limits and starting position are in output units
        self.set(SparkParam::PositionConversionFactor(config.position_conversion))?;
        self.set(SparkParam::VelocityConversionFactor(config.velocity_conversion))?;

        for (dir, limit) in [
            (LimitDirection::Forward, config.forward_limit),
            (LimitDirection::Reverse, config.reverse_limit)
        ].iter() {
            if let Some(l) = limit {
                self.set(SparkParam::SoftLimit(*dir, *l))?;
            }
            self.set(SparkParam::SoftLimitEnabled(*dir, limit.is_some()))?;
        }

        self.set(SparkParam::EncoderPosition(config.starting_position))?;

        if let Some(g) = gains {
            self.set(SparkParam::P(g.p))?;
            self.set(SparkParam::I(g.i))?;
            self.set(SparkParam::D(g.d))?;
            self.set(SparkParam::Ff(g.f))?;
            self.set(SparkParam::IZone(g.i_zone))?;
            self.set(SparkParam::IMaxAccum(g.i_max))?;
            self.set(SparkParam::OutputRange {
                min: config.minimum_output,
                max: config.maximum_output
            })?;
            self.set(SparkParam::SmartMotionAccelStrategy(AccelStrategy::SCurve))?;
            self.set(SparkParam::SmartMotionMaxVelocity(g.max_velocity))?;
            self.set(SparkParam::SmartMotionMaxAccel(g.max_acceleration))?;
            self.set(SparkParam::SmartMotionAllowedClosedLoopError(
                g.allowable_closed_loop_error
            ))?;
            self.set(SparkParam::SmartMotionMinOutputVelocity(0.0))?;
        }

        self.configured = true;
        Ok(())
    }

    fn follow(&mut self, master: &dyn Controller, inverted: bool) -> Result<(), FollowError> {
        check_follow(self.family(), master)?;

        let id = self.device_id();
        self.device.follow(master.device_id(), inverted).map_err(|vendor_code| ConfigError {
            id,
            which: "follow",
            vendor_code
        })?;

        Ok(())
    }

    fn set_output(&mut self, mode: ControlMode, reference: f64, arb_ff: f64) {
        let (control_type, value, arb_ff) = match mode {
            ControlMode::Disabled => (SparkControlType::DutyCycle, 0.0, 0.0),
            ControlMode::PercentOutput => (SparkControlType::DutyCycle, reference, arb_ff),
            ControlMode::SmartMotion => (SparkControlType::SmartMotion, reference, arb_ff),
            ControlMode::SmartVelocity => (SparkControlType::SmartVelocity, reference, arb_ff),
        };

        if mode != ControlMode::Disabled && !self.configured {
            trace!("Device {} is not configured, ignoring {:?}", self.device_id(), mode);
            return
        }

        trace!("Device {}: {:?} {} (arb ff {})", self.device_id(), control_type, value, arb_ff);

        if let Err(code) = self.device.set_reference(value, control_type, arb_ff) {
            warn!("Device {} rejected {:?} command: {}", self.device_id(), mode, code);
        }
    }

    fn output_current_amps(&self) -> f64 {
        self.device.output_current()
    }

    fn sensor_position(&self) -> f64 {
        self.device.encoder_position()
    }

    fn sensor_velocity(&self) -> f64 {
        self.device.encoder_velocity()
    }

    fn applied_percent_output(&self) -> f64 {
        self.device.applied_output()
    }

    fn applied_config(&self) -> AppliedConfig {
        AppliedConfig {
            position_conversion: self.device.position_conversion_factor(),
            velocity_conversion: self.device.velocity_conversion_factor(),
            forward_limit_enabled: self.device.is_soft_limit_enabled(LimitDirection::Forward),
            reverse_limit_enabled: self.device.is_soft_limit_enabled(LimitDirection::Reverse)
        }
    }

    fn close(&mut self) {
        self.configured = false;
        self.device.close();
    }
}

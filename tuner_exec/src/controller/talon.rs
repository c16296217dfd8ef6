//! # Talon controller
//!
//! Falcon (Talon FX) and Talon SRX controllers. Closed loop runs onboard in raw units: smart motion
//! maps to motion magic and smart velocity to velocity control.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;

// Internal
use tuner_if::eqpt::{Bus, BusError, CtreControlMode, CtreModel, DeviceId};
use super::{
    check_follow, ctre_base::CtreBase, AppliedConfig, ConfigError, ControlMode, Controller,
    Family, FollowError
};
use crate::params::{MechanismConfig, SmartGains};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Controller for the simple closed loop family.
pub struct TalonController {
    base: CtreBase
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TalonController {
    /// Open a Falcon, which uses its integrated sensor.
    pub fn open_falcon(bus: &mut dyn Bus, id: DeviceId) -> Result<Self, BusError> {
        Ok(Self {
            base: CtreBase::open(bus, id, CtreModel::TalonFx)?
        })
    }

    /// Open a Talon SRX.
    pub fn open_talon(bus: &mut dyn Bus, id: DeviceId) -> Result<Self, BusError> {
        Ok(Self {
            base: CtreBase::open(bus, id, CtreModel::TalonSrx)?
        })
    }
}

impl Controller for TalonController {
    fn family(&self) -> Family {
        Family::SimpleClosedLoop
    }

    fn device_id(&self) -> DeviceId {
        self.base.id()
    }

    fn configure(
        &mut self,
        config: &MechanismConfig,
        gains: Option<&SmartGains>
    ) -> Result<(), ConfigError> {
        self.base.configure_common(config, true)?;

        if let Some(gains) = gains {
            self.base.configure_closed_loop(gains)?;
            self.base.configure_output_clamp(config)?;
        }

        self.base.configured = true;
        Ok(())
    }

    fn follow(&mut self, master: &dyn Controller, inverted: bool) -> Result<(), FollowError> {
        check_follow(self.family(), master)?;
        Ok(self.base.follow(master.device_id(), inverted)?)
    }

    fn set_output(&mut self, mode: ControlMode, reference: f64, arb_ff: f64) {
        let (ctre_mode, value, arb_ff) = match mode {
            ControlMode::Disabled => (CtreControlMode::Disabled, 0.0, 0.0),
            ControlMode::PercentOutput => (CtreControlMode::PercentOutput, reference, arb_ff),
            ControlMode::SmartMotion => (CtreControlMode::MotionMagic, reference, arb_ff),
            ControlMode::SmartVelocity => (CtreControlMode::Velocity, reference, arb_ff),
        };

        if mode != ControlMode::Disabled && !self.base.configured {
            trace!("Device {} is not configured, ignoring {:?}", self.base.id(), mode);
            return
        }

        self.base.command(ctre_mode, value, arb_ff)
    }

    fn output_current_amps(&self) -> f64 {
        self.base.current()
    }

    fn sensor_position(&self) -> f64 {
        self.base.position()
    }

    fn sensor_velocity(&self) -> f64 {
        self.base.velocity()
    }

    fn applied_percent_output(&self) -> f64 {
        self.base.percent_output()
    }

    fn applied_config(&self) -> AppliedConfig {
        self.base.applied_config()
    }

    fn close(&mut self) {
        self.base.close()
    }
}

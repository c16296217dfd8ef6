//! # Victor controller
//!
//! Victor SPX controllers have no current sensing and are only used open loop. Smart motion and
//! smart velocity commands are rejected: the motor is set to neutral and a warning is logged the
//! first time each mode is requested.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{trace, warn};

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

/// Controller for the open loop only family.
pub struct VictorController {
    base: CtreBase,

    warned_smart_motion: bool,
    warned_smart_velocity: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VictorController {
    pub fn open(bus: &mut dyn Bus, id: DeviceId) -> Result<Self, BusError> {
        Ok(Self {
            base: CtreBase::open(bus, id, CtreModel::VictorSpx)?,
            warned_smart_motion: false,
            warned_smart_velocity: false
        })
    }

    fn warn_unsupported(&mut self, mode: ControlMode) {
        let warned = match mode {
            ControlMode::SmartMotion => &mut self.warned_smart_motion,
            ControlMode::SmartVelocity => &mut self.warned_smart_velocity,
            _ => return
        };

        if !*warned {
            warn!(
                "Device {} is open loop only, {:?} is not supported and will output neutral",
                self.base.id(),
                mode
            );
            *warned = true;
        }
    }
}

impl Controller for VictorController {
    fn family(&self) -> Family {
        Family::OpenLoopOnly
    }

    fn device_id(&self) -> DeviceId {
        self.base.id()
    }

    /// Closed loop gains and motion constraints are not applied, only the output clamp.
    fn configure(
        &mut self,
        config: &MechanismConfig,
        gains: Option<&SmartGains>
    ) -> Result<(), ConfigError> {
        self.base.configure_common(config, false)?;

        if gains.is_some() {
            self.base.configure_output_clamp(config)?;
        }

        self.warned_smart_motion = false;
        self.warned_smart_velocity = false;
        self.base.configured = true;
        Ok(())
    }

    fn follow(&mut self, master: &dyn Controller, inverted: bool) -> Result<(), FollowError> {
        check_follow(self.family(), master)?;
        Ok(self.base.follow(master.device_id(), inverted)?)
    }

    fn set_output(&mut self, mode: ControlMode, reference: f64, arb_ff: f64) {
        if mode != ControlMode::Disabled && !self.base.configured {
            trace!("Device {} is not configured, ignoring {:?}", self.base.id(), mode);
            return
        }

        match mode {
            ControlMode::PercentOutput =>
                self.base.command(CtreControlMode::PercentOutput, reference, arb_ff),
            ControlMode::Disabled =>
                self.base.command(CtreControlMode::Disabled, 0.0, 0.0),
            ControlMode::SmartMotion | ControlMode::SmartVelocity => {
                self.warn_unsupported(mode);
                self.base.command(CtreControlMode::Disabled, 0.0, 0.0)
            }
        }
    }

    /// The Victor cannot measure current, always 0.
    fn output_current_amps(&self) -> f64 {
        0.0
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

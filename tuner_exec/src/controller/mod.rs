//! # Controller abstraction
//!
//! A `Controller` hides the differences between the motor controller hardware families behind one
//! interface: setup from a `MechanismConfig`, a single output command per cycle, and telemetry
//! readback. The family is chosen by the configuration's type tag when the controller is opened.
//!
//! Configuration is all or nothing. Every vendor call can fail on its own, and the first failure
//! aborts `configure` with a `ConfigError` naming the step. A controller which has not been fully
//! configured refuses every command except `disable`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod ctre_base;
mod spark;
mod talon;
mod victor;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
pub use spark::SparkController;
pub use talon::TalonController;
pub use victor::VictorController;
use tuner_if::eqpt::{Bus, BusError, DeviceId, VendorCode};
use crate::params::{ControllerType, MechanismConfig, SmartGains};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A motor controller of any hardware family.
pub trait Controller {
    /// The hardware family of the controller.
    fn family(&self) -> Family;

    /// CAN ID of the underlying device.
    fn device_id(&self) -> DeviceId;

    /// Apply the configuration to the device.
    ///
    /// Factory defaults, inversion, brake mode, voltage compensation, ramp rate, soft limits,
    /// sensor conversion and starting position are always applied. Closed loop gains, the output
    /// clamp and motion constraints are only applied when `gains` is given, i.e. for the master.
    ///
    /// Arm gravity feed forward is not a device setting. Mode control computes it every cycle
    /// from the measured position and it reaches the device as the `arb_ff` of `set_output`.
    fn configure(
        &mut self,
        config: &MechanismConfig,
        gains: Option<&SmartGains>
    ) -> Result<(), ConfigError>;

    /// Mirror the commanded output of `master`, optionally inverted.
    ///
    /// Only controllers of the same family can follow each other.
    fn follow(&mut self, master: &dyn Controller, inverted: bool) -> Result<(), FollowError>;

    /// Issue the command for this cycle.
    ///
    /// Vendor failures on commands are logged, not returned.
    fn set_output(&mut self, mode: ControlMode, reference: f64, arb_ff: f64);

    /// Current drawn by the controller.
    ///
    /// Units: amps
    fn output_current_amps(&self) -> f64;

    /// Sensor position in output units.
    fn sensor_position(&self) -> f64;

    /// Sensor velocity in output units.
    fn sensor_velocity(&self) -> f64;

    /// Output applied to the motor, between -1 and +1.
    fn applied_percent_output(&self) -> f64;

    /// Read back the conversion and soft limit configuration in effect on the controller.
    fn applied_config(&self) -> AppliedConfig;

    /// Command zero output. Can be called any number of times.
    fn disable(&mut self) {
        self.set_output(ControlMode::Disabled, 0.0, 0.0)
    }

    /// Release the device. The controller must not be used afterwards.
    fn close(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Configuration read back from a controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AppliedConfig {
    pub position_conversion: f64,
    pub velocity_conversion: f64,
    pub forward_limit_enabled: bool,
    pub reverse_limit_enabled: bool,
}

/// A configuration step rejected by the device.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("Device {id} rejected {which}: {vendor_code}")]
pub struct ConfigError {
    pub id: DeviceId,

    /// The step which failed
    pub which: &'static str,

    pub vendor_code: VendorCode,
}

/// The device for a mechanism could not be opened.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("Could not construct the {controller_type:?} controller with ID {id}: {source}")]
pub struct ConstructionError {
    pub id: DeviceId,
    pub controller_type: ControllerType,

    #[source]
    pub source: BusError,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Motor controller hardware families.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Closed loop and motion profiling run onboard, conversion factors applied onboard (Spark)
    OnboardMotionProfile,

    /// Closed loop position and velocity onboard in raw units (Falcon, Talon)
    SimpleClosedLoop,

    /// Open loop only (Victor)
    OpenLoopOnly,
}

/// Mode of the output command.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Zero output
    Disabled,

    /// Reference is a percent output
    PercentOutput,

    /// Reference is a position in output units
    SmartMotion,

    /// Reference is a velocity in output units
    SmartVelocity,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FollowError {
    #[error(
        "A {slave:?} controller cannot follow a {master:?} controller, following is only \
        supported within a hardware family"
    )]
    UnsupportedFollow {
        slave: Family,
        master: Family
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlMode {
    /// Numeric tag used in telemetry.
    pub fn tag(&self) -> f64 {
        match self {
            ControlMode::Disabled => 0.0,
            ControlMode::PercentOutput => 1.0,
            ControlMode::SmartMotion => 2.0,
            ControlMode::SmartVelocity => 3.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Open the controller for the given mechanism.
///
/// The variant is selected by the mechanism's type tag. The returned controller is not yet
/// configured.
pub fn open(
    bus: &mut dyn Bus,
    config: &MechanismConfig
) -> Result<Box<dyn Controller>, ConstructionError> {
    let id = config.id;
    let wrap = |source: BusError| ConstructionError {
        id,
        controller_type: config.controller_type,
        source
    };

    let controller: Box<dyn Controller> = match config.controller_type {
        ControllerType::Spark => Box::new(SparkController::open(bus, id).map_err(wrap)?),
        ControllerType::Falcon => Box::new(TalonController::open_falcon(bus, id).map_err(wrap)?),
        ControllerType::Talon => Box::new(TalonController::open_talon(bus, id).map_err(wrap)?),
        ControllerType::Victor => Box::new(VictorController::open(bus, id).map_err(wrap)?),
    };

    debug!("Opened {:?} controller {}", config.controller_type, id);

    Ok(controller)
}

/// Check that `slave` may follow `master`.
pub(crate) fn check_follow(slave: Family, master: &dyn Controller) -> Result<(), FollowError> {
    if master.family() == slave {
        Ok(())
    }
    else {
        Err(FollowError::UnsupportedFollow {
            slave,
            master: master.family()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tuner_if::eqpt::{
        sim::SimBus, CtreModel, DeviceKind, LimitDirection, SparkParam, CtreParam
    };

    fn mechanism(controller_type: ControllerType, id: DeviceId) -> MechanismConfig {
        MechanismConfig {
            controller_type,
            id,
            ..Default::default()
        }
    }

    fn bus() -> SimBus {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark)
            .add_device(2, DeviceKind::Spark)
            .add_device(3, DeviceKind::Ctre(CtreModel::TalonFx))
            .add_device(4, DeviceKind::Ctre(CtreModel::TalonSrx))
            .add_device(5, DeviceKind::Ctre(CtreModel::VictorSpx));
        bus
    }

    #[test]
    fn test_open_selects_family() {
        let mut bus = bus();

        let families: Vec<Family> = vec![
            (ControllerType::Spark, 1),
            (ControllerType::Falcon, 3),
            (ControllerType::Talon, 4),
            (ControllerType::Victor, 5)
        ]
        .into_iter()
        .map(|(t, id)| open(&mut bus, &mechanism(t, id)).unwrap().family())
        .collect();

        assert_eq!(families, vec![
            Family::OnboardMotionProfile,
            Family::SimpleClosedLoop,
            Family::SimpleClosedLoop,
            Family::OpenLoopOnly
        ]);
    }

    #[test]
    fn test_open_errors() {
        let mut bus = bus();

        let err = open(&mut bus, &mechanism(ControllerType::Spark, 9)).err().unwrap();
        assert_eq!(err.source, BusError::DeviceNotFound(9));

        let err = open(&mut bus, &mechanism(ControllerType::Falcon, 4)).err().unwrap();
        assert!(matches!(err.source, BusError::Misidentified { id: 4, .. }));
        assert_eq!(err.controller_type, ControllerType::Falcon);
    }

    #[test]
    fn test_round_trip_applied_config() {
        for (t, id) in vec![
            (ControllerType::Spark, 1),
            (ControllerType::Falcon, 3),
            (ControllerType::Talon, 4),
            (ControllerType::Victor, 5)
        ] {
            let mut bus = bus();
            let config = MechanismConfig {
                forward_limit: Some(120.0),
                reverse_limit: None,
                position_conversion: 0.25,
                velocity_conversion: 2.5,
                starting_position: 10.0,
                ..mechanism(t, id)
            };

            let mut controller = open(&mut bus, &config).unwrap();
            controller.configure(&config, Some(&SmartGains::default())).unwrap();

            assert_eq!(
                controller.applied_config(),
                AppliedConfig {
                    position_conversion: 0.25,
                    velocity_conversion: 2.5,
                    forward_limit_enabled: true,
                    reverse_limit_enabled: false
                },
                "{:?}", t
            );
        }
    }

    #[test]
    fn test_cross_family_follow_fails() {
        let mut bus = bus();

        let spark_config = mechanism(ControllerType::Spark, 1);
        let falcon_config = mechanism(ControllerType::Falcon, 3);

        let mut master = open(&mut bus, &spark_config).unwrap();
        master.configure(&spark_config, Some(&SmartGains::default())).unwrap();

        let mut slave = open(&mut bus, &falcon_config).unwrap();
        slave.configure(&falcon_config, None).unwrap();

        assert_eq!(
            slave.follow(master.as_ref(), false),
            Err(FollowError::UnsupportedFollow {
                slave: Family::SimpleClosedLoop,
                master: Family::OnboardMotionProfile
            })
        );
        assert_eq!(bus.device(3).unwrap().leader, None);
    }

    #[test]
    fn test_same_family_follow() {
        let mut bus = bus();

        let master_config = mechanism(ControllerType::Spark, 1);
        let slave_config = mechanism(ControllerType::Spark, 2);

        let mut master = open(&mut bus, &master_config).unwrap();
        master.configure(&master_config, Some(&SmartGains::default())).unwrap();
        let mut slave = open(&mut bus, &slave_config).unwrap();
        slave.configure(&slave_config, None).unwrap();

        slave.follow(master.as_ref(), true).unwrap();
        assert_eq!(bus.device(2).unwrap().leader, Some((1, true)));

        master.set_output(ControlMode::PercentOutput, 0.4, 0.0);
        bus.step(0.02);
        assert!((slave.applied_percent_output() + 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_configure_failure_is_fatal() {
        let mut bus = bus();
        bus.inject_failure(1, "i zone", VendorCode(-3));

        let config = mechanism(ControllerType::Spark, 1);
        let mut controller = open(&mut bus, &config).unwrap();

        let err = controller.configure(&config, Some(&SmartGains::default())).err().unwrap();
        assert_eq!(err, ConfigError {
            id: 1,
            which: "i zone",
            vendor_code: VendorCode(-3)
        });

        // No step after the failing one was applied
        let state = bus.device(1).unwrap();
        assert!(!state.spark_params.iter().any(|p| matches!(p, SparkParam::OutputRange { .. })));

        // And no command is issued with the partial configuration
        controller.set_output(ControlMode::PercentOutput, 0.5, 0.0);
        assert_eq!(bus.device(1).unwrap().num_commands, 0);

        // Except disable
        controller.disable();
        assert_eq!(bus.device(1).unwrap().num_commands, 1);
    }

    #[test]
    fn test_slave_gets_no_gains() {
        let mut bus = bus();
        let config = mechanism(ControllerType::Talon, 4);

        let mut controller = open(&mut bus, &config).unwrap();
        controller.configure(&config, None).unwrap();

        let state = bus.device(4).unwrap();
        assert!(!state.ctre_params.iter().any(|p| matches!(p, CtreParam::KP(_))));
        assert!(state.ctre_params.contains(&CtreParam::SoftLimitEnable(LimitDirection::Forward, false)));
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut bus = bus();
        let config = mechanism(ControllerType::Falcon, 3);

        let mut controller = open(&mut bus, &config).unwrap();
        controller.configure(&config, Some(&SmartGains::default())).unwrap();
        controller.set_output(ControlMode::PercentOutput, 0.7, 0.1);
        assert!(controller.applied_percent_output() > 0.0);

        controller.disable();
        let once = bus.device(3).unwrap();
        controller.disable();
        controller.disable();
        let thrice = bus.device(3).unwrap();

        assert_eq!(once.applied_output, 0.0);
        assert_eq!(thrice.applied_output, 0.0);
        assert_eq!(once.last_command, thrice.last_command);
    }
}

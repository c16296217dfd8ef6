//! # Tuner
//!
//! The tuner owns the configuration, the master and slave controllers, the pneumatics, mode control
//! and the telemetry sink for a test session. It is driven by three lifecycle calls:
//!
//! - `test_init` - release any previous controllers, then open and configure the master, slaves
//!   and pneumatics from the configuration. Setup is all or nothing: on any failure every device
//!   opened so far is released and the tuner stays disabled.
//! - `test_periodic` - once per cycle: run mode control on the operator input, command the master
//!   (slaves follow it in hardware), drive the pneumatics and record telemetry.
//! - `disabled_init` - zero the master, disable the slaves, retract the solenoids and flush the
//!   telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};

// Internal
use tuner_if::{eqpt::Bus, input::OperatorInput};
use util::module::State;
use crate::controller::{
    self, ConfigError, ConstructionError, ControlMode, Controller, FollowError
};
use crate::mode_ctrl::{self, ModeCtrl, ModeCtrlError};
use crate::params::{ParamsError, RobotTuningConfig};
use crate::pneumatics::{Pneumatics, PneumaticsError};
use crate::telem::TelemetrySink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The tuning session.
#[derive(Default)]
pub struct Tuner {
    config: Option<RobotTuningConfig>,

    master: Option<Box<dyn Controller>>,
    slaves: Vec<Box<dyn Controller>>,

    pneumatics: Pneumatics,

    mode_ctrl: ModeCtrl,

    sink: Option<Box<dyn TelemetrySink>>,

    enabled: bool,

    /// Number of periodic cycles run since the last `test_init`
    pub num_cycles: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which abort `test_init`.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ParamsError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("Could not configure the master: {0}")]
    MasterConfig(ConfigError),

    #[error("Could not configure slave {index}: {source}")]
    SlaveConfig {
        index: usize,
        #[source]
        source: ConfigError
    },

    #[error("Slave {index} could not follow the master: {source}")]
    Follow {
        index: usize,
        #[source]
        source: FollowError
    },

    #[error("Could not initialise mode control: {0}")]
    ModeCtrl(#[from] ModeCtrlError),

    #[error(transparent)]
    Pneumatics(#[from] PneumaticsError),
}

/// Errors during periodic processing.
#[derive(Debug, thiserror::Error)]
pub enum TunerError {
    #[error("The tuner is not enabled, call test_init first")]
    NotEnabled,

    #[error(transparent)]
    ModeCtrl(#[from] ModeCtrlError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tuner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter test mode with the given configuration.
    ///
    /// The telemetry sink is only used if the configuration enables telemetry.
    pub fn test_init(
        &mut self,
        config: RobotTuningConfig,
        bus: &mut dyn Bus,
        sink: Option<Box<dyn TelemetrySink>>
    ) -> Result<(), SetupError> {
        // Two live owners must never drive the same device
        self.release();

        config.are_valid()?;

        self.mode_ctrl.init(mode_ctrl::Params::from_config(&config))?;

        let (mut master, mut slaves) = build_controllers(&config, bus).map_err(|e| {
            error!("Setup failed, all controllers released: {}", e);
            e
        })?;

        let pneumatics = match Pneumatics::open(bus, &config.solenoid_ids) {
            Ok(p) => p,
            Err(e) => {
                master.close();
                for slave in slaves.iter_mut() {
                    slave.close();
                }
                error!("Setup failed, all controllers released: {}", e);
                return Err(e.into())
            }
        };

        info!(
            "Test mode enabled: master {:?} {} with {} slave(s) and {} solenoid(s)",
            config.master.mechanism.controller_type,
            master.device_id(),
            slaves.len(),
            pneumatics.num_solenoids()
        );

        self.master = Some(master);
        self.slaves = slaves;
        self.pneumatics = pneumatics;
        self.sink = match config.write_csv {
            true => sink,
            false => None
        };
        self.config = Some(config);
        self.enabled = true;
        self.num_cycles = 0;

        if let Some(ref mut sink) = self.sink {
            sink.add("isEnabled", 1.0);
        }

        Ok(())
    }

    /// Run one cycle of test mode.
    ///
    /// Returns the command issued to the master.
    pub fn test_periodic(
        &mut self,
        input: &OperatorInput
    ) -> Result<mode_ctrl::OutputData, TunerError> {
        let master = match (self.enabled, self.master.as_mut()) {
            (true, Some(m)) => m,
            _ => return Err(TunerError::NotEnabled)
        };

        let (output, _report) = self.mode_ctrl.proc(&mode_ctrl::InputData {
            input: *input,
            position: master.sensor_position()
        })?;

        // Slaves follow in hardware
        master.set_output(output.mode, output.reference, output.arb_ff);

        self.pneumatics.handle_input(input);
        self.pneumatics.apply();

        if let Some(ref mut sink) = self.sink {
            let total_current = master.output_current_amps()
                + self.slaves.iter().map(|s| s.output_current_amps()).sum::<f64>();

            sink.add("totalControllerCurrent", total_current);
            sink.add("reference", output.reference);
            sink.add("feedForward", output.arb_ff);
            sink.add("output", master.applied_percent_output());
            sink.add("position", master.sensor_position());
            sink.add("velocity", master.sensor_velocity());
            sink.add("controlMode", output.mode.tag());
        }

        self.num_cycles += 1;

        Ok(output)
    }

    /// Leave test mode: zero the master, disable the slaves, retract the solenoids, stop the
    /// compressor and flush telemetry.
    ///
    /// Always succeeds and can be called any number of times. The controllers stay open until
    /// the next `test_init` or `shutdown`.
    pub fn disabled_init(&mut self) {
        self.mode_ctrl.disable();

        if let Some(ref mut master) = self.master {
            master.disable();
        }
        for slave in self.slaves.iter_mut() {
            slave.disable();
        }
        self.pneumatics.disable();

        if self.enabled {
            info!("Test mode disabled after {} cycles", self.num_cycles);
        }
        self.enabled = false;

        if let Some(ref mut sink) = self.sink {
            sink.add("isEnabled", 0.0);
            if let Err(e) = sink.flush() {
                warn!("Could not flush telemetry: {}", e);
            }
        }
    }

    /// Disable, then release all controllers.
    pub fn shutdown(&mut self) {
        self.disabled_init();
        self.release();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The configuration applied by the last successful `test_init`.
    pub fn config(&self) -> Option<&RobotTuningConfig> {
        self.config.as_ref()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode_ctrl.mode()
    }

    pub fn master(&self) -> Option<&dyn Controller> {
        self.master.as_deref()
    }

    pub fn pneumatics(&self) -> &Pneumatics {
        &self.pneumatics
    }

    /// Close every controller and the pneumatics, and forget the configuration.
    fn release(&mut self) {
        let num_released = self.slaves.len() + self.master.iter().count();

        if let Some(mut master) = self.master.take() {
            master.close();
        }
        for mut slave in self.slaves.drain(..) {
            slave.close();
        }
        self.pneumatics.close();
        self.pneumatics = Pneumatics::default();

        if num_released > 0 {
            debug!("Released {} controller(s)", num_released);
        }

        self.config = None;
        self.sink = None;
        self.enabled = false;
        self.mode_ctrl = ModeCtrl::default();
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Open and configure the master and slaves, closing every opened controller on failure.
fn build_controllers(
    config: &RobotTuningConfig,
    bus: &mut dyn Bus
) -> Result<(Box<dyn Controller>, Vec<Box<dyn Controller>>), SetupError> {
    let mut master = controller::open(bus, &config.master.mechanism)?;
    let mut slaves: Vec<Box<dyn Controller>> = Vec::with_capacity(config.slaves.len());

    match configure_all(config, bus, &mut master, &mut slaves) {
        Ok(()) => Ok((master, slaves)),
        Err(e) => {
            master.close();
            for slave in slaves.iter_mut() {
                slave.close();
            }
            Err(e)
        }
    }
}

fn configure_all(
    config: &RobotTuningConfig,
    bus: &mut dyn Bus,
    master: &mut Box<dyn Controller>,
    slaves: &mut Vec<Box<dyn Controller>>
) -> Result<(), SetupError> {
    master
        .configure(&config.master.mechanism, Some(&config.master.gains))
        .map_err(SetupError::MasterConfig)?;

    for (index, slave_config) in config.slaves.iter().enumerate() {
        let mut slave = controller::open(bus, slave_config)?;

        let result = slave
            .configure(slave_config, None)
            .map_err(|source| SetupError::SlaveConfig { index, source })
            .and_then(|_| slave
                .follow(&**master, slave_config.is_inverted)
                .map_err(|source| SetupError::Follow { index, source })
            );

        // Keep the slave so it is released if setup fails
        slaves.push(slave);
        result?;

        debug!("Slave {} (ID {}) following the master", index, slave_config.id);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tuner_if::eqpt::{sim::{SimBus, SimCommand}, CtreModel, DeviceKind, VendorCode};
    use crate::params::{ArmFeedForward, ControllerType, MechanismConfig};
    use crate::telem::TelemError;

    /// Sink recording samples into a shared vector.
    #[derive(Default, Clone)]
    struct MemSink {
        samples: Rc<RefCell<Vec<(&'static str, f64)>>>,
        flushes: Rc<RefCell<usize>>,
    }

    impl TelemetrySink for MemSink {
        fn add(&mut self, key: &'static str, value: f64) {
            self.samples.borrow_mut().push((key, value));
        }

        fn flush(&mut self) -> Result<(), TelemError> {
            *self.flushes.borrow_mut() += 1;
            Ok(())
        }
    }

    impl MemSink {
        fn boxed(&self) -> Option<Box<dyn TelemetrySink>> {
            let sink: Box<dyn TelemetrySink> = Box::new(self.clone());
            Some(sink)
        }

        fn last(&self, key: &str) -> Option<f64> {
            self.samples.borrow().iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
        }
    }

    fn config() -> RobotTuningConfig {
        let mut config = RobotTuningConfig::default();
        config.master.mechanism.controller_type = ControllerType::Spark;
        config.master.mechanism.id = 1;
        config.b_set_point = 12.3;
        config.slaves = vec![
            MechanismConfig { id: 2, is_inverted: true, ..Default::default() },
            MechanismConfig { id: 3, ..Default::default() },
        ];
        config
    }

    fn bus() -> SimBus {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark)
            .add_device(2, DeviceKind::Spark)
            .add_device(3, DeviceKind::Spark)
            .add_device(4, DeviceKind::Ctre(CtreModel::TalonFx))
            .add_solenoid(0)
            .add_solenoid(1)
            .add_compressor();
        bus
    }

    #[test]
    fn test_periodic_commands_master_only() {
        let mut bus = bus();
        let sink = MemSink::default();
        let mut tuner = Tuner::new();

        tuner.test_init(config(), &mut bus, sink.boxed()).unwrap();
        assert!(tuner.is_enabled());
        assert_eq!(sink.last("isEnabled"), Some(1.0));
        assert_eq!(bus.device(2).unwrap().leader, Some((1, true)));
        assert_eq!(bus.device(3).unwrap().leader, Some((1, false)));

        let out = tuner.test_periodic(&OperatorInput {
            throttle_axis: 0.5,
            ..Default::default()
        }).unwrap();
        assert_eq!(out.mode, ControlMode::PercentOutput);
        assert!((out.reference - 0.378).abs() < 1e-12);

        assert_eq!(bus.device(1).unwrap().num_commands, 1);
        assert_eq!(bus.device(2).unwrap().num_commands, 0);

        bus.step(0.02);
        assert!((bus.device(2).unwrap().applied_output + 0.378).abs() < 1e-9);
        assert!((bus.device(3).unwrap().applied_output - 0.378).abs() < 1e-9);

        // Telemetry for the cycle
        assert!((sink.last("reference").unwrap() - 0.378).abs() < 1e-12);
        assert_eq!(sink.last("controlMode"), Some(ControlMode::PercentOutput.tag()));
        for key in ["totalControllerCurrent", "feedForward", "output", "position", "velocity"].iter() {
            assert!(sink.last(key).is_some(), "{}", key);
        }
    }

    #[test]
    fn test_set_point_scenario() {
        let mut bus = bus();
        let mut tuner = Tuner::new();
        tuner.test_init(config(), &mut bus, None).unwrap();

        let out = tuner.test_periodic(&OperatorInput {
            b_pressed: true,
            throttle_axis: 0.9,
            ..Default::default()
        }).unwrap();

        assert_eq!(out.mode, ControlMode::SmartMotion);
        assert_eq!(out.reference, 12.3);
        assert_eq!(tuner.mode(), ControlMode::SmartMotion);
    }

    #[test]
    fn test_default_config_drops_to_disabled_after_set_point() {
        let mut bus = bus();
        let mut config = RobotTuningConfig::default();
        config.b_set_point = 12.3;

        let mut tuner = Tuner::new();
        tuner.test_init(config, &mut bus, None).unwrap();

        let out = tuner.test_periodic(&OperatorInput {
            b_pressed: true,
            ..Default::default()
        }).unwrap();
        assert_eq!(out.mode, ControlMode::SmartMotion);
        assert_eq!(out.reference, 12.3);

        // Button released, axes idle
        let out = tuner.test_periodic(&OperatorInput::default()).unwrap();
        assert_eq!(out.mode, ControlMode::Disabled);
        assert_eq!(out.reference, 0.0);
        assert_eq!(tuner.mode(), ControlMode::Disabled);
    }

    #[test]
    fn test_held_set_point_when_enabled() {
        let mut bus = bus();
        let mut config = config();
        config.hold_set_point = true;

        let mut tuner = Tuner::new();
        tuner.test_init(config, &mut bus, None).unwrap();

        tuner.test_periodic(&OperatorInput { b_pressed: true, ..Default::default() }).unwrap();
        let out = tuner.test_periodic(&OperatorInput::default()).unwrap();
        assert_eq!(out.mode, ControlMode::SmartMotion);
        assert_eq!(out.reference, 12.3);
    }

    #[test]
    fn test_pneumatics_follow_lifecycle() {
        let mut bus = bus();
        let mut config = config();
        config.solenoid_ids = vec![0, 1];

        let mut tuner = Tuner::new();
        tuner.test_init(config.clone(), &mut bus, None).unwrap();
        assert_eq!(bus.num_open(), 6);

        tuner.test_periodic(&OperatorInput {
            extend_solenoid_pressed: true,
            ..Default::default()
        }).unwrap();
        assert!(bus.solenoid(0).unwrap().extended);
        assert!(bus.solenoid(1).unwrap().extended);
        assert!(bus.compressor().unwrap().enabled);

        // Held without a new press
        tuner.test_periodic(&OperatorInput::default()).unwrap();
        assert!(bus.solenoid(1).unwrap().extended);

        tuner.disabled_init();
        assert!(!bus.solenoid(0).unwrap().extended);
        assert!(!bus.solenoid(1).unwrap().extended);
        assert!(!bus.compressor().unwrap().enabled);
        assert!(!tuner.pneumatics().is_extended());

        // Re-entering test mode reopens the same channels
        tuner.test_init(config, &mut bus, None).unwrap();
        assert_eq!(bus.num_open(), 6);

        tuner.shutdown();
        assert_eq!(bus.num_open(), 0);
    }

    #[test]
    fn test_missing_solenoid_aborts_setup() {
        let mut bus = bus();
        let mut config = config();
        config.solenoid_ids = vec![0, 7];

        let mut tuner = Tuner::new();
        let err = tuner.test_init(config, &mut bus, None).err().unwrap();

        assert!(matches!(
            err,
            SetupError::Pneumatics(PneumaticsError::OpenSolenoid { channel: 7, .. })
        ));
        assert!(!tuner.is_enabled());
        assert_eq!(bus.num_open(), 0);
    }

    #[test]
    fn test_arm_feed_forward_uses_master_position() {
        let mut bus = bus();
        let mut config = config();
        config.master.gains.ff = 0.05;
        config.master.arm_feed_forward = Some(ArmFeedForward {
            arm_feed_forward_magnitude: 0.3,
            center_of_mass_angle_offset: 25.0
        });

        let mut tuner = Tuner::new();
        tuner.test_init(config, &mut bus, None).unwrap();

        // Centre of mass level with the pivot
        bus.set_raw_position(1, 25.0);
        let out = tuner.test_periodic(&OperatorInput {
            throttle_axis: 0.5,
            ..Default::default()
        }).unwrap();
        assert!((out.arb_ff - 0.35).abs() < 1e-9);

        // Sent with the command, not configured on the device
        match bus.device(1).unwrap().last_command {
            Some(SimCommand::Spark { arb_ff, .. }) => assert!((arb_ff - 0.35).abs() < 1e-9),
            other => panic!("unexpected command {:?}", other)
        }
        assert_eq!(bus.device(1).unwrap().kf, 0.0);

        // Centre of mass directly above the pivot
        bus.set_raw_position(1, 115.0);
        let out = tuner.test_periodic(&OperatorInput {
            throttle_axis: 0.5,
            ..Default::default()
        }).unwrap();
        assert!((out.arb_ff - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut bus = bus();
        let sink = MemSink::default();
        let mut config = config();
        config.percent_output_run = 0.4;

        let mut tuner = Tuner::new();
        tuner.test_init(config, &mut bus, sink.boxed()).unwrap();

        let out = tuner.test_periodic(&OperatorInput {
            run_constant_pressed: true,
            ..Default::default()
        }).unwrap();
        assert_eq!(out.reference, 0.4);
        bus.step(0.02);
        assert!(bus.device(2).unwrap().applied_output < 0.0);

        for _ in 0..3 {
            tuner.disabled_init();
            bus.step(0.02);

            for id in 1..=3 {
                assert_eq!(bus.device(id).unwrap().applied_output, 0.0, "device {}", id);
            }
            assert_eq!(tuner.mode(), ControlMode::Disabled);
        }

        assert!(!tuner.is_enabled());
        assert_eq!(sink.last("isEnabled"), Some(0.0));
        assert_eq!(*sink.flushes.borrow(), 3);
        assert!(matches!(
            tuner.test_periodic(&OperatorInput::default()),
            Err(TunerError::NotEnabled)
        ));
    }

    #[test]
    fn test_reinit_releases_previous_controllers() {
        let mut bus = bus();
        let mut tuner = Tuner::new();

        tuner.test_init(config(), &mut bus, None).unwrap();
        assert_eq!(bus.num_open(), 3);

        // Re-entering test mode must not fail with the devices already open
        tuner.test_init(config(), &mut bus, None).unwrap();
        assert_eq!(bus.num_open(), 3);
        assert_eq!(bus.device(1).unwrap().factory_resets, 2);

        tuner.shutdown();
        assert_eq!(bus.num_open(), 0);
        assert!(tuner.master().is_none());
    }

    #[test]
    fn test_config_failure_aborts_setup() {
        let mut bus = bus();
        bus.inject_failure(1, "p", VendorCode(-7));

        let mut tuner = Tuner::new();
        let err = tuner.test_init(config(), &mut bus, None).err().unwrap();

        assert!(matches!(
            err,
            SetupError::MasterConfig(ConfigError { id: 1, which: "p", .. })
        ));
        assert!(!tuner.is_enabled());
        assert_eq!(bus.num_open(), 0);
        assert_eq!(bus.device(1).unwrap().num_commands, 0);
    }

    #[test]
    fn test_cross_family_slave_aborts_setup() {
        let mut bus = bus();
        let mut config = config();
        config.slaves.push(MechanismConfig {
            controller_type: ControllerType::Falcon,
            id: 4,
            ..Default::default()
        });

        let mut tuner = Tuner::new();
        let err = tuner.test_init(config, &mut bus, None).err().unwrap();

        assert!(matches!(
            err,
            SetupError::Follow { index: 2, source: FollowError::UnsupportedFollow { .. } }
        ));
        assert_eq!(bus.num_open(), 0);
        assert!(tuner.master().is_none());
    }

    #[test]
    fn test_missing_device_aborts_setup() {
        let mut bus = bus();
        let mut config = config();
        config.slaves[1].id = 9;

        let mut tuner = Tuner::new();
        let err = tuner.test_init(config, &mut bus, None).err().unwrap();

        assert!(matches!(err, SetupError::Construction(_)));
        assert_eq!(bus.num_open(), 0);
    }

    #[test]
    fn test_invalid_config_opens_nothing() {
        let mut bus = bus();
        let mut config = config();
        config.dead_band = 2.0;

        let mut tuner = Tuner::new();
        assert!(matches!(
            tuner.test_init(config, &mut bus, None),
            Err(SetupError::InvalidConfig(ParamsError::InvalidDeadBand(_)))
        ));
        assert_eq!(bus.num_open(), 0);
    }

    #[test]
    fn test_telemetry_disabled_by_config() {
        let mut bus = bus();
        let sink = MemSink::default();
        let mut config = config();
        config.write_csv = false;

        let mut tuner = Tuner::new();
        tuner.test_init(config, &mut bus, sink.boxed()).unwrap();
        tuner.test_periodic(&OperatorInput::default()).unwrap();
        tuner.disabled_init();

        assert!(sink.samples.borrow().is_empty());
    }
}

//! Main tuner executable entry point.
//!
//! # Architecture
//!
//! The executable drives a single tuning session against a simulated device bus:
//!
//!     - Create the session and logger, load the tuning configuration
//!     - Populate the simulated bus with one device per configured mechanism, plus the solenoids
//!       and compressor
//!     - Enter test mode
//!     - Main loop:
//!         - Operator input acquisition (script or idle)
//!         - Tuner periodic processing
//!         - Simulated mechanism step
//!     - Leave test mode and release the controllers
//!
//! The session is closed whether or not the run succeeds.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{debug, error, info, trace, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use tuner_if::{
    eqpt::sim::SimBus,
    input::{InputDevice, OperatorInput}
};
use tuner_lib::{
    params::RobotTuningConfig,
    telem::{self, CsvTelemetry},
    tuner::Tuner
};
use util::{
    logger::{logger_init, LevelFilter},
    script_interpreter::ScriptInterpreter,
    session::Session
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "tuner_exec", about = "Closed loop motor controller tuning harness")]
struct Opt {
    /// Path to the tuning configuration, written with defaults if missing.
    #[structopt(long, parse(from_os_str), default_value = "params/tuner.json")]
    config: PathBuf,

    /// Operator input script. Without one the operator is idle and `--cycles` should be given.
    #[structopt(long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Stop after this many cycles.
    #[structopt(long)]
    cycles: Option<u64>,

    /// Minimum log level, `info` or more verbose.
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,

    /// Send telemetry to the log rather than to a CSV archive.
    #[structopt(long)]
    log_telem: bool,
}

/// Operator who never touches the controls.
struct IdleInput;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputDevice for IdleInput {
    fn poll(&mut self) -> Option<OperatorInput> {
        Some(OperatorInput::default())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new(
        "tuner_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    logger_init(opt.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("PID Tuner Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    let result = run(&opt, &session);

    if let Err(ref e) = result {
        error!("Tuner aborted: {}", e);
    }

    session.exit();

    result
}

/// Run the tuning session, leaving the session itself to the caller.
fn run(opt: &Opt, session: &Session) -> Result<(), Report> {

    // ---- LOAD PARAMETERS ----

    let config: RobotTuningConfig = util::params::load_or_default(&opt.config);
    info!("Tuning configuration loaded from {:?}", opt.config);

    // ---- INITIALISE EQUIPMENT ----

    let mut bus = SimBus::new();
    for mechanism in config.mechanisms() {
        bus.add_device(mechanism.id, mechanism.device_kind());
    }
    for &channel in config.solenoid_ids.iter() {
        bus.add_solenoid(channel);
    }
    if !config.solenoid_ids.is_empty() {
        bus.add_compressor();
    }

    // ---- INITIALISE INPUT ----

    let mut input: Box<dyn InputDevice> = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path, config.cycle_period_s)
                .wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} frames\n",
                si.get_duration(),
                si.get_num_frames()
            );

            Box::new(si)
        },
        None => {
            if opt.cycles.is_none() {
                warn!("No script or cycle limit given, running until interrupted");
            }
            Box::new(IdleInput)
        }
    };

    // ---- ENTER TEST MODE ----

    let sink = telem::select_sink(
        config.write_csv,
        opt.log_telem,
        || CsvTelemetry::new(session, "telem.csv")
    ).wrap_err("Failed to create the telemetry archive")?;

    let cycle_period_s = config.cycle_period_s;

    session.save_with_timestamp("applied_config.json", config.clone());

    let mut tuner = Tuner::new();
    tuner.test_init(config, &mut bus, sink)
        .wrap_err("Failed to enter test mode")?;

    // The period is only known to be positive once the config has been validated
    let cycle_period = Duration::from_secs_f64(cycle_period_s);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        let cycle_start_instant = Instant::now();

        if let Some(max) = opt.cycles {
            if tuner.num_cycles >= max {
                info!("Cycle limit reached");
                break;
            }
        }

        // ---- INPUT ----

        let operator_input = match input.poll() {
            Some(i) => i,
            None => {
                info!("End of script reached");
                break;
            }
        };

        // ---- TUNER PROCESSING ----

        match tuner.test_periodic(&operator_input) {
            Ok(out) => trace!("Master demand: {:?}", out),
            Err(e) => warn!("Tuner processing error: {}", e)
        }

        // ---- SIMULATION ----

        bus.step(cycle_period.as_secs_f64());

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            )
        }
    }

    // ---- SHUTDOWN ----

    tuner.shutdown();

    info!("End of execution after {} cycles", tuner.num_cycles);

    Ok(())
}

//! Host simulator for the motion pipeline.
//!
//! Reads frames from stdin and writes status lines to stdout, the same way
//! the firmware talks over its serial link. Coil patterns, servo duty and
//! display frames go to the log.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --features sim --bin motion_sim -- [config.json]
//! ```
//!
//! Besides frames (`:S0D1A090`, `:X45`, ...), three console commands drive
//! the simulated encoder:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `!cw` | One positive detent |
//! | `!ccw` | One negative detent |
//! | `!press` | Button press (advance the menu) |
//!
//! The axis count comes from `MOTION_SIM_AXES` (default 2).

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{bail, Context};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use log::{debug, info, trace};
use tokio::io::{AsyncBufReadExt, BufReader};

use stepper_servo_ctl::{
    CoilPattern, DisplaySnapshot, MotionConfig, MotionDisplay, MotionSystem, StepperDriver,
    Transport, MAX_AXES,
};

const DEFAULT_AXES: usize = 2;

/// PWM resolution of the simulated servo channel.
const SIM_MAX_DUTY: u16 = 10_000;

// ============================================================================
// Simulated hardware
// ============================================================================

struct LogDriver {
    axis: usize,
}

impl StepperDriver for LogDriver {
    type Error = Infallible;

    fn write_pattern(&mut self, pattern: CoilPattern) -> Result<(), Infallible> {
        trace!("axis {} coils {:?}", self.axis, pattern.map(u8::from));
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), Infallible> {
        debug!("axis {} indicator {}", self.axis, if on { "on" } else { "off" });
        Ok(())
    }
}

struct LogPwm {
    duty: u16,
}

impl ErrorType for LogPwm {
    type Error = Infallible;
}

impl SetDutyCycle for LogPwm {
    fn max_duty_cycle(&self) -> u16 {
        SIM_MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        if duty != self.duty {
            debug!("servo duty {duty}/{SIM_MAX_DUTY}");
            self.duty = duty;
        }
        Ok(())
    }
}

struct LogDisplay;

impl MotionDisplay for LogDisplay {
    type Error = Infallible;

    fn render(&mut self, snapshot: &DisplaySnapshot) -> Result<(), Infallible> {
        info!(
            "[display] {:?} | servo {} deg | pending {:?}",
            snapshot.selection, snapshot.servo_angle, snapshot.pending_angles
        );
        Ok(())
    }
}

struct StdoutTransport;

impl Transport for StdoutTransport {
    fn send(&self, line: &str) {
        println!("{line}");
    }
}

// ============================================================================
// Startup
// ============================================================================

fn load_config() -> anyhow::Result<MotionConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(MotionConfig::default());
    };
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {path}"))
}

fn axis_count() -> anyhow::Result<usize> {
    let count = match std::env::var("MOTION_SIM_AXES") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("MOTION_SIM_AXES={value:?}"))?,
        Err(_) => DEFAULT_AXES,
    };
    if count == 0 || count > MAX_AXES {
        bail!("axis count must be 1..={MAX_AXES}, got {count}");
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = load_config()?;
    let axes = axis_count()?;
    info!("starting simulator with {axes} axes");

    let drivers = (0..axes).map(|axis| LogDriver { axis }).collect();
    let system = MotionSystem::start(
        &config,
        drivers,
        LogPwm { duty: 0 },
        LogDisplay,
        Arc::new(StdoutTransport),
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "!cw" => system.encoder().rotation_edge(true),
            "!ccw" => system.encoder().rotation_edge(false),
            "!press" => system.encoder().button_edge(),
            // Rejections are already echoed on stdout
            _ => {
                let _ = system.sender().deliver_line(&line).await;
            }
        }
    }

    info!("stdin closed");
    system.shutdown();
    Ok(())
}

//! # mclick
//!
//! Synthesizes left and right mouse clicks through a Linux `uinput` virtual
//! device, either a fixed number of times or for a fixed amount of time.
//!
//! ```no_run
//! use mclick::{driver, Button, ClickRequest, DeviceSettings, VirtualMouse};
//! use std::{num::NonZeroU32, time::Duration};
//!
//! let mut mouse = VirtualMouse::acquire(&DeviceSettings::default())?;
//! let request = ClickRequest::counted(
//!     Button::Left,
//!     NonZeroU32::new(3).unwrap(),
//!     Duration::from_millis(50),
//!     Duration::from_millis(100),
//! );
//! driver::run(&mut mouse, &request)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod args;
pub mod cli;
pub mod config;
mod device;
pub mod driver;
pub mod error;

pub use args::{normalize_args, usage, Args, Invocation};
pub use config::{Button, ClickConfig, ClickRequest, Preset, Termination};
pub use device::{DeviceId, DeviceSettings, EventSink, VirtualMouse};
pub use driver::RunReport;
pub use error::{ArgumentError, ClickError, DeviceError, DeviceStage, EmitError, EmitKind, Result};

use tracing::info;

/// Brings up the virtual mouse described by `config` and runs the clicks.
///
/// The device is released before this returns, whether the run finished or
/// failed part way through.
pub fn run(config: &ClickConfig) -> Result<RunReport> {
    let settings = DeviceSettings::with_path(&config.device_path);
    let mut mouse = VirtualMouse::acquire(&settings)?;
    info!(
        name = mouse.name(),
        path = %mouse.path().display(),
        button = %config.request.button,
        "virtual mouse ready"
    );

    let report = driver::run(&mut mouse, &config.request)?;
    info!(cycles = report.cycles, elapsed = ?report.elapsed, "done");
    Ok(report)
}

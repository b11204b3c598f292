use clap::{CommandFactory, Parser};
use std::{ffi::OsString, path::PathBuf};
use tracing::info;

use crate::config::{
    parse_count, parse_duration, Button, ClickConfig, Preset, DEFAULT_CLICK_SPEED_MS,
    DEFAULT_DEVICE_PATH, DEFAULT_HOLD_MS,
};
use crate::error::ArgumentError;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "mclick",
    version,
    about = "Mouse click automation",
    disable_help_flag = true,
    after_help = "Durations are milliseconds (500, 500ms) or seconds (5s)."
)]
pub struct Args {
    /// Button to click: l or r
    pub button: Option<String>,

    /// Number of clicks (default 1)
    pub count: Option<String>,

    #[arg(short = 'h', long, value_name = "DURATION", allow_hyphen_values = true, help = format!("Hold duration (default {DEFAULT_HOLD_MS}ms)"))]
    pub hold: Option<String>,

    #[arg(short = 'c', long = "clickspeed", value_name = "DURATION", allow_hyphen_values = true, help = format!("Delay between clicks, also -cs (default {DEFAULT_CLICK_SPEED_MS}ms)"))]
    pub click_speed: Option<String>,

    /// Click continuously for this long instead of a fixed count
    #[arg(short = 't', long = "time", value_name = "DURATION", allow_hyphen_values = true)]
    pub time: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub debug: bool,

    /// Load click settings from a JSON preset
    #[arg(long, value_name = "FILE", allow_hyphen_values = true)]
    pub config: Option<PathBuf>,

    /// Save the effective click settings to a JSON preset after a successful run
    #[arg(long, value_name = "FILE", allow_hyphen_values = true)]
    pub save_config: Option<PathBuf>,

    /// uinput device node
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DEVICE_PATH, allow_hyphen_values = true)]
    pub device: PathBuf,

    /// Print this help
    #[arg(long)]
    pub help: bool,
}

/// What the raw command line asks for, before clap sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Usage,
    Run(Vec<OsString>),
}

/// Options that consume the following token as their value.
const VALUE_OPTIONS: &[&str] = &[
    "-h",
    "--hold",
    "-c",
    "--clickspeed",
    "-t",
    "--time",
    "--config",
    "--save-config",
    "--device",
];

/// Handles the spellings clap can't express: a bare invocation or `-h`
/// in first position asks for help, and `-cs` in option position means
/// `--clickspeed`.
pub fn normalize_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    match args.get(1).and_then(|arg| arg.to_str()) {
        None => return Invocation::Usage,
        Some("-h" | "--help") => return Invocation::Usage,
        Some(_) => {}
    }

    let mut expects_value = false;
    let args = args
        .into_iter()
        .map(|arg| {
            let is_value = expects_value;
            expects_value = !is_value && arg.to_str().is_some_and(|a| VALUE_OPTIONS.contains(&a));
            if !is_value && arg == "-cs" {
                expects_value = true;
                OsString::from("--clickspeed")
            } else {
                arg
            }
        })
        .collect();
    Invocation::Run(args)
}

pub fn usage() -> String {
    Args::command().render_help().to_string()
}

impl Args {
    /// Builds the run configuration. Values on the command line override the
    /// preset loaded with `--config`.
    pub fn load_from_config_or_default(&self) -> Result<ClickConfig, ArgumentError> {
        let request = self.effective_preset()?.to_request()?;

        Ok(ClickConfig {
            request,
            debug: self.debug,
            device_path: self.device.clone(),
        })
    }

    /// Writes the effective settings to the `--save-config` file, if one was
    /// given. Meant to be called once a run has completed.
    pub fn save_config_if_requested(&self) -> Result<(), ArgumentError> {
        let Some(path) = &self.save_config else {
            return Ok(());
        };
        self.effective_preset()?.save_to_file(path)?;
        info!(path = %path.display(), "saved preset");
        Ok(())
    }

    fn effective_preset(&self) -> Result<Preset, ArgumentError> {
        let mut preset = match &self.config {
            Some(path) => {
                let preset = Preset::load_from_file(path)?;
                info!(path = %path.display(), "loaded preset");
                preset
            }
            None => Preset::default(),
        };

        if let Some(token) = &self.button {
            preset.button = Some(Button::from_token(token)?);
        }
        if let Some(count) = &self.count {
            preset.count = Some(parse_count(count)?.get());
            // a count typed here beats a time budget from the preset
            if self.time.is_none() {
                preset.time_ms = None;
            }
        }
        if let Some(hold) = &self.hold {
            preset.hold_ms = Some(millis(parse_duration(hold)?));
        }
        if let Some(speed) = &self.click_speed {
            preset.click_speed_ms = Some(millis(parse_duration(speed)?));
        }
        if let Some(time) = &self.time {
            preset.time_ms = Some(millis(parse_duration(time)?));
        }
        Ok(preset)
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

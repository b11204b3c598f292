use input_linux::Key;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

use crate::error::ArgumentError;

/// Press duration in milliseconds, `-h`.
pub const DEFAULT_HOLD_MS: u64 = 120;
/// Delay between clicks in milliseconds, `-cs`.
pub const DEFAULT_CLICK_SPEED_MS: u64 = 120;
pub const DEFAULT_CLICK_COUNT: NonZeroU32 = NonZeroU32::MIN;

pub const DEFAULT_DEVICE_PATH: &str = "/dev/uinput";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Left,
    Right,
}

impl Button {
    /// Parses a button token. Only the first character counts, so `l`,
    /// `left` and `lmb` all select the primary button.
    pub fn from_token(token: &str) -> Result<Self, ArgumentError> {
        match token.chars().next() {
            Some('l') => Ok(Button::Left),
            Some('r') => Ok(Button::Right),
            _ => Err(ArgumentError::InvalidButton(token.to_owned())),
        }
    }

    pub fn key(self) -> Key {
        match self {
            Button::Left => Key::ButtonLeft,
            Button::Right => Key::ButtonRight,
        }
    }

    pub fn code(self) -> u16 {
        self.key() as u16
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::Left => f.write_str("left"),
            Button::Right => f.write_str("right"),
        }
    }
}

/// When a run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exactly this many clicks.
    Count(NonZeroU32),
    /// Keep clicking until this much wall time has passed at a cycle boundary.
    Timed(Duration),
}

/// One invocation of the click driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRequest {
    pub button: Button,
    pub hold: Duration,
    pub click_speed: Duration,
    pub termination: Termination,
}

impl ClickRequest {
    pub fn counted(button: Button, count: NonZeroU32, hold: Duration, click_speed: Duration) -> Self {
        Self {
            button,
            hold,
            click_speed,
            termination: Termination::Count(count),
        }
    }

    pub fn timed(button: Button, budget: Duration, hold: Duration, click_speed: Duration) -> Self {
        Self {
            button,
            hold,
            click_speed,
            termination: Termination::Timed(budget),
        }
    }

    /// Length of one press/hold/release/wait cycle.
    pub fn cycle(&self) -> Duration {
        self.hold + self.click_speed
    }
}

/// Everything a run needs, built once at start-up and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickConfig {
    pub request: ClickRequest,
    pub debug: bool,
    pub device_path: PathBuf,
}

/// Click settings stored on disk as JSON. Missing fields fall back to the
/// command line or to the built-in defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Preset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_speed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
}

impl Preset {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ArgumentError> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ArgumentError::preset(path.display(), e))?;
        fs::write(path, json).map_err(|e| ArgumentError::preset(path.display(), e))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArgumentError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ArgumentError::preset(path.display(), e))?;
        let preset: Preset =
            serde_json::from_str(&json).map_err(|e| ArgumentError::preset(path.display(), e))?;
        Ok(preset)
    }

    /// Resolves the preset into a request, applying defaults and rejecting
    /// zero durations or counts. A time budget wins over a count.
    pub fn to_request(&self) -> Result<ClickRequest, ArgumentError> {
        let button = self.button.ok_or(ArgumentError::MissingButton)?;
        let hold = positive_millis(self.hold_ms.unwrap_or(DEFAULT_HOLD_MS))?;
        let click_speed = positive_millis(self.click_speed_ms.unwrap_or(DEFAULT_CLICK_SPEED_MS))?;

        let termination = match (self.time_ms, self.count) {
            (Some(time_ms), count) => {
                if let Some(count) = count {
                    warn!(count, time_ms, "both a count and a time were given, clicking for the time");
                }
                Termination::Timed(positive_millis(time_ms)?)
            }
            (None, Some(count)) => Termination::Count(
                NonZeroU32::new(count).ok_or_else(|| ArgumentError::InvalidCount(count.to_string()))?,
            ),
            (None, None) => Termination::Count(DEFAULT_CLICK_COUNT),
        };

        Ok(ClickRequest {
            button,
            hold,
            click_speed,
            termination,
        })
    }
}

fn positive_millis(ms: u64) -> Result<Duration, ArgumentError> {
    if ms == 0 {
        return Err(ArgumentError::invalid_duration("0", "duration must be positive"));
    }
    Ok(Duration::from_millis(ms))
}

/// Parses a duration given as bare milliseconds (`500`), with an `ms`
/// suffix (`500ms`) or in seconds (`5s`).
pub fn parse_duration(value: &str) -> Result<Duration, ArgumentError> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(ArgumentError::invalid_duration(value, "expected a positive integer"));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|_| ArgumentError::invalid_duration(value, "number is too large"))?;
    if amount == 0 {
        return Err(ArgumentError::invalid_duration(value, "duration must be positive"));
    }

    let ms = match unit {
        "" | "ms" => amount,
        "s" => amount
            .checked_mul(1000)
            .ok_or_else(|| ArgumentError::invalid_duration(value, "number is too large"))?,
        other => {
            return Err(ArgumentError::invalid_duration(
                value,
                format!("unknown unit '{other}', use 'ms' or 's'"),
            ))
        }
    };
    Ok(Duration::from_millis(ms))
}

pub fn parse_count(value: &str) -> Result<NonZeroU32, ArgumentError> {
    value
        .trim()
        .parse::<NonZeroU32>()
        .map_err(|_| ArgumentError::InvalidCount(value.to_owned()))
}

//! Error types for mclick.
//!
//! Every failure is fatal: device bring-up, event emission and argument
//! validation each get their own type, and [`ClickError`] ties them together
//! for the binary, which turns them into exit codes.

use std::{fmt, io};
use thiserror::Error;

use crate::config::Button;

/// Step of the virtual device bring-up that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    Open,
    Capabilities,
    Descriptor,
    Create,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            DeviceStage::Open => "open uinput device",
            DeviceStage::Capabilities => "set device capabilities",
            DeviceStage::Descriptor => "write device info",
            DeviceStage::Create => "create device",
        };
        f.write_str(stage)
    }
}

/// The virtual device could not be brought up.
#[derive(Error, Debug)]
#[error("failed to {stage}: {source}")]
pub struct DeviceError {
    pub stage: DeviceStage,
    #[source]
    pub source: io::Error,
}

impl DeviceError {
    pub fn new(stage: DeviceStage, source: io::Error) -> Self {
        Self { stage, source }
    }

    /// Permission problems on the device node are worth a hint about root.
    pub fn is_permission_denied(&self) -> bool {
        self.source.kind() == io::ErrorKind::PermissionDenied
    }
}

/// Which half of a press/release action failed to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Key,
    Sync,
}

impl fmt::Display for EmitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitKind::Key => f.write_str("key"),
            EmitKind::Sync => f.write_str("sync"),
        }
    }
}

/// A single event write failed.
#[derive(Error, Debug)]
#[error("failed to send {kind} event for {button} (value={value}): {source}")]
pub struct EmitError {
    pub kind: EmitKind,
    pub button: Button,
    pub value: i32,
    #[source]
    pub source: io::Error,
}

/// Malformed or missing command line input.
#[derive(Error, Debug)]
pub enum ArgumentError {
    #[error("invalid button '{0}', use 'l' or 'r'")]
    InvalidButton(String),

    #[error("no button given, use 'l' or 'r'")]
    MissingButton,

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("invalid count '{0}': must be a positive integer")]
    InvalidCount(String),

    #[error("preset '{path}': {reason}")]
    Preset { path: String, reason: String },
}

impl ArgumentError {
    pub fn invalid_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn preset(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Preset {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Top level error of a click run.
#[derive(Error, Debug)]
pub enum ClickError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl ClickError {
    /// Process exit status for this failure. Usage output exits with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ClickError::Argument(_) => 2,
            ClickError::Device(_) => 3,
            ClickError::Emit(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClickError>;

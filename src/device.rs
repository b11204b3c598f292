use input_linux::{sys, EventKind, Key, UInputHandle};
use nix::fcntl::OFlag;
use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::config::DEFAULT_DEVICE_PATH;
use crate::error::{DeviceError, DeviceStage};

/// Anything that accepts raw input events. The virtual mouse writes them to
/// uinput; tests record them.
pub trait EventSink {
    /// Writes the events and returns how many were accepted.
    fn write(&mut self, events: &[sys::input_event]) -> io::Result<usize>;
}

const BUS_USB: u16 = 0x03;

/// Bus and vendor identifiers reported by the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for DeviceId {
    fn default() -> Self {
        Self {
            bustype: BUS_USB,
            vendor: 0x1234,
            product: 0x5678,
            version: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub path: PathBuf,
    pub name: String,
    pub id: DeviceId,
}

impl DeviceSettings {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
            name: "virtual-mouse".to_owned(),
            id: DeviceId::default(),
        }
    }
}

/// A uinput mouse with left and right buttons.
///
/// The device is destroyed and the file closed when this value is dropped,
/// so every exit path releases it.
pub struct VirtualMouse {
    handler: UInputHandle<File>,
    name: String,
    path: PathBuf,
    created: bool,
}

impl VirtualMouse {
    /// Opens, configures and creates the device in one go.
    pub fn acquire(settings: &DeviceSettings) -> Result<Self, DeviceError> {
        let mut mouse = Self::uinput_open(&settings.path, &settings.name)?;
        mouse.add_mouse_attributes()?;
        mouse.create(settings.id)?;
        Ok(mouse)
    }

    pub fn uinput_open(path: impl AsRef<Path>, name: &str) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|e| DeviceError::new(DeviceStage::Open, e))?;
        debug!(path = %path.display(), "opened uinput node");

        Ok(Self {
            handler: UInputHandle::new(file),
            name: name.to_owned(),
            path: path.to_path_buf(),
            created: false,
        })
    }

    pub fn add_mouse_attributes(&self) -> Result<(), DeviceError> {
        let set_bits = || -> io::Result<()> {
            self.handler.set_evbit(EventKind::Key)?;
            self.handler.set_keybit(Key::ButtonLeft)?;
            self.handler.set_keybit(Key::ButtonRight)?;
            Ok(())
        };
        set_bits().map_err(|e| DeviceError::new(DeviceStage::Capabilities, e))
    }

    /// Writes the device descriptor and asks the kernel to create the device.
    pub fn create(&mut self, id: DeviceId) -> Result<(), DeviceError> {
        let mut setup: sys::uinput_setup = unsafe { std::mem::zeroed() };
        setup.id = sys::input_id {
            bustype: id.bustype,
            vendor: id.vendor,
            product: id.product,
            version: id.version,
        };
        // keep the trailing nul
        let max = setup.name.len() - 1;
        for (dst, src) in setup.name.iter_mut().zip(self.name.bytes().take(max)) {
            *dst = src as _;
        }

        self.handler
            .dev_setup(&setup)
            .map_err(|e| DeviceError::new(DeviceStage::Descriptor, e))?;
        self.handler
            .dev_create()
            .map_err(|e| DeviceError::new(DeviceStage::Create, e))?;
        self.created = true;

        debug!(
            name = %self.name,
            vendor = id.vendor,
            product = id.product,
            "virtual device created"
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for VirtualMouse {
    fn write(&mut self, events: &[sys::input_event]) -> io::Result<usize> {
        self.handler.write(events)
    }
}

impl Drop for VirtualMouse {
    fn drop(&mut self) {
        if self.created {
            if let Err(e) = self.handler.dev_destroy() {
                warn!(error = %e, "failed to destroy virtual device");
            } else {
                debug!(name = %self.name, "virtual device destroyed");
            }
        }
    }
}

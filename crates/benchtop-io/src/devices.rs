//! Device enumeration and lookup via cpal.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use crate::{Error, Result};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Input channels of the default input configuration, 0 if none.
    pub input_channels: u16,
    /// Output channels of the default output configuration, 0 if none.
    pub output_channels: u16,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

impl AudioDevice {
    /// Whether the device can capture.
    pub fn is_input(&self) -> bool {
        self.input_channels > 0
    }

    /// Whether the device can play.
    pub fn is_output(&self) -> bool {
        self.output_channels > 0
    }
}

fn describe(device: &Device) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let input = device.default_input_config().ok();
    let output = device.default_output_config().ok();
    let default_sample_rate = output
        .as_ref()
        .or(input.as_ref())
        .map_or(48000, |c| c.sample_rate());
    Some(AudioDevice {
        name,
        input_channels: input.map_or(0, |c| c.channels()),
        output_channels: output.map_or(0, |c| c.channels()),
        default_sample_rate,
    })
}

/// List all available audio devices, each name once.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices: Vec<AudioDevice> = Vec::new();

    let inputs = host.input_devices().map_err(|e| Error::Stream(e.to_string()))?;
    let outputs = host.output_devices().map_err(|e| Error::Stream(e.to_string()))?;
    for device in inputs.chain(outputs) {
        if let Some(info) = describe(&device)
            && !devices.iter().any(|d| d.name == info.name)
        {
            devices.push(info);
        }
    }

    Ok(devices)
}

/// Default input and output devices, if any.
pub fn default_device() -> Result<(Option<AudioDevice>, Option<AudioDevice>)> {
    let host = cpal::default_host();
    let input = host.default_input_device().and_then(|d| describe(&d));
    let output = host.default_output_device().and_then(|d| describe(&d));
    Ok((input, output))
}

/// Find an output device whose name contains `name` (case-insensitive), or
/// the default output device.
pub(crate) fn find_output_device(host: &Host, name: Option<&str>) -> Result<Device> {
    match name {
        Some(search) => {
            let devices = host
                .output_devices()
                .map_err(|e| Error::Stream(e.to_string()))?;
            find_by_name(devices, search)
                .ok_or_else(|| Error::DeviceNotFound(format!("no output device matching '{search}'")))
        }
        None => host.default_output_device().ok_or(Error::NoDevice),
    }
}

/// Find an input device whose name contains `name` (case-insensitive), or
/// the default input device. `Ok(None)` when the system has no input at all.
pub(crate) fn find_input_device(host: &Host, name: Option<&str>) -> Result<Option<Device>> {
    match name {
        Some(search) => {
            let devices = host
                .input_devices()
                .map_err(|e| Error::Stream(e.to_string()))?;
            find_by_name(devices, search)
                .map(Some)
                .ok_or_else(|| Error::DeviceNotFound(format!("no input device matching '{search}'")))
        }
        None => Ok(host.default_input_device()),
    }
}

fn find_by_name(mut devices: impl Iterator<Item = Device>, search: &str) -> Option<Device> {
    let search = search.to_lowercase();
    devices.find(|device| {
        device_name(device).is_ok_and(|name| name.to_lowercase().contains(&search))
    })
}

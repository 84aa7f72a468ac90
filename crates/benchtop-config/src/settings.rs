//! The persisted settings document.

use std::path::Path;

use benchtop_core::{DEFAULT_HOLD_SIZE, ProcessorHandle, RoutingFlags, SlotId};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Device selection and stream parameters, restored at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Input device name filter, default device if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,
    /// Output device name filter, default device if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Block size in frames.
    pub buffer_size: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: 48000,
            buffer_size: 512,
        }
    }
}

/// Routing and normalized control values of one processor slot.
///
/// Stored with the name of the processor they were captured from; they are
/// only applied back onto a processor of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSettings {
    /// Display name of the processor the values belong to.
    pub processor: String,
    /// Source A feeds the slot.
    pub source_a: bool,
    /// Source B feeds the slot.
    pub source_b: bool,
    /// The slot contributes to the output.
    pub enabled: bool,
    /// The slot output is inverted.
    pub inverted: bool,
    /// The slot is processed but silenced.
    pub muted: bool,
    /// Normalized control values in index order.
    pub controls: Vec<f64>,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self::from_routing(String::new(), RoutingFlags::default(), Vec::new())
    }
}

impl SlotSettings {
    fn from_routing(processor: String, flags: RoutingFlags, controls: Vec<f64>) -> Self {
        Self {
            processor,
            source_a: flags.source_a,
            source_b: flags.source_b,
            enabled: flags.enabled,
            inverted: flags.inverted,
            muted: flags.muted,
            controls,
        }
    }

    /// Record the current state of a processor slot.
    pub fn capture(handle: &ProcessorHandle) -> Self {
        Self::from_routing(
            handle.name().to_string(),
            handle.routing().load(),
            handle.control_values(),
        )
    }

    /// The stored routing flags.
    pub fn routing(&self) -> RoutingFlags {
        RoutingFlags {
            source_a: self.source_a,
            source_b: self.source_b,
            enabled: self.enabled,
            inverted: self.inverted,
            muted: self.muted,
        }
    }

    /// Restore routing and controls onto `handle`.
    ///
    /// Returns `false`, touching nothing, when the slot now holds a
    /// different processor. Surplus stored values are ignored; missing ones
    /// leave the control as it is.
    pub fn apply_to(&self, handle: &ProcessorHandle) -> bool {
        if self.processor != handle.name() {
            return false;
        }
        handle.routing().store(self.routing());
        for (index, &value) in self.controls.iter().take(handle.num_controls()).enumerate() {
            handle.set_control_value(index, value);
        }
        true
    }
}

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Snapshot hold size in samples.
    pub hold_size: u32,
    /// Device blob.
    pub device: DeviceSettings,
    /// Processor slots A and B.
    pub slots: [SlotSettings; 2],
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            hold_size: DEFAULT_HOLD_SIZE,
            device: DeviceSettings::default(),
            slots: [SlotSettings::default(), SlotSettings::default()],
        }
    }
}

impl BenchSettings {
    /// Settings of slot `id`.
    pub fn slot(&self, id: SlotId) -> &SlotSettings {
        &self.slots[id.index()]
    }

    /// Mutable settings of slot `id`.
    pub fn slot_mut(&mut self, id: SlotId) -> &mut SlotSettings {
        &mut self.slots[id.index()]
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize the settings to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the settings to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Record the routing and controls of both slots from a running bench.
    pub fn capture_slots(&mut self, slots: [&ProcessorHandle; 2]) {
        for id in SlotId::ALL {
            self.slots[id.index()] = SlotSettings::capture(slots[id.index()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BenchSettings::default();
        assert_eq!(settings.hold_size, 4096);
        assert_eq!(settings.device.sample_rate, 48000);
        assert_eq!(settings.device.buffer_size, 512);
        assert_eq!(settings.slot(SlotId::A).routing(), RoutingFlags::default());
        assert!(settings.slot(SlotId::B).processor.is_empty());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let settings = BenchSettings::from_toml(
            r#"
            hold_size = 8192

            [device]
            output_device = "Speakers"
            "#,
        )
        .unwrap();
        assert_eq!(settings.hold_size, 8192);
        assert_eq!(settings.device.output_device.as_deref(), Some("Speakers"));
        assert_eq!(settings.device.sample_rate, 48000);
        assert_eq!(settings.slots, BenchSettings::default().slots);
    }

    #[test]
    fn test_slot_table_syntax() {
        let settings = BenchSettings::from_toml(
            r#"
            [[slots]]
            processor = "PEQ"
            source_b = true
            controls = [0.25, 0.75]

            [[slots]]
            processor = "Gain"
            enabled = false
            "#,
        )
        .unwrap();
        let a = settings.slot(SlotId::A);
        assert_eq!(a.processor, "PEQ");
        assert!(a.source_a && a.source_b);
        assert_eq!(a.controls, vec![0.25, 0.75]);
        assert!(!settings.slot(SlotId::B).routing().enabled);
    }

    #[test]
    fn test_wrong_slot_count_is_rejected() {
        let result = BenchSettings::from_toml("[[slots]]\nprocessor = \"PEQ\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_to_toml_reparses() {
        let mut settings = BenchSettings::default();
        settings.device.input_device = Some("USB".into());
        settings.slot_mut(SlotId::B).muted = true;
        let text = settings.to_toml().unwrap();
        assert!(text.contains("[device]"));
        assert_eq!(BenchSettings::from_toml(&text).unwrap(), settings);
    }
}

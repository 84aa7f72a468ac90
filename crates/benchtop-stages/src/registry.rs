//! Registry of the processors-under-test that can be put into a slot.
//!
//! Processors are selected by id at composition time. The registry also
//! provides the metadata the CLI prints without instantiating anything.

use benchtop_core::{ControlSpec, PassThrough, Processor};

use crate::processors::{Gain, ParametricEq};

/// Describes a processor in the registry.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    /// Unique identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Display name, equal to [`Processor::name`] of the created instance.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Declared controls.
    pub controls: &'static [ControlSpec],
}

type ProcessorFactory = fn() -> Box<dyn Processor>;

struct RegistryEntry {
    descriptor: ProcessorDescriptor,
    factory: ProcessorFactory,
}

/// Registry of all available processors.
pub struct ProcessorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    /// Create a registry with every built-in processor registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(3),
        };
        registry.register_builtin_processors();
        registry
    }

    fn register_builtin_processors(&mut self) {
        self.register(
            ProcessorDescriptor {
                id: "thru",
                name: "Thru",
                description: "Pass-through, the content of an empty slot",
                controls: PassThrough.controls(),
            },
            || Box::new(PassThrough),
        );

        self.register(
            ProcessorDescriptor {
                id: "gain",
                name: "Gain",
                description: "Broadband gain, -60 to +12 dB",
                controls: Gain.controls(),
            },
            || Box::new(Gain),
        );

        self.register(
            ProcessorDescriptor {
                id: "peq",
                name: "PEQ",
                description: "Single-band peaking equalizer",
                controls: ParametricEq::new().controls(),
            },
            || Box::new(ParametricEq::new()),
        );
    }

    /// Register a processor. Lookups return the first entry with a matching id.
    pub fn register(&mut self, descriptor: ProcessorDescriptor, factory: ProcessorFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Descriptors of every registered processor, in registration order.
    pub fn all_processors(&self) -> Vec<&ProcessorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Descriptor by id.
    pub fn get(&self, id: &str) -> Option<&ProcessorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create a processor by id.
    pub fn create(&self, id: &str) -> Option<Box<dyn Processor>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)())
    }

    /// Create a processor by id, falling back to the display name
    /// (case-insensitive).
    pub fn create_by_id_or_name(&self, key: &str) -> Option<Box<dyn Processor>> {
        self.create(key).or_else(|| {
            self.entries
                .iter()
                .find(|e| e.descriptor.name.eq_ignore_ascii_case(key))
                .map(|e| (e.factory)())
        })
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_processors() {
        let registry = ProcessorRegistry::new();
        assert_eq!(registry.len(), 3);
        let ids: Vec<_> = registry.all_processors().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["thru", "gain", "peq"]);
    }

    #[test]
    fn test_descriptors_match_instances() {
        let registry = ProcessorRegistry::new();
        for descriptor in registry.all_processors() {
            let processor = registry.create(descriptor.id).unwrap();
            assert_eq!(processor.name(), descriptor.name);
            assert_eq!(processor.num_controls(), descriptor.controls.len());
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let registry = ProcessorRegistry::new();
        assert_eq!(registry.create_by_id_or_name("peq").unwrap().name(), "PEQ");
        assert_eq!(registry.create_by_id_or_name("Gain").unwrap().name(), "Gain");
        assert!(registry.create("missing").is_none());
        assert!(registry.get("missing").is_none());
    }
}

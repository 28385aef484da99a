//! Converter registry
//!
//! Maps (input, output) format pairs to converter implementations.
//! Registration happens once at process start, after which the registry is
//! immutable and safe to share across concurrent job executions without
//! locking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use transmute_core::Format;

use crate::converter::{Converter, ConverterDescriptor};

/// Registry for managing and resolving converters.
///
/// Resolution is deterministic: registration order is the priority order,
/// and the first converter registered for a pair keeps it. A pair is never
/// ambiguous at call time.
#[derive(Default)]
pub struct ConverterRegistry {
    by_pair: HashMap<(Format, Format), Arc<dyn Converter>>,
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for every (input, output) pair it declares.
    /// Pairs already owned by an earlier registration are left untouched.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        let mut claimed = 0usize;
        for input in converter.inputs() {
            for output in converter.compatible_outputs(&input) {
                let key = (input.clone(), output);
                if let std::collections::hash_map::Entry::Vacant(entry) = self.by_pair.entry(key) {
                    entry.insert(converter.clone());
                    claimed += 1;
                }
            }
        }

        tracing::info!(
            converter = converter.name(),
            pairs = claimed,
            "Registered converter"
        );

        self.converters.push(converter);
    }

    /// Resolve the converter for a format pair, if any is registered.
    pub fn resolve(&self, input: &Format, output: &Format) -> Option<Arc<dyn Converter>> {
        self.by_pair
            .get(&(input.clone(), output.clone()))
            .cloned()
    }

    /// All output formats reachable from the given input format, across all
    /// registered converters. Drives the `compatible_formats` hint returned
    /// to clients after upload.
    pub fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
        self.converters
            .iter()
            .filter(|c| c.inputs().contains(input))
            .flat_map(|c| c.compatible_outputs(input))
            .collect()
    }

    /// Every format that appears in at least one registered pair.
    pub fn all_formats(&self) -> BTreeSet<Format> {
        self.by_pair
            .keys()
            .flat_map(|(i, o)| [i.clone(), o.clone()])
            .collect()
    }

    /// Descriptors of all registered converters, in priority order.
    pub fn descriptors(&self) -> Vec<ConverterDescriptor> {
        self.converters
            .iter()
            .map(|c| ConverterDescriptor {
                name: c.name(),
                inputs: c.inputs().iter().map(|f| f.to_string()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{format_set, ConvertError, ConvertRequest};
    use async_trait::async_trait;

    /// Mock converter claiming a fixed set of formats, full cross product.
    struct MockConverter {
        name: &'static str,
        formats: &'static [&'static str],
    }

    #[async_trait]
    impl Converter for MockConverter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn inputs(&self) -> BTreeSet<Format> {
            format_set(self.formats)
        }

        fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
            let mut outputs = format_set(self.formats);
            outputs.remove(input);
            outputs
        }

        async fn convert(
            &self,
            _data: &[u8],
            _request: &ConvertRequest,
        ) -> Result<Vec<u8>, ConvertError> {
            Ok(self.name.as_bytes().to_vec())
        }
    }

    fn fmt(s: &str) -> Format {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = ConverterRegistry::new();
        assert!(registry.resolve(&fmt("png"), &fmt("jpeg")).is_none());
        assert!(registry.compatible_outputs(&fmt("png")).is_empty());
        assert!(registry.all_formats().is_empty());
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(MockConverter {
            name: "mock_image",
            formats: &["png", "jpeg", "gif"],
        }));

        let resolved = registry.resolve(&fmt("png"), &fmt("jpeg")).unwrap();
        assert_eq!(resolved.name(), "mock_image");

        // Identity pairs are not registered
        assert!(registry.resolve(&fmt("png"), &fmt("png")).is_none());
        // Unknown pair
        assert!(registry.resolve(&fmt("png"), &fmt("mp3")).is_none());
    }

    #[test]
    fn test_first_registered_wins_overlapping_pairs() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(MockConverter {
            name: "first",
            formats: &["gif", "png"],
        }));
        registry.register(Arc::new(MockConverter {
            name: "second",
            formats: &["gif", "png", "webp"],
        }));

        // Overlapping pair stays with the earlier registration
        assert_eq!(
            registry.resolve(&fmt("gif"), &fmt("png")).unwrap().name(),
            "first"
        );
        // Pair only the later converter offers
        assert_eq!(
            registry.resolve(&fmt("gif"), &fmt("webp")).unwrap().name(),
            "second"
        );
    }

    #[test]
    fn test_compatible_outputs_union() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(MockConverter {
            name: "a",
            formats: &["gif", "png"],
        }));
        registry.register(Arc::new(MockConverter {
            name: "b",
            formats: &["gif", "mp4"],
        }));

        let outputs = registry.compatible_outputs(&fmt("gif"));
        assert!(outputs.contains(&fmt("png")));
        assert!(outputs.contains(&fmt("mp4")));
        assert!(!outputs.contains(&fmt("gif")));
    }

    #[test]
    fn test_resolution_uses_normalized_formats() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(MockConverter {
            name: "mock",
            formats: &["jpeg", "png"],
        }));

        // "jpg" and ".JPG" normalize to "jpeg"
        assert!(registry
            .resolve(&".JPG".parse().unwrap(), &fmt("png"))
            .is_some());
    }

    #[test]
    fn test_descriptors_in_priority_order() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(MockConverter {
            name: "a",
            formats: &["png"],
        }));
        registry.register(Arc::new(MockConverter {
            name: "b",
            formats: &["csv"],
        }));

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name, "a");
        assert_eq!(descriptors[1].name, "b");
    }
}

//! Closed table of integration variants.
//!
//! Maps a type identifier to the variant's parameter schema and a
//! constructor. Both console input and the persisted store go through
//! here, so a variant registered once is constructible from either.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{FileIntegration, Integration, IntegrationError, Parameters};

/// One declared constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Key used in parameter maps and in the store.
    pub name: &'static str,
    /// Console flag, e.g. `-t`.
    pub flag: &'static str,
    pub description: &'static str,
}

/// Builds an instance from already validated parameters.
pub type Constructor = fn(&Parameters) -> Result<Arc<dyn Integration>, IntegrationError>;

/// Type-level metadata of one integration variant.
#[derive(Clone)]
pub struct IntegrationDescriptor {
    pub kind: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParamSpec],
    constructor: Constructor,
}

impl fmt::Debug for IntegrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationDescriptor")
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl IntegrationDescriptor {
    pub const fn new(
        kind: &'static str,
        description: &'static str,
        parameters: &'static [ParamSpec],
        constructor: Constructor,
    ) -> Self {
        Self {
            kind,
            description,
            parameters,
            constructor,
        }
    }

    /// Construct an instance, failing on the first missing schema parameter.
    ///
    /// Parameters the schema does not declare are ignored.
    pub fn build(&self, parameters: &Parameters) -> Result<Arc<dyn Integration>, IntegrationError> {
        for spec in self.parameters {
            match parameters.get(spec.name) {
                Some(value) if !value.trim().is_empty() => {}
                _ => {
                    return Err(IntegrationError::MissingParameter {
                        kind: self.kind.to_string(),
                        name: spec.name.to_string(),
                        flag: spec.flag.to_string(),
                    });
                }
            }
        }

        for key in parameters.keys() {
            if !self.parameters.iter().any(|spec| spec.name == key) {
                crate::debug_event!("integration", "ignored parameter", "{key} for {}", self.kind);
            }
        }

        (self.constructor)(parameters)
    }

    fn spec_for_flag(&self, flag: &str) -> Option<&ParamSpec> {
        let long = flag.strip_prefix("--");
        self.parameters
            .iter()
            .find(|spec| spec.flag == flag || long == Some(spec.name))
    }
}

/// Registry of all integration variants known to this build.
#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    descriptors: HashMap<&'static str, IntegrationDescriptor>,
}

impl IntegrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in variant.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FileIntegration::descriptor());
        registry
    }

    /// Add a variant. A later registration under the same identifier replaces the earlier one.
    pub fn register(&mut self, descriptor: IntegrationDescriptor) {
        if self.descriptors.insert(descriptor.kind, descriptor).is_some() {
            tracing::warn!("[integration] replaced existing registration");
        }
    }

    pub fn descriptor(&self, kind: &str) -> Result<&IntegrationDescriptor, IntegrationError> {
        self.descriptors
            .get(kind)
            .ok_or_else(|| IntegrationError::UnknownIntegrationType {
                kind: kind.to_string(),
            })
    }

    /// Declared parameters of a variant, in declaration order.
    pub fn schema(&self, kind: &str) -> Result<&'static [ParamSpec], IntegrationError> {
        self.descriptor(kind).map(|d| d.parameters)
    }

    pub fn create(
        &self,
        kind: &str,
        parameters: &Parameters,
    ) -> Result<Arc<dyn Integration>, IntegrationError> {
        self.descriptor(kind)?.build(parameters)
    }

    /// Registered type identifiers, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.descriptors.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Turn `-flag value` pairs into a parameter map keyed by parameter name.
    ///
    /// Flags may be given as the declared short flag or as `--name`.
    /// Undeclared flags are kept under their literal text and later ignored by
    /// [`IntegrationDescriptor::build`].
    pub fn parse_flags<S: AsRef<str>>(
        &self,
        kind: &str,
        args: &[S],
    ) -> Result<Parameters, IntegrationError> {
        let descriptor = self.descriptor(kind)?;
        let mut parameters = Parameters::new();

        for pair in args.chunks(2) {
            let flag = pair[0].as_ref();
            let value = pair.get(1).ok_or_else(|| IntegrationError::MissingValue {
                flag: flag.to_string(),
            })?;
            let key = descriptor
                .spec_for_flag(flag)
                .map(|spec| spec.name.to_string())
                .unwrap_or_else(|| flag.to_string());
            parameters.insert(key, value.as_ref().to_string());
        }

        Ok(parameters)
    }
}

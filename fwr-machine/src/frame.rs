#![forbid(unsafe_code)]

use fwr_ast::{Lifetime, Reference};
use im::OrdMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub location: Reference,
    pub lifetime: Lifetime,
}

/// Variable bindings of the running program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    bindings: OrdMap<String, Binding>,
}

impl StackFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn bind(&self, name: impl Into<String>, location: Reference, lifetime: Lifetime) -> Self {
        Self {
            bindings: self.bindings.update(name.into(), Binding { location, lifetime }),
        }
    }

    /// Forget every binding introduced in `lifetime`.
    pub fn pop(&self, lifetime: &Lifetime) -> Self {
        Self {
            bindings: self
                .bindings
                .iter()
                .filter(|(_, binding)| &binding.lifetime != lifetime)
                .map(|(name, binding)| (name.clone(), binding.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#![forbid(unsafe_code)]

use std::fmt;

use fwr_ast::{Lifetime, Type};
use im::OrdMap;

/// Static information about one variable: its current type and the lifetime
/// it was declared in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub ty: Type,
    pub lifetime: Lifetime,
}

impl Slot {
    pub fn new(ty: Type, lifetime: Lifetime) -> Self {
        Self { ty, lifetime }
    }
}

/// Typing environment. Every update returns a new environment and leaves
/// `self` untouched, so branches can be typed from a shared starting point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    slots: OrdMap<String, Slot>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn put(&self, name: impl Into<String>, slot: Slot) -> Self {
        Self {
            slots: self.slots.update(name.into(), slot),
        }
    }

    pub fn remove(&self, name: &str) -> Self {
        Self {
            slots: self.slots.without(name),
        }
    }

    pub fn remove_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut slots = self.slots.clone();
        for name in names {
            slots.remove(name);
        }
        Self { slots }
    }

    /// Remove every variable declared in `lifetime`.
    pub fn drop_lifetime(&self, lifetime: &Lifetime) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .filter(|(_, slot)| &slot.lifetime != lifetime)
                .map(|(name, slot)| (name.clone(), slot.clone()))
                .collect(),
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Slot)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// A name no program variable can clash with.
    pub fn fresh_name(&self) -> String {
        (0..)
            .map(|i| format!("$tmp{i}"))
            .find(|name| !self.slots.contains_key(name))
            .unwrap_or_default()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, slot)) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}:<{}, {}>", slot.ty, slot.lifetime)?;
        }
        f.write_str("}")
    }
}

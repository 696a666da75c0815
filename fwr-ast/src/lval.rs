#![forbid(unsafe_code)]

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathElement {
    Deref,
    /// Component of a compound value, e.g. `x.1`.
    Index(usize),
}

impl PathElement {
    pub fn conflicts(&self, other: &PathElement) -> bool {
        match (self, other) {
            (PathElement::Deref, PathElement::Deref) => true,
            (PathElement::Index(a), PathElement::Index(b)) => a == b,
            _ => false,
        }
    }
}

/// A storage location reachable from a variable: `x`, `*x`, `**x`, `x.0`, `*(x.1)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LVal {
    pub name: String,
    pub path: Vec<PathElement>,
}

impl LVal {
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Vec::new(),
        }
    }

    pub fn deref(mut self) -> Self {
        self.path.push(PathElement::Deref);
        self
    }

    pub fn index(mut self, i: usize) -> Self {
        self.path.push(PathElement::Index(i));
        self
    }

    pub fn extend(mut self, rest: &[PathElement]) -> Self {
        self.path.extend_from_slice(rest);
        self
    }

    pub fn is_var(&self) -> bool {
        self.path.is_empty()
    }

    /// Two lvals conflict when one is a prefix of the other, for example `x`
    /// and `*x`. Distinct components of the same compound do not conflict.
    pub fn conflicts(&self, other: &LVal) -> bool {
        self.name == other.name
            && self
                .path
                .iter()
                .zip(other.path.iter())
                .all(|(a, b)| a.conflicts(b))
    }
}

impl fmt::Display for LVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.name.clone();
        for element in &self.path {
            out = match element {
                PathElement::Deref => format!("*{out}"),
                PathElement::Index(i) if out.starts_with('*') => format!("({out}).{i}"),
                PathElement::Index(i) => format!("{out}.{i}"),
            };
        }
        f.write_str(&out)
    }
}

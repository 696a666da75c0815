#![forbid(unsafe_code)]

use std::fmt;

/// A location in the machine store: an address plus a path into the compound
/// value stored there.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    pub address: usize,
    pub path: Vec<usize>,
    /// Owning references come from `box` and are responsible for freeing the
    /// cell they point to.
    pub owner: bool,
}

impl Reference {
    pub fn owned(address: usize) -> Self {
        Self {
            address,
            path: Vec::new(),
            owner: true,
        }
    }

    pub fn borrowed(address: usize) -> Self {
        Self {
            address,
            path: Vec::new(),
            owner: false,
        }
    }

    /// The same location, without ownership.
    pub fn to_borrow(&self) -> Self {
        Self {
            address: self.address,
            path: self.path.clone(),
            owner: false,
        }
    }

    pub fn index(&self, i: usize) -> Self {
        let mut path = self.path.clone();
        path.push(i);
        Self {
            address: self.address,
            path,
            owner: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Unit,
    Int(i64),
    Ref(Reference),
    Compound(Vec<Value>),
    /// Contents of a location whose value has been moved out.
    Undefined,
}

impl Value {
    pub fn contains_owner(&self) -> bool {
        match self {
            Value::Ref(r) => r.owner,
            Value::Compound(vs) => vs.iter().any(Value::contains_owner),
            Value::Unit | Value::Int(_) | Value::Undefined => false,
        }
    }

    /// Every reference held by this value, in order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        let mut work = vec![self];
        while let Some(v) = work.pop() {
            match v {
                Value::Ref(r) => out.push(r),
                Value::Compound(vs) => work.extend(vs.iter().rev()),
                Value::Unit | Value::Int(_) | Value::Undefined => {}
            }
        }
        out
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.owner {
            f.write_str("&")?;
        }
        write!(f, "#{}", self.address)?;
        for i in &self.path {
            write!(f, ".{i}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Ref(r) => write!(f, "{r}"),
            Value::Compound(vs) => {
                let parts: Vec<String> = vs.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
            Value::Undefined => f.write_str("⊥"),
        }
    }
}

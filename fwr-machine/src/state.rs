#![forbid(unsafe_code)]

use fwr_ast::{LVal, Lifetime, PathElement, Reference, Value};

use crate::error::Fault;
use crate::frame::StackFrame;
use crate::store::Store;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub frame: StackFrame,
    pub store: Store,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(frame: StackFrame, store: Store) -> Self {
        Self { frame, store }
    }

    pub fn with_store(&self, store: Store) -> Self {
        Self {
            frame: self.frame.clone(),
            store,
        }
    }

    /// Resolve an lval to the location it denotes, reading through every
    /// dereference on the way.
    pub fn locate(&self, lv: &LVal) -> Result<Reference, Fault> {
        let binding = self
            .frame
            .get(&lv.name)
            .ok_or_else(|| Fault::UnboundVariable(lv.name.clone()))?;
        let mut location = binding.location.clone();
        for element in &lv.path {
            location = match element {
                PathElement::Index(i) => location.index(*i),
                PathElement::Deref => match self.store.read(&location)? {
                    Value::Ref(target) => target.to_borrow(),
                    Value::Undefined => return Err(Fault::UndefinedRead(location.address)),
                    other => return Err(Fault::ExpectedReference(other.to_string())),
                },
            };
        }
        Ok(location)
    }

    pub fn read(&self, lv: &LVal) -> Result<Value, Fault> {
        self.store.read(&self.locate(lv)?)
    }

    /// Allocate a cell for `name` in `lifetime` and bind it.
    pub fn declare(&self, name: &str, lifetime: &Lifetime, value: Value) -> State {
        let (store, address) = self.store.allocate(lifetime, value);
        let frame = self
            .frame
            .bind(name, Reference::borrowed(address), lifetime.clone());
        State { frame, store }
    }
}

#![forbid(unsafe_code)]

use std::collections::HashMap;

use fwr_ast::{Lifetime, Reference, Value};
use im::Vector;

use crate::error::Fault;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub lifetime: Lifetime,
    pub value: Value,
}

/// Heap of lifetime-tagged cells. Addresses are handed out in order and never
/// reused; a freed cell leaves a hole.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Store {
    cells: Vector<Option<Cell>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, lifetime: &Lifetime, value: Value) -> (Store, usize) {
        let mut cells = self.cells.clone();
        let address = cells.len();
        cells.push_back(Some(Cell {
            lifetime: lifetime.clone(),
            value,
        }));
        (Store { cells }, address)
    }

    pub fn cell(&self, address: usize) -> Result<&Cell, Fault> {
        match self.cells.get(address) {
            None => Err(Fault::InvalidAddress(address)),
            Some(None) => Err(Fault::DanglingReference(address)),
            Some(Some(cell)) => Ok(cell),
        }
    }

    pub fn read(&self, location: &Reference) -> Result<Value, Fault> {
        let mut value = &self.cell(location.address)?.value;
        for &i in &location.path {
            value = match value {
                Value::Compound(vs) => vs.get(i).ok_or(Fault::InvalidPath(location.address))?,
                _ => return Err(Fault::InvalidPath(location.address)),
            };
        }
        Ok(value.clone())
    }

    pub fn write(&self, location: &Reference, value: Value) -> Result<Store, Fault> {
        let mut cell = self.cell(location.address)?.clone();
        let slot = component_mut(&mut cell.value, &location.path).ok_or(Fault::InvalidPath(location.address))?;
        *slot = value;
        let mut cells = self.cells.clone();
        cells.set(location.address, Some(cell));
        Ok(Store { cells })
    }

    /// Finalize a discarded value: free every cell it owns, recursively.
    pub fn drop_value(&self, value: Value, temporaries: &[&Value]) -> Result<Store, Fault> {
        let mut store = self.clone();
        let freed = store.finalize(vec![value])?;
        if freed > 0 {
            tracing::debug!(target: "fwr::machine", freed, "dropped value");
        }
        store.check_after_drop(temporaries)?;
        Ok(store)
    }

    /// Free every cell allocated in `lifetime`, finalizing its contents.
    pub fn drop_lifetime(&self, lifetime: &Lifetime, temporaries: &[&Value]) -> Result<Store, Fault> {
        let mut store = self.clone();
        let mut work = Vec::new();
        for slot in store.cells.iter_mut() {
            if slot.as_ref().is_some_and(|cell| &cell.lifetime == lifetime) {
                if let Some(cell) = slot.take() {
                    work.push(cell.value);
                }
            }
        }
        let scoped = work.len();
        let owned = store.finalize(work)?;
        tracing::debug!(target: "fwr::machine", %lifetime, freed = scoped + owned, "dropped lifetime");
        store.check_after_drop(temporaries)?;
        Ok(store)
    }

    fn finalize(&mut self, mut work: Vec<Value>) -> Result<usize, Fault> {
        let mut freed = 0;
        while let Some(value) = work.pop() {
            match value {
                Value::Ref(r) if r.owner => {
                    let cell = self
                        .cells
                        .get_mut(r.address)
                        .ok_or(Fault::InvalidAddress(r.address))?
                        .take()
                        .ok_or(Fault::DanglingReference(r.address))?;
                    freed += 1;
                    work.push(cell.value);
                }
                Value::Compound(vs) => work.extend(vs),
                Value::Ref(_) | Value::Unit | Value::Int(_) | Value::Undefined => {}
            }
        }
        Ok(freed)
    }

    /// Owning references per address, over every live cell and the given
    /// temporaries. Fails on any reference to a freed cell.
    fn owners(&self, temporaries: &[&Value]) -> Result<HashMap<usize, usize>, Fault> {
        let mut counts = HashMap::new();
        let live = self.cells.iter().flatten().map(|cell| &cell.value);
        for value in live.chain(temporaries.iter().copied()) {
            for r in value.references() {
                self.cell(r.address)?;
                if r.owner {
                    *counts.entry(r.address).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    // Values held by enclosing evaluation contexts are not visible here, so
    // only sharing and dangling references can be detected.
    fn check_after_drop(&self, temporaries: &[&Value]) -> Result<(), Fault> {
        match self.owners(temporaries)?.into_iter().find(|&(_, owners)| owners > 1) {
            Some((address, owners)) => Err(Fault::OwnershipInvariant { address, owners }),
            None => Ok(()),
        }
    }

    /// Every live heap cell has exactly one owning reference, every scoped
    /// cell has none, and nothing refers to a freed cell. `temporaries` must
    /// hold every value not yet stored.
    pub fn check_heap_invariant(&self, temporaries: &[&Value]) -> Result<(), Fault> {
        let counts = self.owners(temporaries)?;
        for (address, slot) in self.cells.iter().enumerate() {
            let Some(cell) = slot else { continue };
            let owners = counts.get(&address).copied().unwrap_or(0);
            let expected = usize::from(cell.lifetime.is_root());
            if owners != expected {
                return Err(Fault::OwnershipInvariant { address, owners });
            }
        }
        Ok(())
    }

    /// Number of cells not yet freed.
    pub fn live_count(&self) -> usize {
        self.cells.iter().flatten().count()
    }

    /// Number of cells ever allocated.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn component_mut<'a>(value: &'a mut Value, path: &[usize]) -> Option<&'a mut Value> {
    match path.split_first() {
        None => Some(value),
        Some((&i, rest)) => match value {
            Value::Compound(vs) => component_mut(vs.get_mut(i)?, rest),
            _ => None,
        },
    }
}

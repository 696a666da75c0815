#![forbid(unsafe_code)]

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LIFETIME: AtomicU64 = AtomicU64::new(0);

/// A scope in a tree of scopes.
///
/// Lifetimes are compared by identity: two calls to [`Lifetime::fresh_within`]
/// on the same parent never produce equal lifetimes. The root of a tree stands
/// for the heap.
#[derive(Clone)]
pub struct Lifetime(Arc<Node>);

struct Node {
    id: u64,
    parent: Option<Lifetime>,
}

impl Lifetime {
    /// Create the root of a new lifetime tree.
    pub fn root() -> Self {
        Self(Arc::new(Node {
            id: NEXT_LIFETIME.fetch_add(1, Ordering::Relaxed),
            parent: None,
        }))
    }

    /// Create a new child scope of `self`.
    pub fn fresh_within(&self) -> Self {
        Self(Arc::new(Node {
            id: NEXT_LIFETIME.fetch_add(1, Ordering::Relaxed),
            parent: Some(self.clone()),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn parent(&self) -> Option<&Lifetime> {
        self.0.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// The root of the tree containing `self`.
    pub fn global(&self) -> Lifetime {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// Whether `self` is contained in `other`, i.e. `other` is `self` or one of
    /// its ancestors.
    pub fn within(&self, other: &Lifetime) -> bool {
        let mut current = Some(self);
        while let Some(l) = current {
            if l == other {
                return true;
            }
            current = l.parent();
        }
        false
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Lifetime {}

impl Hash for Lifetime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "'*{}", self.0.id)
        } else {
            write!(f, "'l{}", self.0.id)
        }
    }
}

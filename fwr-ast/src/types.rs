#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use crate::LVal;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Unit,
    Int,
    Box(Box<Type>),
    /// A borrow of one of `targets`. More than one target appears after a
    /// weak update or a control-flow join.
    Borrow {
        mutable: bool,
        targets: BTreeSet<LVal>,
    },
    /// Shadow of a value that has been moved out.
    Undefined(Box<Type>),
    Compound(Vec<Type>),
}

impl Type {
    pub fn boxed(inner: Type) -> Self {
        Type::Box(Box::new(inner))
    }

    pub fn borrow(mutable: bool, target: LVal) -> Self {
        Type::Borrow {
            mutable,
            targets: BTreeSet::from([target]),
        }
    }

    pub fn undefined(inner: Type) -> Self {
        Type::Undefined(Box::new(inner))
    }

    pub fn copyable(&self) -> bool {
        match self {
            Type::Unit | Type::Int => true,
            Type::Borrow { mutable, .. } => !mutable,
            Type::Compound(ts) => ts.iter().all(Type::copyable),
            Type::Box(_) | Type::Undefined(_) => false,
        }
    }

    /// True when no part of the value has been moved out.
    pub fn defined(&self) -> bool {
        match self {
            Type::Undefined(_) => false,
            Type::Box(inner) => inner.defined(),
            Type::Compound(ts) => ts.iter().all(Type::defined),
            Type::Unit | Type::Int | Type::Borrow { .. } => true,
        }
    }

    pub fn prohibits_reading(&self, lv: &LVal) -> bool {
        self.any_borrow(&mut |mutable, targets| mutable && targets.iter().any(|t| t.conflicts(lv)))
    }

    pub fn prohibits_writing(&self, lv: &LVal) -> bool {
        self.any_borrow(&mut |_, targets| targets.iter().any(|t| t.conflicts(lv)))
    }

    /// Every lval borrowed anywhere inside this type.
    pub fn borrowed(&self) -> Vec<&LVal> {
        let mut out = Vec::new();
        self.collect_borrowed(&mut out);
        out
    }

    fn collect_borrowed<'a>(&'a self, out: &mut Vec<&'a LVal>) {
        match self {
            Type::Borrow { targets, .. } => out.extend(targets.iter()),
            Type::Box(inner) | Type::Undefined(inner) => inner.collect_borrowed(out),
            Type::Compound(ts) => ts.iter().for_each(|t| t.collect_borrowed(out)),
            Type::Unit | Type::Int => {}
        }
    }

    // Shadows still count. A moved borrow is copied rather than cleared at
    // runtime, and a join may shadow a borrow only one branch gave away, so
    // its targets stay frozen until the slot is overwritten or dropped.
    fn any_borrow(&self, f: &mut impl FnMut(bool, &BTreeSet<LVal>) -> bool) -> bool {
        match self {
            Type::Borrow { mutable, targets } => f(*mutable, targets),
            Type::Box(inner) | Type::Undefined(inner) => inner.any_borrow(f),
            Type::Compound(ts) => ts.iter().any(|t| t.any_borrow(f)),
            Type::Unit | Type::Int => false,
        }
    }

    /// Least upper bound of two structurally similar types.
    pub fn union(&self, other: &Type) -> Option<Type> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (Type::Undefined(a), Type::Undefined(b)) => Some(Type::undefined(a.union(b)?)),
            (Type::Undefined(a), b) | (b, Type::Undefined(a)) => Some(Type::undefined(a.union(b)?)),
            (Type::Box(a), Type::Box(b)) => Some(Type::boxed(a.union(b)?)),
            (
                Type::Borrow {
                    mutable: m1,
                    targets: t1,
                },
                Type::Borrow {
                    mutable: m2,
                    targets: t2,
                },
            ) if m1 == m2 => Some(Type::Borrow {
                mutable: *m1,
                targets: t1.union(t2).cloned().collect(),
            }),
            (Type::Compound(a), Type::Compound(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.union(y))
                .collect::<Option<Vec<_>>>()
                .map(Type::Compound),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => f.write_str("()"),
            Type::Int => f.write_str("int"),
            Type::Box(inner) => write!(f, "☐{inner}"),
            Type::Borrow { mutable, targets } => {
                f.write_str(if *mutable { "&mut " } else { "&" })?;
                let names: Vec<String> = targets.iter().map(ToString::to_string).collect();
                f.write_str(&names.join(","))
            }
            Type::Undefined(inner) => write!(f, "⊥{inner}"),
            Type::Compound(ts) => {
                let parts: Vec<String> = ts.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

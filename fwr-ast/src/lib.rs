#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;

mod lifetime;
mod lval;
mod types;
mod value;

pub use lifetime::Lifetime;
pub use lval::{LVal, PathElement};
pub use types::Type;
pub use value::{Reference, Value};

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

/// Span for terms built programmatically rather than parsed.
pub fn no_span() -> Span {
    span(0, 0)
}

pub type Ident = Spanned<String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub span: Span,
    pub kind: TermKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// `!x`
    Copy,
    Move,
    /// `x`: copies when the type allows it, moves otherwise.
    Inferred,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TermKind {
    Let {
        name: Ident,
        init: Box<Term>,
    },
    /// Assignment; indirect when the lval has a non-empty path.
    Assign {
        lhs: LVal,
        rhs: Box<Term>,
    },
    Block {
        lifetime: Lifetime,
        stmts: Vec<Term>,
    },
    /// Variable read, dereference or compound projection.
    Access {
        kind: AccessKind,
        lval: LVal,
    },
    Borrow {
        mutable: bool,
        lval: LVal,
    },
    Box(Box<Term>),
    Value(Value),
    /// Syntax owned by a language extension, identified by its opcode.
    Extension {
        opcode: u32,
        operands: Vec<Term>,
    },
}

impl Term {
    pub fn new(span: Span, kind: TermKind) -> Self {
        Self { span, kind }
    }

    pub fn value(v: Value) -> Self {
        Self::new(no_span(), TermKind::Value(v))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.kind {
            TermKind::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, TermKind::Value(_))
    }

    /// Rebuild `self` with the same span and a new kind.
    pub fn with_kind(&self, kind: TermKind) -> Self {
        Self::new(self.span, kind)
    }

    /// Values embedded in this term. During reduction these are the live
    /// temporaries.
    pub fn values(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        let mut work = vec![self];
        while let Some(t) = work.pop() {
            match &t.kind {
                TermKind::Value(v) => out.push(v),
                TermKind::Let { init, .. } => work.push(init),
                TermKind::Assign { rhs, .. } => work.push(rhs),
                TermKind::Box(inner) => work.push(inner),
                TermKind::Block { stmts, .. } => work.extend(stmts.iter()),
                TermKind::Extension { operands, .. } => work.extend(operands.iter()),
                TermKind::Access { .. } | TermKind::Borrow { .. } => {}
            }
        }
        out
    }
}

pub fn int(n: i64) -> Term {
    Term::value(Value::Int(n))
}

pub fn var(name: &str) -> Term {
    access(AccessKind::Inferred, LVal::var(name))
}

pub fn copy(lval: LVal) -> Term {
    access(AccessKind::Copy, lval)
}

pub fn moved(lval: LVal) -> Term {
    access(AccessKind::Move, lval)
}

pub fn access(kind: AccessKind, lval: LVal) -> Term {
    Term::new(no_span(), TermKind::Access { kind, lval })
}

/// `*...*x` with `depth` dereferences, access kind inferred.
pub fn deref(name: &str, depth: usize) -> Term {
    let lval = (0..depth).fold(LVal::var(name), |lv, _| lv.deref());
    access(AccessKind::Inferred, lval)
}

pub fn borrow(lval: LVal) -> Term {
    Term::new(no_span(), TermKind::Borrow { mutable: false, lval })
}

pub fn borrow_mut(lval: LVal) -> Term {
    Term::new(no_span(), TermKind::Borrow { mutable: true, lval })
}

pub fn boxed(inner: Term) -> Term {
    Term::new(no_span(), TermKind::Box(Box::new(inner)))
}

pub fn let_mut(name: &str, init: Term) -> Term {
    Term::new(
        no_span(),
        TermKind::Let {
            name: Ident::new(no_span(), name.to_string()),
            init: Box::new(init),
        },
    )
}

pub fn assign(lhs: LVal, rhs: Term) -> Term {
    Term::new(
        no_span(),
        TermKind::Assign {
            lhs,
            rhs: Box::new(rhs),
        },
    )
}

pub fn block(lifetime: Lifetime, stmts: Vec<Term>) -> Term {
    Term::new(no_span(), TermKind::Block { lifetime, stmts })
}

pub fn extension(opcode: u32, operands: Vec<Term>) -> Term {
    Term::new(no_span(), TermKind::Extension { opcode, operands })
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Let { name, init } => write!(f, "let mut {} = {init}", name.node),
            TermKind::Assign { lhs, rhs } => write!(f, "{lhs} = {rhs}"),
            TermKind::Block { stmts, .. } => {
                f.write_str("{ ")?;
                for stmt in stmts {
                    write!(f, "{stmt}; ")?;
                }
                f.write_str("}")
            }
            TermKind::Access { kind, lval } => match kind {
                AccessKind::Copy => write!(f, "!{lval}"),
                AccessKind::Move => write!(f, "move {lval}"),
                AccessKind::Inferred => write!(f, "{lval}"),
            },
            TermKind::Borrow { mutable: true, lval } => write!(f, "&mut {lval}"),
            TermKind::Borrow { mutable: false, lval } => write!(f, "&{lval}"),
            TermKind::Box(inner) => write!(f, "box {inner}"),
            TermKind::Value(v) => write!(f, "{v}"),
            TermKind::Extension { opcode, operands } => {
                let parts: Vec<String> = operands.iter().map(ToString::to_string).collect();
                write!(f, "#{opcode}({})", parts.join(", "))
            }
        }
    }
}

#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use fwr_ast::{LVal, Span, Type};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StaticErrorKind {
    #[error("variable `{0}` undeclared")]
    Undeclared(String),
    #[error("variable `{0}` already declared")]
    AlreadyDeclared(String),
    #[error("use of moved lval `{0}`")]
    Moved(LVal),
    #[error("type of `{0}` cannot be copied")]
    NotCopy(LVal),
    #[error("`{0}` mutably borrowed in part or whole")]
    ReadProhibited(LVal),
    #[error("`{0}` borrowed in part or whole")]
    WriteProhibited(LVal),
    #[error("`{0}` cannot be read (moved in part or whole)")]
    NotReadable(LVal),
    #[error("`{0}` cannot be written (moved in part or whole)")]
    NotWritable(LVal),
    #[error("`{0}` is not mutable along its path")]
    NotMutable(LVal),
    #[error("incompatible type: expected `{expected}`, found `{found}`")]
    Incompatible { expected: Type, found: Type },
    #[error("lifetime of `{0}` does not outlive the enclosing scope")]
    NotWithin(Type),
    #[error("cannot move out of `{0}` through a borrow")]
    MoveThroughBorrow(LVal),
    #[error("expected reference type for `{0}`")]
    ExpectedReference(LVal),
    #[error("invalid path `{0}`")]
    InvalidPath(LVal),
    #[error("branches declare different variables or lifetimes for `{0}`")]
    EnvironmentMismatch(String),
    #[error("no typing rule for extension term #{0}")]
    UnknownTerm(u32),
    #[error("`{0}` is not part of the source language")]
    UnsupportedTerm(String),
}

#[derive(Debug, Error, Diagnostic)]
#[error("borrow check error: {kind}")]
#[diagnostic(code(fwr::check))]
#[allow(unused_assignments)]
pub struct StaticError {
    pub kind: StaticErrorKind,
    #[label]
    pub span: Span,
}

impl StaticError {
    pub fn new(kind: StaticErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

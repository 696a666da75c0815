#![forbid(unsafe_code)]

use fwr_ast::{AccessKind, LVal, Lifetime, PathElement, Span, Term, TermKind, Type, Value};

use crate::env::{Environment, Slot};
use crate::error::{StaticError, StaticErrorKind};

type Judgement = Result<(Environment, Type), StaticError>;

/// How assignment compatibility treats the referent of a mutable borrow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variance {
    /// Referents only need to be compatible.
    #[default]
    Covariant,
    /// Referents must have identical types, borrow targets included.
    Invariant,
}

#[derive(Clone, Debug)]
pub struct CheckerConfig {
    /// Let an unannotated access copy when its type is copyable.
    pub copy_inference: bool,
    pub mutable_borrow_variance: Variance,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            copy_inference: true,
            mutable_borrow_variance: Variance::Covariant,
        }
    }
}

/// Typing rules for syntax the core checker does not know about.
///
/// Extensions are tried in registration order before the core rules; the
/// first one to return `Some` decides the term.
pub trait TypingExtension: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(
        &self,
        checker: &Checker,
        env: &Environment,
        lifetime: &Lifetime,
        term: &Term,
    ) -> Option<Judgement>;
}

enum Availability {
    Available,
    Moved,
    Immutable,
    BadPath,
}

/// Combined type and borrow checker.
#[derive(Default)]
pub struct Checker {
    config: CheckerConfig,
    extensions: Vec<Box<dyn TypingExtension>>,
}

impl Checker {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            config,
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl TypingExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Type a whole program under `root`.
    pub fn check_program(&self, root: &Lifetime, term: &Term) -> Result<Type, StaticError> {
        self.apply(&Environment::new(), root, term).map(|(_, ty)| ty)
    }

    /// `R1 |- term : T -| R2` under `lifetime`.
    pub fn apply(&self, env: &Environment, lifetime: &Lifetime, term: &Term) -> Judgement {
        let (out, ty) = match self.extensions.iter().find_map(|ext| ext.check(self, env, lifetime, term)) {
            Some(judgement) => judgement?,
            None => self.apply_core(env, lifetime, term)?,
        };
        tracing::trace!(target: "fwr::check", "{env} |- {term} : {ty} -| {out}");
        Ok((out, ty))
    }

    fn apply_core(&self, env: &Environment, lifetime: &Lifetime, term: &Term) -> Judgement {
        match &term.kind {
            TermKind::Let { name, init } => {
                // T-Declare
                if env.contains(&name.node) {
                    return Err(StaticError::new(
                        StaticErrorKind::AlreadyDeclared(name.node.clone()),
                        name.span,
                    ));
                }
                let (env, ty) = self.apply(env, lifetime, init)?;
                let env = env.put(name.node.clone(), Slot::new(ty, lifetime.clone()));
                Ok((env, Type::Unit))
            }
            TermKind::Assign { lhs, rhs } => {
                // T-Assign
                self.declared(env, lhs, term.span)?;
                let (env, ty) = self.apply(env, lifetime, rhs)?;
                let avail = self.available(&env, lhs, true);
                self.require(avail, StaticErrorKind::NotWritable(lhs.clone()), lhs, term.span)?;
                // The new value may not borrow the place it is stored in.
                if write_prohibited(&env, lhs) || ty.prohibits_writing(lhs) {
                    return Err(StaticError::new(
                        StaticErrorKind::WriteProhibited(lhs.clone()),
                        term.span,
                    ));
                }
                let env = self.write(&env, lhs, &ty, true, term.span)?;
                Ok((env, Type::Unit))
            }
            TermKind::Block { lifetime: inner, stmts } => {
                // T-Block
                let (env, ty) = self.sequence(env, inner, stmts)?;
                if !self.within(&env, &ty, lifetime) {
                    return Err(StaticError::new(StaticErrorKind::NotWithin(ty), term.span));
                }
                Ok((env.drop_lifetime(inner), ty))
            }
            TermKind::Access { kind, lval } => self.read(env, *kind, lval, term.span),
            TermKind::Borrow { mutable, lval } => self.borrow(env, *mutable, lval, term.span),
            TermKind::Box(inner) => {
                let (env, ty) = self.apply(env, lifetime, inner)?;
                Ok((env, Type::boxed(ty)))
            }
            TermKind::Value(Value::Int(_)) => Ok((env.clone(), Type::Int)),
            TermKind::Value(v) => Err(StaticError::new(
                StaticErrorKind::UnsupportedTerm(v.to_string()),
                term.span,
            )),
            TermKind::Extension { opcode, .. } => {
                Err(StaticError::new(StaticErrorKind::UnknownTerm(*opcode), term.span))
            }
        }
    }

    /// T-Seq: statements typed left to right, the last one giving the type.
    pub fn sequence(&self, env: &Environment, lifetime: &Lifetime, stmts: &[Term]) -> Judgement {
        let mut env = env.clone();
        let mut ty = Type::Unit;
        for stmt in stmts {
            (env, ty) = self.apply(&env, lifetime, stmt)?;
        }
        Ok((env, ty))
    }

    fn read(&self, env: &Environment, kind: AccessKind, lv: &LVal, span: Span) -> Judgement {
        let slot = self.declared(env, lv, span)?;
        let avail = self.available(env, lv, false);
        self.require(avail, StaticErrorKind::Moved(lv.clone()), lv, span)?;
        let ty = self.type_of(env, lv, span)?;

        let copy = match kind {
            AccessKind::Copy if !ty.copyable() => {
                return Err(StaticError::new(StaticErrorKind::NotCopy(lv.clone()), span));
            }
            AccessKind::Copy => true,
            AccessKind::Move => false,
            AccessKind::Inferred => self.config.copy_inference && ty.copyable(),
        };

        if copy {
            // T-Copy
            if read_prohibited(env, lv) {
                return Err(StaticError::new(StaticErrorKind::ReadProhibited(lv.clone()), span));
            }
            Ok((env.clone(), ty))
        } else {
            // T-Move
            let avail = self.available(env, lv, true);
            self.require(avail, StaticErrorKind::Moved(lv.clone()), lv, span)?;
            if write_prohibited(env, lv) {
                return Err(StaticError::new(StaticErrorKind::WriteProhibited(lv.clone()), span));
            }
            let struck = strike(&slot.ty, &lv.path).map_err(|kind| {
                StaticError::new(kind.unwrap_or_else(|| StaticErrorKind::InvalidPath(lv.clone())), span)
            })?;
            let lifetime = slot.lifetime.clone();
            Ok((env.put(lv.name.clone(), Slot::new(struck, lifetime)), ty))
        }
    }

    fn borrow(&self, env: &Environment, mutable: bool, lv: &LVal, span: Span) -> Judgement {
        self.declared(env, lv, span)?;
        let avail = self.available(env, lv, false);
        self.require(avail, StaticErrorKind::NotReadable(lv.clone()), lv, span)?;
        if mutable {
            // T-MutBorrow
            let avail = self.available(env, lv, true);
            self.require(avail, StaticErrorKind::NotWritable(lv.clone()), lv, span)?;
            if write_prohibited(env, lv) {
                return Err(StaticError::new(StaticErrorKind::WriteProhibited(lv.clone()), span));
            }
        } else if read_prohibited(env, lv) {
            // T-ImmBorrow
            return Err(StaticError::new(StaticErrorKind::ReadProhibited(lv.clone()), span));
        }
        Ok((env.clone(), Type::borrow(mutable, lv.clone())))
    }

    /// Write `ty` to `lv`. Strong writes replace the old type; weak writes,
    /// which happen to every target of a borrow being written through, join
    /// with it.
    pub fn write(
        &self,
        env: &Environment,
        lv: &LVal,
        ty: &Type,
        strong: bool,
        span: Span,
    ) -> Result<Environment, StaticError> {
        let slot = self.declared(env, lv, span)?;
        if !self.within(env, ty, &slot.lifetime) {
            return Err(StaticError::new(StaticErrorKind::NotWithin(ty.clone()), span));
        }
        let current = self.type_of(env, lv, span)?;
        if !self.compatible(env, &current, ty, env) {
            return Err(StaticError::new(
                StaticErrorKind::Incompatible {
                    expected: current,
                    found: ty.clone(),
                },
                span,
            ));
        }
        let lifetime = slot.lifetime.clone();
        let (env, updated) = self.update(env, &slot.ty, lv, 0, ty, strong, span)?;
        Ok(env.put(lv.name.clone(), Slot::new(updated, lifetime)))
    }

    #[allow(clippy::too_many_arguments)]
    fn update(
        &self,
        env: &Environment,
        current: &Type,
        lv: &LVal,
        i: usize,
        ty: &Type,
        strong: bool,
        span: Span,
    ) -> Judgement {
        let Some(element) = lv.path.get(i) else {
            if strong {
                return Ok((env.clone(), ty.clone()));
            }
            let joined = current.union(ty).ok_or_else(|| {
                StaticError::new(
                    StaticErrorKind::Incompatible {
                        expected: current.clone(),
                        found: ty.clone(),
                    },
                    span,
                )
            })?;
            return Ok((env.clone(), joined));
        };
        match (current, element) {
            (Type::Box(inner), PathElement::Deref) => {
                let (env, inner) = self.update(env, inner, lv, i + 1, ty, strong, span)?;
                Ok((env, Type::boxed(inner)))
            }
            (Type::Compound(ts), PathElement::Index(k)) if *k < ts.len() => {
                let (env, t) = self.update(env, &ts[*k], lv, i + 1, ty, strong, span)?;
                let mut ts = ts.clone();
                ts[*k] = t;
                Ok((env, Type::Compound(ts)))
            }
            (Type::Borrow { mutable, targets }, PathElement::Deref) => {
                if !mutable {
                    return Err(StaticError::new(StaticErrorKind::NotMutable(lv.clone()), span));
                }
                let rest = &lv.path[i + 1..];
                let mut out = env.clone();
                for target in targets {
                    out = self.write(&out, &target.clone().extend(rest), ty, false, span)?;
                }
                Ok((out, current.clone()))
            }
            (Type::Undefined(_), _) => Err(StaticError::new(StaticErrorKind::NotWritable(lv.clone()), span)),
            _ => Err(StaticError::new(StaticErrorKind::InvalidPath(lv.clone()), span)),
        }
    }

    fn declared<'e>(&self, env: &'e Environment, lv: &LVal, span: Span) -> Result<&'e Slot, StaticError> {
        env.get(&lv.name)
            .ok_or_else(|| StaticError::new(StaticErrorKind::Undeclared(lv.name.clone()), span))
    }

    fn require(&self, avail: Availability, moved: StaticErrorKind, lv: &LVal, span: Span) -> Result<(), StaticError> {
        let kind = match avail {
            Availability::Available => return Ok(()),
            Availability::Moved => moved,
            Availability::Immutable => StaticErrorKind::NotMutable(lv.clone()),
            Availability::BadPath => StaticErrorKind::InvalidPath(lv.clone()),
        };
        Err(StaticError::new(kind, span))
    }

    /// Whether `lv` can be read (or written when `write` is set) given what
    /// has been moved out. The top of an lval can always be written, but
    /// nothing can be reached through a shadow.
    fn available(&self, env: &Environment, lv: &LVal, write: bool) -> Availability {
        let Some(slot) = env.get(&lv.name) else {
            return Availability::BadPath;
        };
        let mut ty = &slot.ty;
        for element in &lv.path {
            match (ty, element) {
                (Type::Undefined(_), _) => return Availability::Moved,
                (Type::Box(inner), PathElement::Deref) => ty = inner,
                (Type::Compound(ts), PathElement::Index(k)) if *k < ts.len() => ty = &ts[*k],
                // Anything borrowed is fully available, since nothing can be
                // moved out of a borrowed lval.
                (Type::Borrow { mutable, .. }, PathElement::Deref) => {
                    return if write && !mutable {
                        Availability::Immutable
                    } else {
                        Availability::Available
                    };
                }
                _ => return Availability::BadPath,
            }
        }
        if write || ty.defined() {
            Availability::Available
        } else {
            Availability::Moved
        }
    }

    /// Type of `lv`, reading through boxes, compounds and every target of a
    /// borrow.
    pub fn type_of(&self, env: &Environment, lv: &LVal, span: Span) -> Result<Type, StaticError> {
        let slot = self.declared(env, lv, span)?;
        let mut ty = slot.ty.clone();
        for (i, element) in lv.path.iter().enumerate() {
            ty = match (ty, element) {
                (Type::Box(inner), PathElement::Deref) => *inner,
                (Type::Compound(mut ts), PathElement::Index(k)) if *k < ts.len() => ts.swap_remove(*k),
                (Type::Borrow { targets, .. }, PathElement::Deref) => {
                    let rest = &lv.path[i + 1..];
                    return self.type_of_targets(env, &targets, rest, span);
                }
                (Type::Borrow { .. } | Type::Unit | Type::Int, _) => {
                    return Err(StaticError::new(StaticErrorKind::ExpectedReference(lv.clone()), span));
                }
                _ => return Err(StaticError::new(StaticErrorKind::InvalidPath(lv.clone()), span)),
            };
        }
        Ok(ty)
    }

    fn type_of_targets<'a>(
        &self,
        env: &Environment,
        targets: impl IntoIterator<Item = &'a LVal>,
        rest: &[PathElement],
        span: Span,
    ) -> Result<Type, StaticError> {
        let mut joined: Option<Type> = None;
        for target in targets {
            let target = target.clone().extend(rest);
            let ty = self.type_of(env, &target, span)?;
            joined = Some(match joined {
                None => ty,
                Some(prev) => prev.union(&ty).ok_or_else(|| {
                    StaticError::new(
                        StaticErrorKind::Incompatible {
                            expected: prev.clone(),
                            found: ty.clone(),
                        },
                        span,
                    )
                })?,
            });
        }
        Ok(joined.unwrap_or(Type::Unit))
    }

    /// Assignment compatibility: structural equality, looking through shadows.
    pub fn compatible(&self, env1: &Environment, t1: &Type, t2: &Type, env2: &Environment) -> bool {
        match (t1, t2) {
            (Type::Unit, Type::Unit) | (Type::Int, Type::Int) => true,
            (Type::Box(a), Type::Box(b)) => self.compatible(env1, a, b, env2),
            (Type::Compound(a), Type::Compound(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.compatible(env1, x, y, env2))
            }
            (
                Type::Borrow {
                    mutable: m1,
                    targets: ts1,
                },
                Type::Borrow {
                    mutable: m2,
                    targets: ts2,
                },
            ) => {
                if m1 != m2 {
                    return false;
                }
                // All targets of one borrow have compatible types by
                // construction, so the first stands for the rest.
                let (Some(x), Some(y)) = (ts1.first(), ts2.first()) else {
                    return false;
                };
                let span = fwr_ast::no_span();
                let (Ok(r1), Ok(r2)) = (self.type_of(env1, x, span), self.type_of(env2, y, span)) else {
                    return false;
                };
                if *m1 && self.config.mutable_borrow_variance == Variance::Invariant {
                    r1 == r2
                } else {
                    self.compatible(env1, &r1, &r2, env2)
                }
            }
            (Type::Undefined(a), Type::Undefined(b)) => self.compatible(env1, a, b, env2),
            (Type::Undefined(a), b) => self.compatible(env1, a, b, env2),
            (a, Type::Undefined(b)) => self.compatible(env1, a, b, env2),
            _ => false,
        }
    }

    /// Every variable borrowed by `ty` lives at least as long as `lifetime`.
    pub fn within(&self, env: &Environment, ty: &Type, lifetime: &Lifetime) -> bool {
        ty.borrowed()
            .into_iter()
            .all(|lv| env.get(&lv.name).is_some_and(|slot| lifetime.within(&slot.lifetime)))
    }

    /// Join the environments produced by two branches: same variables, same
    /// lifetimes, compatible types.
    pub fn join(&self, lhs: &Environment, rhs: &Environment, span: Span) -> Result<Environment, StaticError> {
        if lhs.len() != rhs.len() {
            let stray = lhs
                .bindings()
                .map(|(name, _)| name)
                .find(|name| !rhs.contains(name))
                .or_else(|| rhs.bindings().map(|(name, _)| name).find(|name| !lhs.contains(name)))
                .cloned()
                .unwrap_or_default();
            return Err(StaticError::new(StaticErrorKind::EnvironmentMismatch(stray), span));
        }
        let mut out = lhs.clone();
        for (name, left) in lhs.bindings() {
            let Some(right) = rhs.get(name) else {
                return Err(StaticError::new(StaticErrorKind::EnvironmentMismatch(name.clone()), span));
            };
            if left.lifetime != right.lifetime {
                return Err(StaticError::new(StaticErrorKind::EnvironmentMismatch(name.clone()), span));
            }
            let incompatible = || {
                StaticError::new(
                    StaticErrorKind::Incompatible {
                        expected: left.ty.clone(),
                        found: right.ty.clone(),
                    },
                    span,
                )
            };
            if !self.compatible(lhs, &left.ty, &right.ty, rhs) {
                return Err(incompatible());
            }
            let ty = left.ty.union(&right.ty).ok_or_else(incompatible)?;
            out = out.put(name.clone(), Slot::new(ty, left.lifetime.clone()));
        }
        Ok(out)
    }
}

/// Wrap the part of `ty` reached by `path` in a shadow. `Err(Some(..))`
/// reports a move through a borrow; `Err(None)` a path that does not fit.
fn strike(ty: &Type, path: &[PathElement]) -> Result<Type, Option<StaticErrorKind>> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(Type::undefined(ty.clone()));
    };
    match (ty, first) {
        (Type::Box(inner), PathElement::Deref) => Ok(Type::boxed(strike(inner, rest)?)),
        (Type::Compound(ts), PathElement::Index(k)) if *k < ts.len() => {
            let mut ts = ts.clone();
            ts[*k] = strike(&ts[*k], rest)?;
            Ok(Type::Compound(ts))
        }
        (Type::Borrow { targets, .. }, PathElement::Deref) => Err(targets
            .first()
            .map(|target| StaticErrorKind::MoveThroughBorrow(target.clone().extend(rest)))),
        _ => Err(None),
    }
}

pub fn read_prohibited(env: &Environment, lv: &LVal) -> bool {
    env.slots().any(|slot| slot.ty.prohibits_reading(lv))
}

pub fn write_prohibited(env: &Environment, lv: &LVal) -> bool {
    env.slots().any(|slot| slot.ty.prohibits_writing(lv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwr_ast::no_span;

    fn env_with(root: &Lifetime, vars: &[(&str, Type)]) -> Environment {
        vars.iter().fold(Environment::new(), |env, (name, ty)| {
            env.put(*name, Slot::new(ty.clone(), root.clone()))
        })
    }

    #[test]
    fn test_type_of_reads_through_box_and_borrow() {
        let root = Lifetime::root();
        let env = env_with(
            &root,
            &[
                ("x", Type::boxed(Type::Int)),
                ("y", Type::borrow(true, LVal::var("x"))),
            ],
        );
        let checker = Checker::default();
        let ty = checker
            .type_of(&env, &LVal::var("y").deref().deref(), no_span())
            .expect("type_of");
        assert_eq!(ty, Type::Int);
    }

    #[test]
    fn test_strike_marks_moved_part() {
        let ty = Type::boxed(Type::boxed(Type::Int));
        let struck = strike(&ty, &[PathElement::Deref]).expect("strike");
        assert_eq!(struck, Type::boxed(Type::undefined(Type::boxed(Type::Int))));
        assert!(!struck.defined());
    }

    #[test]
    fn test_strike_through_borrow_is_rejected() {
        let ty = Type::borrow(true, LVal::var("x"));
        let err = strike(&ty, &[PathElement::Deref]).expect_err("move through borrow");
        assert_eq!(err, Some(StaticErrorKind::MoveThroughBorrow(LVal::var("x"))));
    }

    #[test]
    fn test_shadow_is_transparent_for_compatibility() {
        let env = Environment::new();
        let checker = Checker::default();
        let moved = Type::undefined(Type::boxed(Type::Int));
        assert!(checker.compatible(&env, &moved, &Type::boxed(Type::Int), &env));
        assert!(!checker.compatible(&env, &Type::Int, &Type::boxed(Type::Int), &env));
    }

    #[test]
    fn test_join_requires_same_variables() {
        let root = Lifetime::root();
        let checker = Checker::default();
        let lhs = env_with(&root, &[("x", Type::Int)]);
        let rhs = env_with(&root, &[("y", Type::Int)]);
        let err = checker.join(&lhs, &rhs, no_span()).expect_err("mismatch");
        assert!(matches!(err.kind, StaticErrorKind::EnvironmentMismatch(_)));
    }

    #[test]
    fn test_join_unions_borrow_targets() {
        let root = Lifetime::root();
        let checker = Checker::default();
        let base = env_with(&root, &[("a", Type::Int), ("b", Type::Int)]);
        let lhs = base.put("p", Slot::new(Type::borrow(true, LVal::var("a")), root.clone()));
        let rhs = base.put("p", Slot::new(Type::borrow(true, LVal::var("b")), root.clone()));
        let joined = checker.join(&lhs, &rhs, no_span()).expect("join");
        assert_eq!(joined.get("p").map(|s| s.ty.to_string()), Some("&mut a,b".to_string()));
    }
}

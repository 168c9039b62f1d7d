//! Deferred resolutions and the tables that track them.
//!
//! A value that cannot be computed when its statement is processed is
//! registered as a [`PendingResolution`]: what it will define (its
//! [`Target`]), how to compute it (its [`Resolvable`]) and the
//! [`Prerequisite`]s its last evaluation was blocked on. The tables index
//! pendings by target and by prerequisite so that defining a value wakes
//! exactly the pendings waiting for it, in registration order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::address::Address;
use crate::data_def::DataType;
use crate::diagnostic::ResolveError;
use crate::expr::{AttrKind, EvalFrame, Expr};
use crate::ids::Id;
use crate::space::{Alignment, SpaceId};

// ---------------------------------------------------------------------------
//  Evaluation results
// ---------------------------------------------------------------------------

/// Something an evaluation can be blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prerequisite {
    /// Value of an ordinary symbol.
    Symbol(Id),
    /// One attribute of a symbol (or of an operation code, for `O'`).
    Attribute(Id, AttrKind),
    /// Length of a space.
    Space(SpaceId),
}

/// Outcome of evaluating something that may depend on undefined values.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation<T> {
    Resolved(T),
    /// Not computable yet.
    Blocked(Vec<Prerequisite>),
    /// Computed with a fallback after an error.
    ErrorFallback(T, ResolveError),
}

impl<T> Evaluation<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Evaluation<U> {
        match self {
            Evaluation::Resolved(v) => Evaluation::Resolved(f(v)),
            Evaluation::Blocked(p) => Evaluation::Blocked(p),
            Evaluation::ErrorFallback(v, e) => Evaluation::ErrorFallback(f(v), e),
        }
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Evaluation::Resolved(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Evaluation::Resolved(_))
    }
}

// ---------------------------------------------------------------------------
//  Pending resolutions
// ---------------------------------------------------------------------------

/// What a pending resolution defines once it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    SymbolValue(Id),
    SymbolAttribute(Id, AttrKind),
    Space(SpaceId),
    /// A validation that defines nothing.
    Check,
}

impl Target {
    /// The prerequisite this target satisfies.
    pub fn key(self) -> Option<Prerequisite> {
        match self {
            Target::SymbolValue(id) => Some(Prerequisite::Symbol(id)),
            Target::SymbolAttribute(id, kind) => Some(Prerequisite::Attribute(id, kind)),
            Target::Space(sp) => Some(Prerequisite::Space(sp)),
            Target::Check => None,
        }
    }
}

/// Range and error for a deferred length attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthRule {
    pub min: i32,
    pub max: i32,
    /// Length used when the value is out of range.
    pub fallback: u32,
    pub error: ResolveError,
}

/// How to compute a pending target.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolvable {
    /// Symbol value from an EQU operand.
    Value(Expr),
    /// Length attribute from an explicit length expression.
    Length { expr: Expr, rule: LengthRule },
    /// Scale attribute from an explicit scale modifier.
    Scale(Expr),
    /// Integer attribute derived from the symbol's length and scale.
    Integer { symbol: Id, data_type: DataType },
    /// Length of storage reserved with a deferred length; negative results
    /// reserve nothing.
    SpaceLength(Expr),
    /// Padding from `position` up to `alignment`, measured from `reference`.
    AlignPad {
        position: Address,
        reference: Address,
        alignment: Alignment,
    },
    /// Displacement of an ORG to a target not known when it was processed.
    OrgTarget {
        target: Expr,
        position: Address,
        boundary: u32,
        offset: i32,
    },
    /// Displacement of `ORG ,` to the highest location reached.
    OrgMax {
        candidates: Vec<Address>,
        position: Address,
    },
    /// Start of a non-first location counter after its predecessor.
    LoctrBegin {
        candidates: Vec<Address>,
        section_start: Address,
        alignment: Alignment,
    },
    /// ORG must not move below the start of its location counter.
    UnderflowCheck {
        target: Expr,
        origin: Address,
        boundary: u32,
        offset: i32,
    },
    /// Explicit length of an unlabelled constant must fit its type.
    LengthCheck { expr: Expr, type_code: char, min: i32, max: i32 },
}

/// Order of registration; pendings are retried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingResolution {
    pub target: Target,
    pub resolvable: Resolvable,
    pub frame: EvalFrame,
    /// Prerequisites of the last evaluation.
    pub waiting: Vec<Prerequisite>,
}

// ---------------------------------------------------------------------------
//  Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DependencyTables {
    next: u64,
    pending: BTreeMap<PendingId, PendingResolution>,
    by_target: HashMap<Prerequisite, PendingId>,
    waiters: HashMap<Prerequisite, BTreeSet<PendingId>>,
}

impl DependencyTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pending: PendingResolution) -> PendingId {
        let id = PendingId(self.next);
        self.next += 1;
        self.reinsert(id, pending);
        id
    }

    /// Put back a pending taken with [`take`](Self::take), keeping its place
    /// in the retry order.
    pub fn reinsert(&mut self, id: PendingId, pending: PendingResolution) {
        if let Some(key) = pending.target.key() {
            self.by_target.insert(key, id);
        }
        for p in &pending.waiting {
            self.waiters.entry(*p).or_default().insert(id);
        }
        self.pending.insert(id, pending);
    }

    /// Remove a pending from every index.
    pub fn take(&mut self, id: PendingId) -> Option<PendingResolution> {
        let pending = self.pending.remove(&id)?;
        if let Some(key) = pending.target.key() {
            if self.by_target.get(&key) == Some(&id) {
                self.by_target.remove(&key);
            }
        }
        for p in &pending.waiting {
            if let Some(set) = self.waiters.get_mut(p) {
                set.remove(&id);
                if set.is_empty() {
                    self.waiters.remove(p);
                }
            }
        }
        Some(pending)
    }

    pub fn get(&self, id: PendingId) -> Option<&PendingResolution> {
        self.pending.get(&id)
    }

    /// Pendings blocked on `key`, in registration order.
    pub fn waiters(&self, key: Prerequisite) -> Vec<PendingId> {
        self.waiters
            .get(&key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The pending that will define `key`.
    pub fn producer(&self, key: Prerequisite) -> Option<PendingId> {
        self.by_target.get(&key).copied()
    }

    pub fn is_pending(&self, key: Prerequisite) -> bool {
        self.by_target.contains_key(&key)
    }

    /// Whether waiting on `waiting` would make `target` depend on itself.
    pub fn creates_cycle(&self, target: Prerequisite, waiting: &[Prerequisite]) -> bool {
        let mut stack: Vec<Prerequisite> = waiting.to_vec();
        let mut seen: HashSet<Prerequisite> = HashSet::new();
        while let Some(p) = stack.pop() {
            if p == target {
                return true;
            }
            if !seen.insert(p) {
                continue;
            }
            if let Some(pending) = self.producer(p).and_then(|id| self.pending.get(&id)) {
                stack.extend(pending.waiting.iter().copied());
            }
        }
        false
    }

    /// Prerequisites reachable from `waiting` that no pending will define.
    pub fn missing_roots(&self, waiting: &[Prerequisite]) -> Vec<Prerequisite> {
        let mut stack: Vec<Prerequisite> = waiting.iter().rev().copied().collect();
        let mut seen: HashSet<Prerequisite> = HashSet::new();
        let mut roots = Vec::new();
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            match self.producer(p).and_then(|id| self.pending.get(&id)) {
                Some(pending) => stack.extend(pending.waiting.iter().rev().copied()),
                None => roots.push(p),
            }
        }
        roots
    }

    /// Oldest pending, optionally skipping checks.
    pub fn first(&self, include_checks: bool) -> Option<PendingId> {
        self.pending
            .iter()
            .find(|(_, p)| include_checks || p.target != Target::Check)
            .map(|(id, _)| *id)
    }

    pub fn ids(&self) -> Vec<PendingId> {
        self.pending.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdStorage;

    fn pending(target: Target, waiting: Vec<Prerequisite>) -> PendingResolution {
        PendingResolution {
            target,
            resolvable: Resolvable::Value(Expr::Num(0)),
            frame: EvalFrame::default(),
            waiting,
        }
    }

    #[test]
    fn test_waiters_in_registration_order() {
        let mut ids = IdStorage::new();
        let (a, b, c) = (ids.add("A"), ids.add("B"), ids.add("C"));
        let mut t = DependencyTables::new();
        let p1 = t.register(pending(Target::SymbolValue(b), vec![Prerequisite::Symbol(a)]));
        let p2 = t.register(pending(Target::SymbolValue(c), vec![Prerequisite::Symbol(a)]));
        assert_eq!(t.waiters(Prerequisite::Symbol(a)), vec![p1, p2]);
        assert_eq!(t.producer(Prerequisite::Symbol(b)), Some(p1));
        assert!(t.is_pending(Prerequisite::Symbol(c)));
    }

    #[test]
    fn test_take_clears_indexes() {
        let mut ids = IdStorage::new();
        let (a, b) = (ids.add("A"), ids.add("B"));
        let mut t = DependencyTables::new();
        let p = t.register(pending(Target::SymbolValue(b), vec![Prerequisite::Symbol(a)]));
        let taken = t.take(p).unwrap();
        assert_eq!(taken.target, Target::SymbolValue(b));
        assert!(t.waiters(Prerequisite::Symbol(a)).is_empty());
        assert!(!t.is_pending(Prerequisite::Symbol(b)));
        assert!(t.is_empty());
        t.reinsert(p, taken);
        assert_eq!(t.first(false), Some(p));
    }

    #[test]
    fn test_cycle_detection() {
        let mut ids = IdStorage::new();
        let (a, b, c) = (ids.add("A"), ids.add("B"), ids.add("C"));
        let mut t = DependencyTables::new();
        // A EQU B ; B EQU C
        t.register(pending(Target::SymbolValue(a), vec![Prerequisite::Symbol(b)]));
        t.register(pending(Target::SymbolValue(b), vec![Prerequisite::Symbol(c)]));
        // C EQU A closes the loop
        assert!(t.creates_cycle(Prerequisite::Symbol(c), &[Prerequisite::Symbol(a)]));
        assert!(!t.creates_cycle(Prerequisite::Symbol(c), &[]));
        let d = ids.add("D");
        assert!(!t.creates_cycle(Prerequisite::Symbol(d), &[Prerequisite::Symbol(a)]));
        assert!(t.creates_cycle(Prerequisite::Symbol(d), &[Prerequisite::Symbol(d)]));
    }

    #[test]
    fn test_missing_roots() {
        let mut ids = IdStorage::new();
        let (a, b, x) = (ids.add("A"), ids.add("B"), ids.add("X"));
        let mut t = DependencyTables::new();
        t.register(pending(
            Target::SymbolValue(b),
            vec![Prerequisite::Attribute(x, AttrKind::Length)],
        ));
        let roots = t.missing_roots(&[Prerequisite::Symbol(b), Prerequisite::Symbol(a)]);
        assert_eq!(
            roots,
            vec![Prerequisite::Attribute(x, AttrKind::Length), Prerequisite::Symbol(a)]
        );
    }

    #[test]
    fn test_first_skips_checks() {
        let mut ids = IdStorage::new();
        let a = ids.add("A");
        let mut t = DependencyTables::new();
        let check = t.register(pending(Target::Check, vec![Prerequisite::Symbol(a)]));
        let value = t.register(pending(Target::SymbolValue(a), vec![]));
        assert_eq!(t.first(false), Some(value));
        assert_eq!(t.first(true), Some(check));
        assert_eq!(t.ids(), vec![check, value]);
    }

    #[test]
    fn test_evaluation_map() {
        let e: Evaluation<i32> = Evaluation::ErrorFallback(1, ResolveError::UnableToEvaluate);
        assert_eq!(e.map(|v| v + 1), Evaluation::ErrorFallback(2, ResolveError::UnableToEvaluate));
        assert_eq!(Evaluation::Resolved(3).resolved(), Some(3));
        assert!(!Evaluation::<i32>::Blocked(vec![]).is_resolved());
    }

    #[test]
    fn test_target_keys() {
        let mut ids = IdStorage::new();
        let a = ids.add("A");
        assert_eq!(Target::SymbolValue(a).key(), Some(Prerequisite::Symbol(a)));
        assert_eq!(Target::Check.key(), None);
    }
}

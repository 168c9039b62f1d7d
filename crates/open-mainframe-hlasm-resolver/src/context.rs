//! Ordinary assembly context: symbols, sections, spaces and the deferred
//! resolutions that tie them together.
//!
//! Statements are processed in source order. Anything that cannot be
//! computed yet is registered as a pending resolution; defining a symbol,
//! an attribute or a space length wakes the pendings waiting on it, which
//! are retried from a worklist until nothing more can be resolved.
//! [`OrdinaryContext::finish`] then reports what stayed unresolved and
//! applies fallback values.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::address::Value;
use crate::attribute::{AttributeSource, MacroOrigin, VariableValue};
use crate::config::ResolverConfig;
use crate::dependency::{
    DependencyTables, Evaluation, PendingId, PendingResolution, Prerequisite, Resolvable, Target,
};
use crate::diagnostic::{Diagnostic, Location, ResolveError};
use crate::expr::{evaluate, evaluate_absolute, AttrKind, AttrOperand, EvalContext, EvalFrame};
use crate::handlers;
use crate::ids::{Id, IdStorage};
use crate::instruction::InsnCatalog;
use crate::parser::Statement;
use crate::section::{highest, Layout, SectionKind};
use crate::space::{SpaceArena, SpaceResolution};
use crate::symbol::{AttrSlot, Symbol, SymbolAttributes, SymbolTable, SymbolValue};

// ---------------------------------------------------------------------------
//  Resolution outcomes
// ---------------------------------------------------------------------------

/// A computed value, ready to be stored into its target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Value(Value),
    Length(u32),
    Scale(i32),
    Integer(i32),
    Space(SpaceResolution),
    Nothing,
}

// ---------------------------------------------------------------------------
//  Context
// ---------------------------------------------------------------------------

pub struct OrdinaryContext {
    pub(crate) config: ResolverConfig,
    pub(crate) ids: IdStorage,
    pub(crate) symbols: SymbolTable,
    pub(crate) layout: Layout,
    deps: DependencyTables,
    variables: HashMap<Id, VariableValue>,
    macros: HashMap<Id, MacroOrigin>,
    pub(crate) instructions: InsnCatalog,
    diagnostics: Vec<Diagnostic>,
    worklist: VecDeque<PendingId>,
    queued: HashSet<PendingId>,
    draining: bool,
    stalled: Vec<PendingId>,
    finished: bool,
    reported_roots: HashSet<Id>,
}

impl Default for OrdinaryContext {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl EvalContext for OrdinaryContext {
    fn symbol_value(&self, id: Id) -> Option<&SymbolValue> {
        self.symbols.get(id).map(Symbol::value)
    }

    fn attribute(&self, kind: AttrKind, operand: &AttrOperand, frame: &EvalFrame) -> Evaluation<i32> {
        AttributeSource {
            ids: &self.ids,
            symbols: &self.symbols,
            variables: &self.variables,
            macros: &self.macros,
            instructions: &self.instructions,
            finished: self.finished,
        }
        .attribute(kind, operand, frame)
    }

    fn spaces(&self) -> &SpaceArena {
        self.layout.spaces()
    }
}

impl OrdinaryContext {
    pub fn new(config: ResolverConfig) -> Self {
        let layout = Layout::new(config.loctr_alignment);
        Self {
            config,
            ids: IdStorage::new(),
            symbols: SymbolTable::new(),
            layout,
            deps: DependencyTables::new(),
            variables: HashMap::new(),
            macros: HashMap::new(),
            instructions: InsnCatalog::new(),
            diagnostics: Vec::new(),
            worklist: VecDeque::new(),
            queued: HashSet::new(),
            draining: false,
            stalled: Vec::new(),
            finished: false,
            reported_roots: HashSet::new(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdStorage {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdStorage {
        &mut self.ids
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.ids.find(name).and_then(|id| self.symbols.get(id))
    }

    /// Value of `name` with every resolved space substituted.
    pub fn symbol_value(&self, name: &str) -> Option<SymbolValue> {
        let sym = self.symbol(name)?;
        Some(match sym.value() {
            SymbolValue::Relocatable(a) => SymbolValue::Relocatable(a.normalized(self.layout.spaces())),
            other => other.clone(),
        })
    }

    /// Absolute value of `name`, or its offset from the start of its section
    /// when it is a fully resolved relocatable symbol.
    pub fn lookup_symbol(&self, name: &str) -> Option<i32> {
        match self.symbol_value(name)? {
            SymbolValue::Absolute(n) => Some(n),
            SymbolValue::Relocatable(a) if a.is_simple() && a.spaces().is_empty() => Some(a.offset()),
            _ => None,
        }
    }

    /// Evaluate `kind'name` for an ordinary symbol (or opcode, for `O'`) in
    /// the current state.
    pub fn request_attribute(&mut self, kind: AttrKind, name: &str) -> Evaluation<i32> {
        let id = self.ids.add(name);
        self.attribute(kind, &AttrOperand::Symbol(id), &EvalFrame::default())
    }

    pub fn request_variable_attribute(&mut self, kind: AttrKind, name: &str) -> Evaluation<i32> {
        let id = self.ids.add(name.trim_start_matches('&'));
        self.attribute(kind, &AttrOperand::Variable(id), &EvalFrame::default())
    }

    /// Record the value of a variable symbol for `K'`, `N'` and `T'`.
    pub fn define_variable(&mut self, name: &str, value: VariableValue) {
        let id = self.ids.add(name.trim_start_matches('&'));
        self.variables.insert(id, value);
    }

    /// Record a macro definition; pending `O'` references to it resolve.
    pub fn define_macro(&mut self, name: &str, origin: MacroOrigin) {
        let id = self.ids.add(name);
        self.macros.insert(id, origin);
        tracing::debug!(macro_name = self.ids.name(id), ?origin, "macro defined");
        self.notify(&[Prerequisite::Attribute(id, AttrKind::Opcode)]);
    }

    pub fn section_kind(&self, name: &str) -> Option<SectionKind> {
        let id = self.ids.find(name)?;
        let sid = self.layout.find_section(id)?;
        self.layout.section(sid).map(|s| s.kind)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Pending resolutions still registered.
    pub fn pending_count(&self) -> usize {
        self.deps.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process one statement.
    pub fn process(&mut self, statement: &Statement) {
        handlers::process(self, statement);
    }

    // -- Diagnostics --------------------------------------------------------

    pub(crate) fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        let limit = self.config.max_diagnostics;
        if limit > 0 && self.diagnostics.len() >= limit {
            tracing::debug!(code = %diagnostic.code, "diagnostic dropped, limit reached");
            return;
        }
        tracing::debug!(code = %diagnostic.code, line = diagnostic.location.line, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn report(&mut self, error: &ResolveError, location: Location) {
        self.add_diagnostic(error.at(location));
    }

    // -- Symbols ------------------------------------------------------------

    /// Create a symbol and wake everything waiting on what it makes known.
    /// A duplicate name is reported and `false` returned.
    pub(crate) fn create_symbol(
        &mut self,
        id: Id,
        value: SymbolValue,
        attributes: SymbolAttributes,
        location: Location,
    ) -> bool {
        let defined = value.is_defined();
        let known = [
            (AttrKind::Type, true),
            (AttrKind::Length, attributes.length != AttrSlot::Pending),
            (AttrKind::Scale, attributes.scale != AttrSlot::Pending),
            (AttrKind::Integer, attributes.integer != AttrSlot::Pending),
        ];
        if let Err(e) = self.symbols.create(id, value, attributes, location) {
            self.report(&e, location);
            return false;
        }
        tracing::debug!(symbol = self.ids.name(id), defined, "symbol created");
        let mut keys: Vec<Prerequisite> = known
            .iter()
            .filter(|(_, k)| *k)
            .map(|&(kind, _)| Prerequisite::Attribute(id, kind))
            .collect();
        if defined {
            keys.insert(0, Prerequisite::Symbol(id));
        }
        self.notify(&keys);
        true
    }

    // -- Deferred resolution ------------------------------------------------

    /// Resolve `target` now if possible, otherwise register it to be retried
    /// when what it is blocked on becomes known.
    pub(crate) fn resolve_or_defer(&mut self, target: Target, resolvable: Resolvable, frame: EvalFrame) {
        let pending = PendingResolution {
            target,
            resolvable,
            frame,
            waiting: Vec::new(),
        };
        self.settle(None, pending);
    }

    fn settle(&mut self, id: Option<PendingId>, mut pending: PendingResolution) {
        match self.attempt(&pending) {
            Evaluation::Resolved(outcome) => self.apply(pending.target, outcome),
            Evaluation::ErrorFallback(outcome, e) => {
                self.report(&e, pending.frame.location);
                self.apply(pending.target, outcome);
            }
            Evaluation::Blocked(waiting) => {
                let cyclic = pending
                    .target
                    .key()
                    .is_some_and(|k| waiting.contains(&k) || self.deps.creates_cycle(k, &waiting));
                if cyclic {
                    tracing::debug!(pending = ?pending.target, "dependency cycle");
                    self.report(&ResolveError::CyclicDependency, pending.frame.location);
                    let outcome = fallback(&pending);
                    self.apply(pending.target, outcome);
                    return;
                }
                pending.waiting = waiting;
                match id {
                    Some(id) => self.deps.reinsert(id, pending),
                    None => {
                        self.deps.register(pending);
                    }
                }
            }
        }
    }

    fn notify(&mut self, keys: &[Prerequisite]) {
        for key in keys {
            for id in self.deps.waiters(*key) {
                if self.queued.insert(id) {
                    self.worklist.push_back(id);
                }
            }
        }
        self.drain();
    }

    /// Run the cascade started by a wake-up to its fixed point. Retries past
    /// `max_sweeps` in one cascade are parked and picked up again by
    /// [`Self::finish`].
    fn drain(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        let mut sweeps = 0usize;
        while let Some(id) = self.worklist.pop_front() {
            self.queued.remove(&id);
            sweeps += 1;
            if self.config.max_sweeps > 0 && sweeps > self.config.max_sweeps {
                if sweeps == self.config.max_sweeps + 1 {
                    tracing::warn!(limit = self.config.max_sweeps, "retry limit reached, deferring to finish");
                }
                self.stalled.push(id);
                continue;
            }
            if let Some(pending) = self.deps.take(id) {
                self.settle(Some(id), pending);
            }
        }
        self.draining = false;
    }

    /// Give every parked retry another cascade. Each round either resolves
    /// something or shrinks the parked set, so this terminates.
    fn retry_stalled(&mut self) {
        while !self.stalled.is_empty() {
            for id in std::mem::take(&mut self.stalled) {
                if self.deps.get(id).is_some() && self.queued.insert(id) {
                    self.worklist.push_back(id);
                }
            }
            tracing::debug!(retries = self.worklist.len(), "retrying parked resolutions");
            self.drain();
        }
    }

    fn apply(&mut self, target: Target, outcome: Outcome) {
        let changed = match (target, outcome) {
            (Target::SymbolValue(id), Outcome::Value(v)) => {
                let v = v.simplified(self.layout.spaces());
                self.symbols.set_value(id, SymbolValue::from(v))
            }
            (Target::SymbolAttribute(id, AttrKind::Length), Outcome::Length(l)) => self.symbols.set_length(id, l),
            (Target::SymbolAttribute(id, AttrKind::Scale), Outcome::Scale(s)) => self.symbols.set_scale(id, s),
            (Target::SymbolAttribute(id, AttrKind::Integer), Outcome::Integer(n)) => {
                self.symbols.set_integer(id, n)
            }
            (Target::Space(sp), Outcome::Space(res)) => self.layout.spaces_mut().resolve(sp, res),
            (Target::Check, _) => false,
            (defined, outcome) => {
                tracing::warn!(?defined, ?outcome, "mismatched resolution outcome");
                false
            }
        };
        if changed {
            if let Some(key) = target.key() {
                self.notify(&[key]);
            }
        }
    }

    /// Try to compute a pending target.
    fn attempt(&self, pending: &PendingResolution) -> Evaluation<Outcome> {
        let frame = &pending.frame;
        match &pending.resolvable {
            Resolvable::Value(expr) => evaluate(expr, self, frame).map(Outcome::Value),
            Resolvable::Length { expr, rule } => match evaluate(expr, self, frame) {
                Evaluation::Resolved(Value::Abs(n)) if (rule.min..=rule.max).contains(&n) => {
                    Evaluation::Resolved(Outcome::Length(n as u32))
                }
                Evaluation::Resolved(_) => Evaluation::ErrorFallback(Outcome::Length(rule.fallback), rule.error.clone()),
                Evaluation::Blocked(p) => Evaluation::Blocked(p),
                Evaluation::ErrorFallback(_, e) => Evaluation::ErrorFallback(Outcome::Length(rule.fallback), e),
            },
            Resolvable::Scale(expr) => evaluate_absolute(expr, self, frame).map(Outcome::Scale),
            Resolvable::Integer { symbol, data_type } => {
                let Some(sym) = self.symbols.get(*symbol) else {
                    return Evaluation::Resolved(Outcome::Integer(0));
                };
                let attrs = &sym.attributes;
                let mut blocked = Vec::new();
                if attrs.length == AttrSlot::Pending {
                    blocked.push(Prerequisite::Attribute(*symbol, AttrKind::Length));
                }
                if attrs.scale == AttrSlot::Pending {
                    blocked.push(Prerequisite::Attribute(*symbol, AttrKind::Scale));
                }
                if !blocked.is_empty() {
                    return Evaluation::Blocked(blocked);
                }
                let length = attrs.length.known().unwrap_or(1);
                let scale = attrs.scale.known().unwrap_or(0);
                Evaluation::Resolved(Outcome::Integer(data_type.integer_attribute(length, scale)))
            }
            Resolvable::SpaceLength(expr) => {
                evaluate_absolute(expr, self, frame).map(|n| Outcome::Space(SpaceResolution::constant(n.max(0))))
            }
            Resolvable::AlignPad {
                position,
                reference,
                alignment,
            } => {
                let rel = (position.clone() - reference.clone()).normalized(self.layout.spaces());
                if rel.spaces().is_empty() {
                    let pad = alignment.padding(i64::from(rel.offset()));
                    Evaluation::Resolved(Outcome::Space(SpaceResolution::constant(pad)))
                } else {
                    Evaluation::Blocked(rel.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect())
                }
            }
            Resolvable::OrgTarget {
                target,
                position,
                boundary,
                offset,
            } => handlers::org::resolve_target(self, pending.target, target, position, *boundary, *offset, frame),
            Resolvable::OrgMax { candidates, position } => match highest(candidates, self.layout.spaces()) {
                Ok(max) => {
                    let diff = (max - position.clone()).normalized(self.layout.spaces());
                    Evaluation::Resolved(Outcome::Space(SpaceResolution {
                        length: diff.offset(),
                        spaces: diff.spaces().to_vec(),
                    }))
                }
                Err(spaces) => Evaluation::Blocked(spaces.into_iter().map(Prerequisite::Space).collect()),
            },
            Resolvable::LoctrBegin {
                candidates,
                section_start,
                alignment,
            } => match highest(candidates, self.layout.spaces()) {
                Ok(max) => {
                    let rel = (max - section_start.clone()).normalized(self.layout.spaces());
                    if rel.spaces().is_empty() {
                        let end = rel.offset().max(0);
                        let begin = end + alignment.padding(i64::from(end));
                        Evaluation::Resolved(Outcome::Space(SpaceResolution::constant(begin)))
                    } else {
                        Evaluation::Blocked(rel.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect())
                    }
                }
                Err(spaces) => Evaluation::Blocked(spaces.into_iter().map(Prerequisite::Space).collect()),
            },
            Resolvable::UnderflowCheck {
                target,
                origin,
                boundary,
                offset,
            } => handlers::org::check_underflow(self, target, origin, *boundary, *offset, frame),
            Resolvable::LengthCheck {
                expr,
                type_code,
                min,
                max,
            } => match evaluate_absolute(expr, self, frame) {
                Evaluation::Resolved(n) if (*min..=*max).contains(&n) => Evaluation::Resolved(Outcome::Nothing),
                Evaluation::Resolved(_) => Evaluation::ErrorFallback(
                    Outcome::Nothing,
                    ResolveError::LengthModifier {
                        type_code: *type_code,
                        min: *min,
                        max: *max,
                    },
                ),
                Evaluation::Blocked(p) => Evaluation::Blocked(p),
                Evaluation::ErrorFallback(..) => Evaluation::Resolved(Outcome::Nothing),
            },
        }
    }

    // -- End of source ------------------------------------------------------

    /// Complete the analysis: place location counters, report everything
    /// that stayed unresolved and give it a fallback value.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        let alignment = self.layout.loctr_alignment();
        for req in self.layout.loctr_begin_requests() {
            tracing::debug!(loctr = req.loctr.index(), "placing location counter");
            self.resolve_or_defer(
                Target::Space(req.space),
                Resolvable::LoctrBegin {
                    candidates: req.candidates,
                    section_start: req.section_start,
                    alignment,
                },
                EvalFrame::default(),
            );
        }
        self.drain();
        self.retry_stalled();
        self.finished = true;

        let mut explained = HashSet::new();
        for id in self.deps.ids() {
            let Some(pending) = self.deps.get(id) else {
                continue;
            };
            if pending.target != Target::Check {
                let (waiting, location) = (pending.waiting.clone(), pending.frame.location);
                if self.report_unresolved(&waiting, location) {
                    explained.insert(id);
                }
            }
        }

        while let Some(id) = self.deps.first(false) {
            let Some(pending) = self.deps.take(id) else {
                break;
            };
            let outcome = match self.attempt(&pending) {
                Evaluation::Resolved(o) => o,
                Evaluation::ErrorFallback(o, e) => {
                    self.report(&e, pending.frame.location);
                    o
                }
                Evaluation::Blocked(waiting) => {
                    let location = pending.frame.location;
                    if !explained.contains(&id) && !self.report_unresolved(&waiting, location) {
                        self.report(&ResolveError::CyclicDependency, location);
                    }
                    fallback(&pending)
                }
            };
            self.apply(pending.target, outcome);
            self.retry_stalled();
        }

        let dropped = self.deps.ids();
        for id in &dropped {
            self.deps.take(*id);
        }
        tracing::info!(
            symbols = self.symbols.len(),
            spaces = self.layout.spaces().len(),
            unresolved_checks = dropped.len(),
            diagnostics = self.diagnostics.len(),
            "ordinary symbol resolution finished"
        );
    }

    /// Report the undefined symbols a pending ultimately waits on, once per
    /// symbol; a pending with nothing undefined underneath is part of a
    /// cycle. Returns whether a diagnostic, new or earlier, accounts for it.
    fn report_unresolved(&mut self, waiting: &[Prerequisite], location: Location) -> bool {
        let roots = self.deps.missing_roots(waiting);
        if roots.is_empty() {
            self.report(&ResolveError::CyclicDependency, location);
            return true;
        }
        let mut explained = false;
        for root in roots {
            let id = match root {
                Prerequisite::Symbol(id) => id,
                Prerequisite::Attribute(id, kind) if kind != AttrKind::Opcode => id,
                _ => continue,
            };
            if self.symbols.contains(id) {
                continue;
            }
            explained = true;
            if !self.reported_roots.insert(id) {
                continue;
            }
            let error = ResolveError::UnresolvedReference {
                kind: "ordinary symbol",
                name: self.ids.name(id).to_string(),
            };
            self.report(&error, location);
        }
        explained
    }
}

/// Value given to a target that cannot be resolved.
fn fallback(pending: &PendingResolution) -> Outcome {
    match (pending.target, &pending.resolvable) {
        (Target::SymbolValue(_), _) => Outcome::Value(Value::Abs(0)),
        (Target::SymbolAttribute(_, AttrKind::Length), Resolvable::Length { rule, .. }) => {
            Outcome::Length(rule.fallback)
        }
        (Target::SymbolAttribute(_, AttrKind::Length), _) => Outcome::Length(1),
        (Target::SymbolAttribute(_, AttrKind::Scale), _) => Outcome::Scale(0),
        (Target::SymbolAttribute(_, _), _) => Outcome::Integer(0),
        (Target::Space(_), _) => Outcome::Space(SpaceResolution::constant(0)),
        (Target::Check, _) => Outcome::Nothing,
    }
}

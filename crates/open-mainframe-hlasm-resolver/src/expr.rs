//! Machine expressions and their evaluation.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated against an
//! [`EvalContext`]. Evaluation never fails outright: it either produces a
//! [`Value`], reports the prerequisites it is blocked on, or recovers from an
//! error with a fallback value.

use crate::address::{Address, Value};
use crate::dependency::{Evaluation, Prerequisite};
use crate::diagnostic::{Location, ResolveError};
use crate::ids::Id;
use crate::space::SpaceArena;
use crate::symbol::SymbolValue;

// ---------------------------------------------------------------------------
//  Expression tree
// ---------------------------------------------------------------------------

/// Data attribute selector (`L'`, `T'`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKind {
    Length,
    Type,
    Integer,
    Scale,
    Count,
    Number,
    Defined,
    Opcode,
}

impl AttrKind {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'L' => Some(AttrKind::Length),
            'T' => Some(AttrKind::Type),
            'I' => Some(AttrKind::Integer),
            'S' => Some(AttrKind::Scale),
            'K' => Some(AttrKind::Count),
            'N' => Some(AttrKind::Number),
            'D' => Some(AttrKind::Defined),
            'O' => Some(AttrKind::Opcode),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            AttrKind::Length => 'L',
            AttrKind::Type => 'T',
            AttrKind::Integer => 'I',
            AttrKind::Scale => 'S',
            AttrKind::Count => 'K',
            AttrKind::Number => 'N',
            AttrKind::Defined => 'D',
            AttrKind::Opcode => 'O',
        }
    }
}

/// What an attribute reference names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOperand {
    /// Ordinary symbol, or an operation code for `O'`.
    Symbol(Id),
    /// Variable symbol, without the leading `&`.
    Variable(Id),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Decimal or self-defining term.
    Num(i32),
    Symbol(Id),
    Attribute(AttrKind, AttrOperand),
    /// `*`
    LocationCounter,
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn uses_location_counter(&self) -> bool {
        match self {
            Expr::LocationCounter => true,
            Expr::Num(_) | Expr::Symbol(_) | Expr::Attribute(..) => false,
            Expr::Neg(e) => e.uses_location_counter(),
            Expr::Binary(_, l, r) => l.uses_location_counter() || r.uses_location_counter(),
        }
    }

    /// First term in reading order.
    pub fn leftmost_term(&self) -> &Expr {
        match self {
            Expr::Binary(_, l, _) => l.leftmost_term(),
            other => other,
        }
    }

    /// Ordinary symbols referenced as terms.
    pub fn symbols(&self) -> Vec<Id> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<Id>) {
        match self {
            Expr::Symbol(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            Expr::Neg(e) => e.collect_symbols(out),
            Expr::Binary(_, l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
//  Evaluation
// ---------------------------------------------------------------------------

/// Statement-level inputs an expression is evaluated with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalFrame {
    /// Value of `*`, captured only for expressions that use it.
    pub location_counter: Option<Address>,
    /// Name field of the statement.
    pub label: Option<Id>,
    pub location: Location,
}

impl EvalFrame {
    pub fn new(label: Option<Id>, location: Location) -> Self {
        Self {
            location_counter: None,
            label,
            location,
        }
    }

    pub fn with_location_counter(mut self, address: Address) -> Self {
        self.location_counter = Some(address);
        self
    }
}

/// Source of symbol values and attributes during evaluation.
pub trait EvalContext {
    fn symbol_value(&self, id: Id) -> Option<&SymbolValue>;
    fn attribute(&self, kind: AttrKind, operand: &AttrOperand, frame: &EvalFrame) -> Evaluation<i32>;
    fn spaces(&self) -> &SpaceArena;
}

/// Evaluate `expr`. A resolved value is simplified; a base-less value that
/// still contains unresolved spaces counts as blocked on those spaces.
pub fn evaluate(expr: &Expr, ctx: &impl EvalContext, frame: &EvalFrame) -> Evaluation<Value> {
    match eval(expr, ctx, frame) {
        Evaluation::Resolved(v) => settle(v, ctx.spaces()),
        other => other,
    }
}

/// Evaluate `expr` where only an absolute value is acceptable.
pub fn evaluate_absolute(expr: &Expr, ctx: &impl EvalContext, frame: &EvalFrame) -> Evaluation<i32> {
    match evaluate(expr, ctx, frame) {
        Evaluation::Resolved(Value::Abs(n)) => Evaluation::Resolved(n),
        Evaluation::Resolved(Value::Reloc(_)) => Evaluation::ErrorFallback(0, ResolveError::UnableToEvaluate),
        Evaluation::Blocked(p) => Evaluation::Blocked(p),
        Evaluation::ErrorFallback(_, e) => Evaluation::ErrorFallback(0, e),
    }
}

fn settle(v: Value, spaces: &SpaceArena) -> Evaluation<Value> {
    match v.simplified(spaces) {
        Value::Reloc(a) if a.is_absolute() => {
            Evaluation::Blocked(a.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect())
        }
        v => Evaluation::Resolved(v),
    }
}

fn eval(expr: &Expr, ctx: &impl EvalContext, frame: &EvalFrame) -> Evaluation<Value> {
    match expr {
        Expr::Num(n) => Evaluation::Resolved(Value::Abs(*n)),
        Expr::Symbol(id) => match ctx.symbol_value(*id).and_then(SymbolValue::as_value) {
            Some(v) => Evaluation::Resolved(v),
            None => Evaluation::Blocked(vec![Prerequisite::Symbol(*id)]),
        },
        Expr::Attribute(kind, operand) => ctx.attribute(*kind, operand, frame).map(Value::Abs),
        Expr::LocationCounter => match &frame.location_counter {
            Some(a) => Evaluation::Resolved(Value::Reloc(a.clone())),
            None => Evaluation::ErrorFallback(Value::Abs(0), ResolveError::UnableToEvaluate),
        },
        Expr::Neg(e) => eval(e, ctx, frame).map(|v| -v),
        Expr::Binary(op, l, r) => {
            let left = eval(l, ctx, frame);
            let right = eval(r, ctx, frame);
            combine(*op, left, right, ctx.spaces())
        }
    }
}

fn combine(op: BinOp, left: Evaluation<Value>, right: Evaluation<Value>, spaces: &SpaceArena) -> Evaluation<Value> {
    use Evaluation::*;
    match (left, right) {
        (Blocked(mut a), Blocked(b)) => {
            for p in b {
                if !a.contains(&p) {
                    a.push(p);
                }
            }
            Blocked(a)
        }
        (Blocked(a), _) | (_, Blocked(a)) => Blocked(a),
        (ErrorFallback(_, e), _) | (_, ErrorFallback(_, e)) => ErrorFallback(Value::Abs(0), e),
        (Resolved(a), Resolved(b)) => apply(op, a, b, spaces),
    }
}

fn apply(op: BinOp, a: Value, b: Value, spaces: &SpaceArena) -> Evaluation<Value> {
    match op {
        BinOp::Add => Evaluation::Resolved(a + b),
        BinOp::Sub => Evaluation::Resolved(a - b),
        BinOp::Mul | BinOp::Div => {
            let left = multiplicative_operand(a, spaces);
            let right = multiplicative_operand(b, spaces);
            combine_absolute(left, right).map(|(x, y)| match op {
                BinOp::Mul => Value::Abs(x.wrapping_mul(y)),
                _ if y == 0 => Value::Abs(0),
                _ => Value::Abs(x.wrapping_div(y)),
            })
        }
    }
}

/// Operands of `*` and `/` must be absolute. A difference of addresses
/// across unresolved spaces is absolute but not yet known.
fn multiplicative_operand(v: Value, spaces: &SpaceArena) -> Evaluation<i32> {
    match v.simplified(spaces) {
        Value::Abs(n) => Evaluation::Resolved(n),
        Value::Reloc(a) if a.is_absolute() => {
            Evaluation::Blocked(a.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect())
        }
        Value::Reloc(_) => Evaluation::ErrorFallback(0, ResolveError::UnableToEvaluate),
    }
}

fn combine_absolute(a: Evaluation<i32>, b: Evaluation<i32>) -> Evaluation<(i32, i32)> {
    use Evaluation::*;
    match (a, b) {
        (Resolved(x), Resolved(y)) => Resolved((x, y)),
        (Blocked(mut p), Blocked(q)) => {
            for s in q {
                if !p.contains(&s) {
                    p.push(s);
                }
            }
            Blocked(p)
        }
        (Blocked(p), _) | (_, Blocked(p)) => Blocked(p),
        (ErrorFallback(_, e), _) | (_, ErrorFallback(_, e)) => ErrorFallback((0, 0), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdStorage;
    use crate::section::{LoctrId, SectionId};
    use crate::space::{Alignment, SpaceKind, SpaceResolution};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockContext {
        values: HashMap<Id, SymbolValue>,
        lengths: HashMap<Id, i32>,
        spaces: SpaceArena,
    }

    impl EvalContext for MockContext {
        fn symbol_value(&self, id: Id) -> Option<&SymbolValue> {
            self.values.get(&id)
        }

        fn attribute(&self, kind: AttrKind, operand: &AttrOperand, _frame: &EvalFrame) -> Evaluation<i32> {
            match (kind, operand) {
                (AttrKind::Length, AttrOperand::Symbol(id)) => match self.lengths.get(id) {
                    Some(l) => Evaluation::Resolved(*l),
                    None => Evaluation::Blocked(vec![Prerequisite::Attribute(*id, kind)]),
                },
                _ => Evaluation::ErrorFallback(0, ResolveError::AttributeMisuse),
            }
        }

        fn spaces(&self) -> &SpaceArena {
            &self.spaces
        }
    }

    fn section_addr(offset: i32) -> Address {
        Address::section_start(SectionId::from_index(0)).with_offset(offset)
    }

    #[test]
    fn test_arithmetic_precedence_result() {
        let ctx = MockContext::default();
        // 2 + 3 * 4
        let e = Expr::binary(
            BinOp::Add,
            Expr::Num(2),
            Expr::binary(BinOp::Mul, Expr::Num(3), Expr::Num(4)),
        );
        assert_eq!(evaluate(&e, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(14)));
    }

    #[test]
    fn test_division_truncates_and_zero_divisor() {
        let ctx = MockContext::default();
        let e = Expr::binary(BinOp::Div, Expr::Num(-7), Expr::Num(2));
        assert_eq!(evaluate(&e, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(-3)));
        let z = Expr::binary(BinOp::Div, Expr::Num(7), Expr::Num(0));
        assert_eq!(evaluate(&z, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(0)));
    }

    #[test]
    fn test_blocked_on_all_missing_symbols() {
        let mut ids = IdStorage::new();
        let (a, b) = (ids.add("A"), ids.add("B"));
        let ctx = MockContext::default();
        let e = Expr::binary(BinOp::Sub, Expr::Symbol(b), Expr::Symbol(a));
        assert_eq!(
            evaluate(&e, &ctx, &EvalFrame::default()),
            Evaluation::Blocked(vec![Prerequisite::Symbol(b), Prerequisite::Symbol(a)])
        );
    }

    #[test]
    fn test_relocatable_difference_is_absolute() {
        let mut ids = IdStorage::new();
        let (a, b) = (ids.add("A"), ids.add("B"));
        let mut ctx = MockContext::default();
        ctx.values.insert(a, SymbolValue::Relocatable(section_addr(4)));
        ctx.values.insert(b, SymbolValue::Relocatable(section_addr(16)));
        let e = Expr::binary(BinOp::Sub, Expr::Symbol(b), Expr::Symbol(a));
        assert_eq!(evaluate(&e, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(12)));
    }

    #[test]
    fn test_multiply_relocatable_is_error() {
        let mut ids = IdStorage::new();
        let a = ids.add("A");
        let mut ctx = MockContext::default();
        ctx.values.insert(a, SymbolValue::Relocatable(section_addr(4)));
        let e = Expr::binary(BinOp::Mul, Expr::Symbol(a), Expr::Num(2));
        assert!(matches!(
            evaluate(&e, &ctx, &EvalFrame::default()),
            Evaluation::ErrorFallback(Value::Abs(0), ResolveError::UnableToEvaluate)
        ));
    }

    #[test]
    fn test_difference_across_space_blocks_until_resolved() {
        let mut ids = IdStorage::new();
        let (a, b) = (ids.add("A"), ids.add("B"));
        let mut ctx = MockContext::default();
        let sp = ctx.spaces.create(SpaceKind::Ordinary, LoctrId::first(), Alignment::NONE);
        ctx.values.insert(a, SymbolValue::Relocatable(section_addr(0)));
        ctx.values.insert(b, SymbolValue::Relocatable(section_addr(2).with_space(sp, 1)));
        let e = Expr::binary(
            BinOp::Mul,
            Expr::binary(BinOp::Sub, Expr::Symbol(b), Expr::Symbol(a)),
            Expr::Num(3),
        );
        assert_eq!(
            evaluate(&e, &ctx, &EvalFrame::default()),
            Evaluation::Blocked(vec![Prerequisite::Space(sp)])
        );
        ctx.spaces.resolve(sp, SpaceResolution::constant(6));
        assert_eq!(evaluate(&e, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(24)));
    }

    #[test]
    fn test_location_counter_requires_frame() {
        let ctx = MockContext::default();
        let e = Expr::binary(BinOp::Add, Expr::LocationCounter, Expr::Num(4));
        let frame = EvalFrame::default().with_location_counter(section_addr(8));
        match evaluate(&e, &ctx, &frame) {
            Evaluation::Resolved(Value::Reloc(a)) => assert_eq!(a.offset(), 12),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            evaluate(&e, &ctx, &EvalFrame::default()),
            Evaluation::ErrorFallback(..)
        ));
    }

    #[test]
    fn test_attribute_terms() {
        let mut ids = IdStorage::new();
        let x = ids.add("X");
        let mut ctx = MockContext::default();
        let e = Expr::binary(BinOp::Add, Expr::Attribute(AttrKind::Length, AttrOperand::Symbol(x)), Expr::Num(1));
        assert_eq!(
            evaluate(&e, &ctx, &EvalFrame::default()),
            Evaluation::Blocked(vec![Prerequisite::Attribute(x, AttrKind::Length)])
        );
        ctx.lengths.insert(x, 4);
        assert_eq!(evaluate(&e, &ctx, &EvalFrame::default()), Evaluation::Resolved(Value::Abs(5)));
    }

    #[test]
    fn test_expr_queries() {
        let mut ids = IdStorage::new();
        let (a, b) = (ids.add("A"), ids.add("B"));
        let e = Expr::binary(
            BinOp::Add,
            Expr::binary(BinOp::Sub, Expr::Symbol(b), Expr::LocationCounter),
            Expr::Symbol(a),
        );
        assert!(e.uses_location_counter());
        assert_eq!(e.leftmost_term(), &Expr::Symbol(b));
        assert_eq!(e.symbols(), vec![b, a]);
        assert_eq!(AttrKind::from_letter('l'), Some(AttrKind::Length));
        assert_eq!(AttrKind::Opcode.letter(), 'O');
    }
}

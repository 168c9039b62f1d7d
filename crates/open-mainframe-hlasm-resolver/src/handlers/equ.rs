//! EQU: define a symbol from an expression, with optional explicit length
//! and type attributes.

use crate::address::Value;
use crate::context::OrdinaryContext;
use crate::dependency::{Evaluation, LengthRule, Resolvable, Target};
use crate::diagnostic::ResolveError;
use crate::ebcdic;
use crate::expr::{evaluate, AttrKind, EvalFrame, Expr};
use crate::ids::Id;
use crate::parser::Statement;
use crate::symbol::{AttrSlot, SymbolAttributes, SymbolOrigin, SymbolValue};

use super::frame_for;

const MAX_LENGTH: i32 = 65535;
const MAX_TYPE: i32 = 255;

pub(crate) fn process(
    ctx: &mut OrdinaryContext,
    st: &Statement,
    value: Option<&Expr>,
    length: Option<&Expr>,
    type_attr: Option<&Expr>,
) {
    let Some(label) = st.label else {
        ctx.report(&ResolveError::UnableToEvaluate, st.location);
        return;
    };
    let frame = frame_for(ctx, st, [value, length, type_attr].into_iter().flatten());

    let implicit = value.map_or(1, |v| implicit_length(ctx, v));
    let (length_slot, deferred_length) = match length {
        None => (AttrSlot::Known(implicit), None),
        Some(expr) => explicit_length(ctx, expr, implicit, &frame),
    };
    let type_code = match type_attr {
        None => ebcdic::from_ascii('U'),
        Some(expr) => explicit_type(ctx, expr, &frame),
    };

    let attributes = SymbolAttributes {
        origin: SymbolOrigin::Equ,
        type_attr: type_code,
        length: length_slot,
        scale: AttrSlot::Absent,
        integer: AttrSlot::Absent,
    };

    let Some(value) = value else {
        ctx.report(&ResolveError::UnableToEvaluate, st.location);
        ctx.create_symbol(label, SymbolValue::Absolute(0), attributes, st.location);
        return;
    };
    if !ctx.create_symbol(label, SymbolValue::Undefined, attributes, st.location) {
        return;
    }

    if let Some(expr) = deferred_length {
        ctx.resolve_or_defer(
            Target::SymbolAttribute(label, AttrKind::Length),
            Resolvable::Length {
                expr,
                rule: LengthRule {
                    min: 0,
                    max: MAX_LENGTH,
                    fallback: implicit,
                    error: ResolveError::EquLength,
                },
            },
            frame.clone(),
        );
    }
    ctx.resolve_or_defer(Target::SymbolValue(label), Resolvable::Value(value.clone()), frame);
}

/// Length of the leftmost term when it is a symbol with a known length,
/// otherwise 1.
fn implicit_length(ctx: &OrdinaryContext, value: &Expr) -> u32 {
    match value.leftmost_term() {
        Expr::Symbol(id) => symbol_length(ctx, *id).unwrap_or(1),
        _ => 1,
    }
}

fn symbol_length(ctx: &OrdinaryContext, id: Id) -> Option<u32> {
    ctx.symbols.get(id).and_then(|s| s.attributes.length.known())
}

/// Explicit length operand: known now, deferred, or replaced by the implicit
/// length after an error.
fn explicit_length(
    ctx: &mut OrdinaryContext,
    expr: &Expr,
    implicit: u32,
    frame: &EvalFrame,
) -> (AttrSlot<u32>, Option<Expr>) {
    match evaluate(expr, &*ctx, frame) {
        Evaluation::Resolved(Value::Abs(n)) if (0..=MAX_LENGTH).contains(&n) => (AttrSlot::Known(n as u32), None),
        Evaluation::Resolved(_) => {
            ctx.report(&ResolveError::EquLength, frame.location);
            (AttrSlot::Known(implicit), None)
        }
        Evaluation::ErrorFallback(_, e) => {
            ctx.report(&e, frame.location);
            (AttrSlot::Known(implicit), None)
        }
        Evaluation::Blocked(_) => (AttrSlot::Pending, Some(expr.clone())),
    }
}

/// Explicit type operand; it must be absolute and known when the EQU is
/// processed.
fn explicit_type(ctx: &mut OrdinaryContext, expr: &Expr, frame: &EvalFrame) -> u8 {
    match evaluate(expr, &*ctx, frame) {
        Evaluation::Resolved(Value::Abs(n)) if (0..=MAX_TYPE).contains(&n) => n as u8,
        _ => {
            ctx.report(&ResolveError::EquType, frame.location);
            ebcdic::from_ascii('U')
        }
    }
}

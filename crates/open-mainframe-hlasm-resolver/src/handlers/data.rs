//! DC and DS: reserve storage for each operand and define the label with
//! the attributes of the first operand.
//!
//! Duplication factors and length modifiers that cannot be evaluated yet
//! become spaces; the label's length, scale and integer attributes become
//! pending resolutions of their own.

use crate::context::OrdinaryContext;
use crate::data_def::{DataOperand, DataType, LengthModifier};
use crate::dependency::{Evaluation, LengthRule, Resolvable, Target};
use crate::diagnostic::ResolveError;
use crate::ebcdic;
use crate::expr::{evaluate_absolute, AttrKind, AttrOperand, BinOp, EvalFrame, Expr};
use crate::ids::Id;
use crate::parser::Statement;
use crate::space::{Alignment, SpaceKind};
use crate::symbol::{AttrSlot, SymbolAttributes, SymbolOrigin, SymbolValue};

use super::{align, frame_for};

/// A duplication factor or length, known or still an expression.
#[derive(Debug, Clone)]
enum Part {
    Known(i32),
    Deferred(Expr),
}

impl Part {
    fn into_expr(self) -> Expr {
        match self {
            Part::Known(n) => Expr::Num(n),
            Part::Deferred(e) => e,
        }
    }
}

pub(crate) fn process(ctx: &mut OrdinaryContext, st: &Statement, storage_only: bool, operands: &[DataOperand]) {
    for (i, op) in operands.iter().enumerate() {
        let label = if i == 0 { st.label } else { None };
        process_operand(ctx, st, label, storage_only, op);
    }
}

fn process_operand(ctx: &mut OrdinaryContext, st: &Statement, label: Option<Id>, storage_only: bool, op: &DataOperand) {
    let data_type = op.data_type;
    let explicit = op.length.is_some();
    if !explicit {
        align(ctx, data_type.alignment(), &EvalFrame::new(st.label, st.location));
    }

    let exprs = [
        op.duplication.as_ref(),
        op.length.as_ref().map(|l| &l.expr),
        op.scale.as_ref(),
        op.exponent.as_ref(),
    ];
    let frame = frame_for(ctx, st, exprs.into_iter().flatten());
    let bounds = data_type.length_bounds(storage_only);

    let length = match &op.length {
        None => Part::Known(op.implicit_length() as i32),
        Some(modifier) => length_modifier(ctx, modifier, data_type, bounds, op.implicit_length(), &frame),
    };
    let duplication = match &op.duplication {
        None => Part::Known(1),
        Some(expr) => match evaluate_absolute(expr, &*ctx, &frame) {
            Evaluation::Resolved(n) => Part::Known(n.max(0)),
            Evaluation::ErrorFallback(_, e) => {
                ctx.report(&e, frame.location);
                Part::Known(1)
            }
            Evaluation::Blocked(_) => Part::Deferred(expr.clone()),
        },
    };

    let tracked = match label {
        Some(label) => define_label(ctx, label, op, &length, bounds, &frame),
        None => false,
    };
    if let (Part::Deferred(expr), false) = (&length, tracked) {
        let (min, max) = bounds;
        ctx.resolve_or_defer(
            Target::Check,
            Resolvable::LengthCheck {
                expr: expr.clone(),
                type_code: data_type.code(),
                min,
                max,
            },
            frame.clone(),
        );
    }

    let count = op.value_count() as i32;
    if let (Part::Known(dup), Part::Known(len)) = (&duplication, &length) {
        let unit = if explicit {
            count.wrapping_mul(*len)
        } else {
            op.implicit_total() as i32
        };
        ctx.layout.reserve(dup.wrapping_mul(unit));
        return;
    }

    let unit = match length {
        Part::Known(_) if !explicit => Expr::Num(op.implicit_total() as i32),
        Part::Known(len) => Expr::Num(count.wrapping_mul(len)),
        Part::Deferred(expr) => {
            let per_value = match label.filter(|_| tracked) {
                Some(id) => Expr::Attribute(AttrKind::Length, AttrOperand::Symbol(id)),
                None => expr,
            };
            times(Expr::Num(count), per_value)
        }
    };
    let total = times(duplication.into_expr(), unit);
    let guarantee = if explicit { Alignment::NONE } else { data_type.alignment() };
    let sp = ctx.layout.append_space(SpaceKind::Ordinary, guarantee);
    tracing::debug!(space = sp.index(), type_code = %data_type.code(), "storage length deferred");
    ctx.resolve_or_defer(Target::Space(sp), Resolvable::SpaceLength(total), frame);
}

fn times(left: Expr, right: Expr) -> Expr {
    match (left, right) {
        (Expr::Num(1), e) | (e, Expr::Num(1)) => e,
        (l, r) => Expr::binary(BinOp::Mul, l, r),
    }
}

fn length_error(data_type: DataType, (min, max): (i32, i32)) -> ResolveError {
    ResolveError::LengthModifier {
        type_code: data_type.code(),
        min,
        max,
    }
}

/// Explicit length in bytes; a bit length is rounded up to whole bytes.
fn length_modifier(
    ctx: &mut OrdinaryContext,
    modifier: &LengthModifier,
    data_type: DataType,
    bounds: (i32, i32),
    implicit: u32,
    frame: &EvalFrame,
) -> Part {
    let bytes = if modifier.bits {
        Expr::binary(
            BinOp::Div,
            Expr::binary(BinOp::Add, modifier.expr.clone(), Expr::Num(7)),
            Expr::Num(8),
        )
    } else {
        modifier.expr.clone()
    };
    match evaluate_absolute(&bytes, &*ctx, frame) {
        Evaluation::Resolved(n) if (bounds.0..=bounds.1).contains(&n) => Part::Known(n),
        Evaluation::Resolved(_) => {
            ctx.report(&length_error(data_type, bounds), frame.location);
            Part::Known(implicit as i32)
        }
        Evaluation::ErrorFallback(_, e) => {
            ctx.report(&e, frame.location);
            Part::Known(implicit as i32)
        }
        Evaluation::Blocked(_) => Part::Deferred(bytes),
    }
}

/// Define the label of the first operand. Returns whether the symbol was
/// created, so that its length attribute tracks a deferred length.
fn define_label(
    ctx: &mut OrdinaryContext,
    label: Id,
    op: &DataOperand,
    length: &Part,
    bounds: (i32, i32),
    frame: &EvalFrame,
) -> bool {
    let data_type = op.data_type;
    let position = ctx.layout.current_address();

    let length_slot = match length {
        Part::Known(n) => AttrSlot::Known(*n as u32),
        Part::Deferred(_) => AttrSlot::Pending,
    };
    let (scale_slot, scale_expr) = match (&op.scale, data_type.has_scale()) {
        (_, false) => (AttrSlot::Known(0), None),
        (None, true) => (AttrSlot::Known(op.implicit_scale()), None),
        (Some(expr), true) => match evaluate_absolute(expr, &*ctx, frame) {
            Evaluation::Resolved(n) => (AttrSlot::Known(n), None),
            Evaluation::ErrorFallback(_, e) => {
                ctx.report(&e, frame.location);
                (AttrSlot::Known(0), None)
            }
            Evaluation::Blocked(_) => (AttrSlot::Pending, Some(expr.clone())),
        },
    };
    let integer_slot = match (data_type.has_scale(), length_slot, scale_slot) {
        (false, _, _) => AttrSlot::Known(0),
        (true, AttrSlot::Known(l), AttrSlot::Known(s)) => AttrSlot::Known(data_type.integer_attribute(l, s)),
        _ => AttrSlot::Pending,
    };

    let attributes = SymbolAttributes {
        origin: SymbolOrigin::Data,
        type_attr: ebcdic::from_ascii(data_type.type_attr(op.length.is_some())),
        length: length_slot,
        scale: scale_slot,
        integer: integer_slot,
    };
    if !ctx.create_symbol(label, SymbolValue::Relocatable(position), attributes, frame.location) {
        return false;
    }

    if let Part::Deferred(expr) = length {
        let (min, max) = bounds;
        ctx.resolve_or_defer(
            Target::SymbolAttribute(label, AttrKind::Length),
            Resolvable::Length {
                expr: expr.clone(),
                rule: LengthRule {
                    min,
                    max,
                    fallback: op.implicit_length(),
                    error: length_error(data_type, bounds),
                },
            },
            frame.clone(),
        );
    }
    if let Some(expr) = scale_expr {
        ctx.resolve_or_defer(
            Target::SymbolAttribute(label, AttrKind::Scale),
            Resolvable::Scale(expr),
            frame.clone(),
        );
    }
    if integer_slot == AttrSlot::Pending {
        ctx.resolve_or_defer(
            Target::SymbolAttribute(label, AttrKind::Integer),
            Resolvable::Integer { symbol: label, data_type },
            frame.clone(),
        );
    }
    true
}

//! ORG: move the current location counter.
//!
//! `ORG target,boundary,offset` moves to `target` rounded up to `boundary`
//! plus `offset`; `ORG` without a target moves to the highest location the
//! counter has reached. A target that is not known yet becomes a jump space
//! resolved later, together with a check that the move does not fall below
//! the start of the location counter.

use crate::address::{Address, Value};
use crate::context::{OrdinaryContext, Outcome};
use crate::dependency::{Evaluation, Prerequisite, Resolvable, Target};
use crate::diagnostic::ResolveError;
use crate::expr::{evaluate, evaluate_absolute, EvalFrame, Expr};
use crate::parser::{OrgOperands, Statement};
use crate::section::{highest, LoctrId};
use crate::space::{Alignment, SpaceArena, SpaceKind, SpaceResolution};
use crate::symbol::{SymbolAttributes, SymbolOrigin, SymbolValue};

use super::frame_for;

pub(crate) fn process(ctx: &mut OrdinaryContext, st: &Statement, operands: &OrgOperands) {
    let before = ctx.layout.current_address();
    if let Some(label) = st.label {
        ctx.create_symbol(
            label,
            SymbolValue::Relocatable(before),
            SymbolAttributes::labelled(SymbolOrigin::Org, 'U', 1),
            st.location,
        );
    }

    match operands {
        OrgOperands::Empty => org_highest(ctx, st),
        OrgOperands::Target {
            target,
            boundary,
            offset,
        } => {
            let frame = frame_for(ctx, st, [target, boundary, offset].into_iter().flatten());
            let Some(target) = target else {
                ctx.report(&ResolveError::OrgNotRelocatable, st.location);
                return;
            };
            let Some(boundary) = boundary_operand(ctx, boundary.as_ref(), &frame) else {
                ctx.report(&ResolveError::OrgBoundary, st.location);
                return;
            };
            let Some(offset) = offset_operand(ctx, offset.as_ref(), &frame) else {
                ctx.report(&ResolveError::OrgOperandFormat, st.location);
                return;
            };
            org_target(ctx, target, boundary, offset, frame);
        }
    }
}

/// Power of two from 2 to 4096, or 1 when omitted.
fn boundary_operand(ctx: &OrdinaryContext, expr: Option<&Expr>, frame: &EvalFrame) -> Option<u32> {
    let Some(expr) = expr else {
        return Some(1);
    };
    match evaluate_absolute(expr, ctx, frame) {
        Evaluation::Resolved(n) if (2..=4096).contains(&n) && (n as u32).is_power_of_two() => Some(n as u32),
        _ => None,
    }
}

fn offset_operand(ctx: &OrdinaryContext, expr: Option<&Expr>, frame: &EvalFrame) -> Option<i32> {
    let Some(expr) = expr else {
        return Some(0);
    };
    match evaluate_absolute(expr, ctx, frame) {
        Evaluation::Resolved(n) => Some(n),
        _ => None,
    }
}

fn org_highest(ctx: &mut OrdinaryContext, st: &Statement) {
    let candidates = ctx.layout.high_water_candidates();
    match highest(&candidates, ctx.layout.spaces()) {
        Ok(max) => ctx.layout.set_position(max),
        Err(_) => {
            let position = ctx.layout.current_address();
            let sp = ctx.layout.jump_space(SpaceKind::OrgMax);
            tracing::debug!(space = sp.index(), "ORG to highest location deferred");
            ctx.resolve_or_defer(
                Target::Space(sp),
                Resolvable::OrgMax { candidates, position },
                EvalFrame::new(st.label, st.location),
            );
        }
    }
}

fn org_target(ctx: &mut OrdinaryContext, target: &Expr, boundary: u32, offset: i32, frame: EvalFrame) {
    let location = frame.location;
    let evaluated = evaluate(target, &*ctx, &frame);
    let resolved = match evaluated {
        Evaluation::Resolved(Value::Abs(_)) => {
            ctx.report(&ResolveError::OrgNotRelocatable, location);
            return;
        }
        Evaluation::ErrorFallback(_, e) => {
            ctx.report(&e, location);
            return;
        }
        Evaluation::Resolved(Value::Reloc(a)) => {
            let position = ctx.layout.current_address();
            let loctr = ctx.layout.current_loctr();
            if a.bases() != position.bases() || !within_loctr(&a, loctr, ctx.layout.spaces()) {
                ctx.report(&ResolveError::OutsideSection, location);
                return;
            }
            aligned(&a, boundary, ctx.layout.spaces()).ok()
        }
        Evaluation::Blocked(_) => None,
    };

    let origin = ctx.layout.origin();
    match resolved {
        Some(aligned) => {
            let new = aligned.with_offset(offset);
            let diff = (new.clone() - origin.clone()).normalized(ctx.layout.spaces());
            if diff.spaces().is_empty() {
                if diff.offset() < 0 {
                    ctx.report(&ResolveError::OutsideSection, location);
                    return;
                }
            } else {
                register_underflow_check(ctx, target, origin, boundary, offset, frame);
            }
            ctx.layout.set_position(new);
        }
        None => {
            let position = ctx.layout.current_address();
            let sp = ctx.layout.jump_space(SpaceKind::OrgJump);
            tracing::debug!(space = sp.index(), "ORG target deferred");
            ctx.resolve_or_defer(
                Target::Space(sp),
                Resolvable::OrgTarget {
                    target: target.clone(),
                    position,
                    boundary,
                    offset,
                },
                frame.clone(),
            );
            register_underflow_check(ctx, target, origin, boundary, offset, frame);
        }
    }
}

fn register_underflow_check(
    ctx: &mut OrdinaryContext,
    target: &Expr,
    origin: Address,
    boundary: u32,
    offset: i32,
    frame: EvalFrame,
) {
    ctx.resolve_or_defer(
        Target::Check,
        Resolvable::UnderflowCheck {
            target: target.clone(),
            origin,
            boundary,
            offset,
        },
        frame,
    );
}

/// Whether every space `address` still depends on lies in `loctr`; an
/// address past a space of another location counter is outside it.
fn within_loctr(address: &Address, loctr: Option<LoctrId>, spaces: &SpaceArena) -> bool {
    let Some(loctr) = loctr else {
        return true;
    };
    address
        .normalized(spaces)
        .spaces()
        .iter()
        .all(|&(s, _)| spaces.get(s).map_or(true, |sp| sp.loctr == loctr))
}

/// `address` rounded up to `boundary`; rounding needs every space in it
/// resolved.
fn aligned(address: &Address, boundary: u32, spaces: &SpaceArena) -> Result<Address, Vec<Prerequisite>> {
    let a = address.normalized(spaces);
    if boundary <= 1 {
        return Ok(a);
    }
    if !a.spaces().is_empty() {
        return Err(a.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect());
    }
    let pad = Alignment::new(boundary).padding(i64::from(a.offset()));
    Ok(a.with_offset(pad))
}

/// Length of the jump space `own` standing for an ORG to `target`.
pub(crate) fn resolve_target(
    ctx: &OrdinaryContext,
    own: Target,
    target: &Expr,
    position: &Address,
    boundary: u32,
    offset: i32,
    frame: &EvalFrame,
) -> Evaluation<Outcome> {
    let zero = || Outcome::Space(SpaceResolution::constant(0));
    let spaces = ctx.layout.spaces();
    let a = match evaluate(target, ctx, frame) {
        Evaluation::Resolved(Value::Reloc(a)) => a,
        Evaluation::Resolved(Value::Abs(_)) => {
            return Evaluation::ErrorFallback(zero(), ResolveError::OrgNotRelocatable);
        }
        Evaluation::ErrorFallback(_, e) => return Evaluation::ErrorFallback(zero(), e),
        Evaluation::Blocked(p) => return Evaluation::Blocked(p),
    };
    let loctr = match own {
        Target::Space(sp) => spaces.get(sp).map(|s| s.loctr),
        _ => None,
    };
    if a.bases() != position.bases() || !within_loctr(&a, loctr, spaces) {
        return Evaluation::ErrorFallback(zero(), ResolveError::OutsideSection);
    }
    let a = a.normalized(spaces);
    if let Target::Space(sp) = own {
        if a.spaces().iter().any(|&(s, _)| s == sp) {
            return Evaluation::Blocked(vec![Prerequisite::Space(sp)]);
        }
    }
    let new = match aligned(&a, boundary, spaces) {
        Ok(new) => new.with_offset(offset),
        Err(blocked) => return Evaluation::Blocked(blocked),
    };
    let diff = (new - position.clone()).normalized(spaces);
    Evaluation::Resolved(Outcome::Space(SpaceResolution {
        length: diff.offset(),
        spaces: diff.spaces().to_vec(),
    }))
}

/// Whether an ORG to `target` stays at or above `origin`.
pub(crate) fn check_underflow(
    ctx: &OrdinaryContext,
    target: &Expr,
    origin: &Address,
    boundary: u32,
    offset: i32,
    frame: &EvalFrame,
) -> Evaluation<Outcome> {
    let spaces = ctx.layout.spaces();
    let a = match evaluate(target, ctx, frame) {
        Evaluation::Resolved(Value::Reloc(a)) if a.bases() == origin.bases() => a,
        Evaluation::Blocked(p) => return Evaluation::Blocked(p),
        // reported by the ORG itself
        _ => return Evaluation::Resolved(Outcome::Nothing),
    };
    let new = match aligned(&a, boundary, spaces) {
        Ok(new) => new.with_offset(offset),
        Err(blocked) => return Evaluation::Blocked(blocked),
    };
    let diff = (new - origin.clone()).normalized(spaces);
    if !diff.spaces().is_empty() {
        return Evaluation::Blocked(diff.spaces().iter().map(|&(s, _)| Prerequisite::Space(s)).collect());
    }
    if diff.offset() < 0 {
        Evaluation::ErrorFallback(Outcome::Nothing, ResolveError::OutsideSection)
    } else {
        Evaluation::Resolved(Outcome::Nothing)
    }
}

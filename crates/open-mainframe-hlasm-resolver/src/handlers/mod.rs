//! Statement handlers.
//!
//! Each handler applies one kind of statement to the ordinary context:
//! defining its label, moving the location counter and registering the
//! resolutions it cannot complete yet.

pub(crate) mod data;
pub(crate) mod equ;
pub(crate) mod machine;
pub(crate) mod org;
pub(crate) mod section;

use crate::context::OrdinaryContext;
use crate::dependency::{Resolvable, Target};
use crate::expr::{EvalFrame, Expr};
use crate::parser::{Statement, StatementKind};
use crate::section::AlignStep;
use crate::space::Alignment;

pub(crate) fn process(ctx: &mut OrdinaryContext, st: &Statement) {
    match &st.kind {
        StatementKind::Equ {
            value,
            length,
            type_attr,
        } => equ::process(ctx, st, value.as_ref(), length.as_ref(), type_attr.as_ref()),
        StatementKind::Data { storage_only, operands } => data::process(ctx, st, *storage_only, operands),
        StatementKind::Org(operands) => org::process(ctx, st, operands),
        StatementKind::Section(kind) => section::process_section(ctx, st, *kind),
        StatementKind::Loctr => section::process_loctr(ctx, st),
        StatementKind::Instruction => machine::process(ctx, st),
        StatementKind::Other => {}
    }
}

/// Frame for evaluating the operands of `st`; `*` is captured only when one
/// of `exprs` refers to it.
pub(crate) fn frame_for<'a>(
    ctx: &mut OrdinaryContext,
    st: &Statement,
    exprs: impl IntoIterator<Item = &'a Expr>,
) -> EvalFrame {
    let frame = EvalFrame::new(st.label, st.location);
    if exprs.into_iter().any(Expr::uses_location_counter) {
        frame.with_location_counter(ctx.layout.current_address())
    } else {
        frame
    }
}

/// Align the current location counter, deferring the padding when it
/// depends on spaces not resolved yet.
pub(crate) fn align(ctx: &mut OrdinaryContext, alignment: Alignment, frame: &EvalFrame) {
    if let AlignStep::Deferred {
        space,
        position,
        reference,
        alignment,
    } = ctx.layout.align(alignment)
    {
        ctx.resolve_or_defer(
            Target::Space(space),
            Resolvable::AlignPad {
                position,
                reference,
                alignment,
            },
            frame.clone(),
        );
    }
}

//! Machine instructions: halfword-aligned, labelled with type `I`.

use crate::context::OrdinaryContext;
use crate::expr::EvalFrame;
use crate::instruction::InsnDef;
use crate::parser::Statement;
use crate::space::Alignment;
use crate::symbol::{SymbolAttributes, SymbolOrigin, SymbolValue};

use super::align;

/// Reserve the instruction's bytes. Opcodes outside the catalog are macro
/// calls (or unknown) and leave the location counter alone.
pub(crate) fn process(ctx: &mut OrdinaryContext, st: &Statement) {
    let Some(length) = ctx.instructions.lookup(ctx.ids.name(st.opcode)).map(InsnDef::length) else {
        tracing::debug!(opcode = ctx.ids.name(st.opcode), "not a machine instruction");
        return;
    };
    align(ctx, Alignment::HALFWORD, &EvalFrame::new(st.label, st.location));
    if let Some(label) = st.label {
        let address = ctx.layout.current_address();
        ctx.create_symbol(
            label,
            SymbolValue::Relocatable(address),
            SymbolAttributes::labelled(SymbolOrigin::Machine, 'I', length),
            st.location,
        );
    }
    ctx.layout.reserve(length as i32);
}

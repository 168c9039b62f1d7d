//! Section directives (CSECT, DSECT, RSECT, COM) and LOCTR.

use crate::context::OrdinaryContext;
use crate::diagnostic::ResolveError;
use crate::parser::Statement;
use crate::section::SectionKind;
use crate::symbol::{SymbolAttributes, SymbolOrigin, SymbolValue};

/// Start or resume a section. An unnamed section is the private section of
/// its kind.
pub(crate) fn process_section(ctx: &mut OrdinaryContext, st: &Statement, kind: SectionKind) {
    let Some(name) = st.label else {
        match ctx.layout.private_section(kind) {
            Some(sid) => ctx.layout.switch_section(sid),
            None => {
                ctx.layout.create_section(None, kind);
            }
        }
        return;
    };

    if let Some(sid) = ctx.layout.find_section(name) {
        let existing = ctx.layout.section(sid).map(|s| s.kind);
        if existing == Some(kind) {
            ctx.layout.switch_section(sid);
        } else {
            ctx.report(&ResolveError::Redefinition { what: "section" }, st.location);
        }
        return;
    }
    if ctx.symbols.contains(name) {
        ctx.report(&ResolveError::Redefinition { what: "section" }, st.location);
        return;
    }

    let sid = ctx.layout.create_section(Some(name), kind);
    tracing::debug!(section = ctx.ids.name(name), kind = kind.directive(), "section started");
    if let Some(start) = ctx.layout.section(sid).map(|s| s.start()) {
        ctx.create_symbol(
            name,
            SymbolValue::Relocatable(start),
            SymbolAttributes::labelled(SymbolOrigin::Section, 'J', 1),
            st.location,
        );
    }
}

/// Switch to a named location counter, creating it in the current section
/// when it is new.
pub(crate) fn process_loctr(ctx: &mut OrdinaryContext, st: &Statement) {
    let Some(name) = st.label else {
        ctx.report(&ResolveError::UnableToEvaluate, st.location);
        return;
    };

    if let Some(lid) = ctx.layout.find_loctr(name) {
        ctx.layout.switch_loctr(lid);
        return;
    }
    if ctx.symbols.contains(name) {
        ctx.report(&ResolveError::Redefinition { what: "location counter" }, st.location);
        return;
    }

    ctx.layout.create_loctr(name);
    let origin = ctx.layout.origin();
    tracing::debug!(loctr = ctx.ids.name(name), "location counter created");
    ctx.create_symbol(
        name,
        SymbolValue::Relocatable(origin),
        SymbolAttributes::labelled(SymbolOrigin::Loctr, 'J', 1),
        st.location,
    );
}

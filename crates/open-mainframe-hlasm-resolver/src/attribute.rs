//! Data attribute lookup for ordinary symbols, variable symbols and
//! operation codes.
//!
//! Attribute values are EBCDIC-coded for `T'` and `O'`, numeric otherwise.
//! Before the end of the source a reference to an unknown symbol is blocked;
//! once processing has finished it takes the documented default.

use std::collections::HashMap;

use crate::dependency::{Evaluation, Prerequisite};
use crate::diagnostic::ResolveError;
use crate::directives::Directive;
use crate::ebcdic;
use crate::expr::{AttrKind, AttrOperand, EvalFrame};
use crate::ids::{Id, IdStorage};
use crate::instruction::InsnCatalog;
use crate::symbol::{AttrSlot, SymbolTable};

/// Value of a SET symbol or macro parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VariableValue {
    Arithmetic(i32),
    Boolean(bool),
    Character(String),
    /// Sublist of a macro parameter.
    List(Vec<String>),
    /// Declared but never assigned.
    #[default]
    Unset,
}

/// Where a macro definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroOrigin {
    /// Defined in the source being analyzed.
    Local,
    /// Found in a macro library.
    Library,
}

fn letter(c: char) -> i32 {
    i32::from(ebcdic::from_ascii(c))
}

/// Everything attribute references are answered from.
pub struct AttributeSource<'a> {
    pub ids: &'a IdStorage,
    pub symbols: &'a SymbolTable,
    pub variables: &'a HashMap<Id, VariableValue>,
    pub macros: &'a HashMap<Id, MacroOrigin>,
    pub instructions: &'a InsnCatalog,
    /// All statements have been processed.
    pub finished: bool,
}

impl AttributeSource<'_> {
    pub fn attribute(&self, kind: AttrKind, operand: &AttrOperand, frame: &EvalFrame) -> Evaluation<i32> {
        match (kind, *operand) {
            (AttrKind::Opcode, AttrOperand::Symbol(id)) => self.opcode(id),
            (_, AttrOperand::Symbol(id)) => self.ordinary(kind, id, frame),
            (_, AttrOperand::Variable(id)) => self.variable(kind, id),
        }
    }

    fn blocked_or(&self, id: Id, kind: AttrKind, default: i32) -> Evaluation<i32> {
        if self.finished {
            Evaluation::Resolved(default)
        } else {
            Evaluation::Blocked(vec![Prerequisite::Attribute(id, kind)])
        }
    }

    fn ordinary(&self, kind: AttrKind, id: Id, frame: &EvalFrame) -> Evaluation<i32> {
        let Some(sym) = self.symbols.get(id) else {
            return match kind {
                AttrKind::Length => self.blocked_or(id, kind, 1),
                AttrKind::Type => self.blocked_or(id, kind, letter('U')),
                AttrKind::Scale | AttrKind::Integer => self.blocked_or(id, kind, 0),
                AttrKind::Defined => Evaluation::Resolved(0),
                _ => Evaluation::ErrorFallback(0, ResolveError::AttributeMisuse),
            };
        };
        let attrs = &sym.attributes;
        match kind {
            AttrKind::Type if frame.label == Some(id) && !sym.is_defined() => Evaluation::Resolved(letter('M')),
            AttrKind::Type => Evaluation::Resolved(i32::from(attrs.type_attr)),
            AttrKind::Length => match attrs.length {
                AttrSlot::Known(l) => Evaluation::Resolved(l as i32),
                AttrSlot::Pending => self.blocked_or(id, kind, 1),
                AttrSlot::Absent => Evaluation::Resolved(1),
            },
            AttrKind::Scale | AttrKind::Integer => {
                let slot = if kind == AttrKind::Scale { attrs.scale } else { attrs.integer };
                match slot {
                    AttrSlot::Known(v) => Evaluation::Resolved(v),
                    AttrSlot::Pending => self.blocked_or(id, kind, 0),
                    AttrSlot::Absent => Evaluation::ErrorFallback(0, ResolveError::AttributeMisuse),
                }
            }
            AttrKind::Defined if sym.is_defined() => Evaluation::Resolved(1),
            AttrKind::Defined if self.finished => Evaluation::Resolved(0),
            AttrKind::Defined => Evaluation::Blocked(vec![Prerequisite::Symbol(id)]),
            AttrKind::Count | AttrKind::Number | AttrKind::Opcode => {
                Evaluation::ErrorFallback(0, ResolveError::AttributeMisuse)
            }
        }
    }

    fn variable(&self, kind: AttrKind, id: Id) -> Evaluation<i32> {
        let Some(value) = self.variables.get(&id) else {
            return Evaluation::ErrorFallback(
                0,
                ResolveError::UnresolvedReference {
                    kind: "variable symbol",
                    name: self.ids.name(id).to_string(),
                },
            );
        };
        match kind {
            AttrKind::Count => {
                let count = match value {
                    VariableValue::Arithmetic(n) => n.to_string().chars().count(),
                    VariableValue::Boolean(_) => 1,
                    VariableValue::Character(s) => s.chars().count(),
                    VariableValue::List(items) => items.join(",").chars().count() + 2,
                    VariableValue::Unset => 0,
                };
                Evaluation::Resolved(count as i32)
            }
            AttrKind::Number => Evaluation::Resolved(match value {
                VariableValue::Unset => 0,
                VariableValue::List(items) => items.len() as i32,
                _ => 1,
            }),
            AttrKind::Type => Evaluation::Resolved(letter(match value {
                VariableValue::Arithmetic(_) | VariableValue::Boolean(_) => 'N',
                VariableValue::Character(_) | VariableValue::List(_) => 'U',
                VariableValue::Unset => 'O',
            })),
            _ => Evaluation::ErrorFallback(0, ResolveError::AttributeMisuse),
        }
    }

    /// `O'`: macros shadow assembler and machine instructions.
    fn opcode(&self, id: Id) -> Evaluation<i32> {
        if let Some(origin) = self.macros.get(&id) {
            return Evaluation::Resolved(letter(match origin {
                MacroOrigin::Local => 'M',
                MacroOrigin::Library => 'S',
            }));
        }
        let name = self.ids.name(id);
        if Directive::from_opcode(name).is_some() {
            return Evaluation::Resolved(letter('A'));
        }
        match self.instructions.lookup(name) {
            Some(def) => Evaluation::Resolved(letter(def.opcode_class())),
            None => self.blocked_or(id, AttrKind::Opcode, letter('U')),
        }
    }
}

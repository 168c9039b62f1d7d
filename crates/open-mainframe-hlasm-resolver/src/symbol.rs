//! Ordinary symbol table.
//!
//! - A symbol is created once, when its defining statement is processed
//! - Its value may stay undefined until dependencies resolve, then is fixed
//! - Length, scale and integer attributes can be pending independently
//! - The type attribute is always known at creation

use std::collections::HashMap;

use crate::address::{Address, Value};
use crate::diagnostic::{Location, ResolveError};
use crate::ebcdic;
use crate::ids::Id;

// ---------------------------------------------------------------------------
//  Values and attributes
// ---------------------------------------------------------------------------

/// Value of an ordinary symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SymbolValue {
    /// Created but not yet resolved.
    #[default]
    Undefined,
    Absolute(i32),
    Relocatable(Address),
}

impl SymbolValue {
    pub fn is_defined(&self) -> bool {
        !matches!(self, SymbolValue::Undefined)
    }

    pub fn as_value(&self) -> Option<Value> {
        match self {
            SymbolValue::Undefined => None,
            SymbolValue::Absolute(n) => Some(Value::Abs(*n)),
            SymbolValue::Relocatable(a) => Some(Value::Reloc(a.clone())),
        }
    }
}

impl From<Value> for SymbolValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Abs(n) => SymbolValue::Absolute(n),
            Value::Reloc(a) => SymbolValue::Relocatable(a),
        }
    }
}

/// One attribute slot of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrSlot<T> {
    Known(T),
    /// Waiting on a deferred expression.
    Pending,
    /// The symbol kind does not carry this attribute.
    Absent,
}

impl<T: Copy> AttrSlot<T> {
    pub fn known(&self) -> Option<T> {
        match self {
            AttrSlot::Known(v) => Some(*v),
            _ => None,
        }
    }
}

/// Statement that created a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOrigin {
    Equ,
    Data,
    Section,
    Loctr,
    Machine,
    Org,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAttributes {
    pub origin: SymbolOrigin,
    /// EBCDIC code of the type letter.
    pub type_attr: u8,
    pub length: AttrSlot<u32>,
    pub scale: AttrSlot<i32>,
    pub integer: AttrSlot<i32>,
}

impl SymbolAttributes {
    /// Attributes of a label on a location: known length and type, no scale
    /// or integer attribute.
    pub fn labelled(origin: SymbolOrigin, type_letter: char, length: u32) -> Self {
        Self {
            origin,
            type_attr: ebcdic::from_ascii(type_letter),
            length: AttrSlot::Known(length),
            scale: AttrSlot::Absent,
            integer: AttrSlot::Absent,
        }
    }

    /// Type attribute as an ASCII letter, when printable.
    pub fn type_letter(&self) -> Option<char> {
        ebcdic::to_ascii(self.type_attr)
    }
}

/// A symbol table entry.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: Id,
    value: SymbolValue,
    pub attributes: SymbolAttributes,
    /// Statement that defined the symbol.
    pub location: Location,
}

impl Symbol {
    pub fn value(&self) -> &SymbolValue {
        &self.value
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_defined()
    }
}

// ---------------------------------------------------------------------------
//  Symbol table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<Id, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a symbol; a name may be created only once.
    pub fn create(
        &mut self,
        id: Id,
        value: SymbolValue,
        attributes: SymbolAttributes,
        location: Location,
    ) -> Result<(), ResolveError> {
        if self.symbols.contains_key(&id) {
            return Err(ResolveError::Redefinition { what: "symbol" });
        }
        self.symbols.insert(
            id,
            Symbol {
                id,
                value,
                attributes,
                location,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: Id) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.symbols.contains_key(&id)
    }

    /// Fix the value of an undefined symbol. A defined value is never
    /// overwritten.
    pub fn set_value(&mut self, id: Id, value: SymbolValue) -> bool {
        match self.symbols.get_mut(&id) {
            Some(sym) if !sym.value.is_defined() => {
                sym.value = value;
                true
            }
            _ => false,
        }
    }

    pub fn set_length(&mut self, id: Id, length: u32) -> bool {
        match self.symbols.get_mut(&id) {
            Some(sym) if sym.attributes.length == AttrSlot::Pending => {
                sym.attributes.length = AttrSlot::Known(length);
                true
            }
            _ => false,
        }
    }

    pub fn set_scale(&mut self, id: Id, scale: i32) -> bool {
        match self.symbols.get_mut(&id) {
            Some(sym) if sym.attributes.scale == AttrSlot::Pending => {
                sym.attributes.scale = AttrSlot::Known(scale);
                true
            }
            _ => false,
        }
    }

    pub fn set_integer(&mut self, id: Id, integer: i32) -> bool {
        match self.symbols.get_mut(&id) {
            Some(sym) if sym.attributes.integer == AttrSlot::Pending => {
                sym.attributes.integer = AttrSlot::Known(integer);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdStorage;

    fn equ_attrs() -> SymbolAttributes {
        SymbolAttributes::labelled(SymbolOrigin::Equ, 'U', 1)
    }

    #[test]
    fn test_create_and_lookup() {
        let mut ids = IdStorage::new();
        let mut st = SymbolTable::new();
        let a = ids.add("A");
        st.create(a, SymbolValue::Absolute(10), equ_attrs(), Location::default())
            .unwrap();
        let sym = st.get(a).unwrap();
        assert_eq!(sym.value(), &SymbolValue::Absolute(10));
        assert_eq!(sym.attributes.type_letter(), Some('U'));
        assert_eq!(sym.attributes.length, AttrSlot::Known(1));
        assert!(sym.is_defined());
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut ids = IdStorage::new();
        let mut st = SymbolTable::new();
        let a = ids.add("A");
        st.create(a, SymbolValue::Absolute(1), equ_attrs(), Location::default())
            .unwrap();
        let err = st
            .create(a, SymbolValue::Absolute(2), equ_attrs(), Location::default())
            .unwrap_err();
        assert_eq!(err.code(), "E031");
        assert_eq!(st.get(a).unwrap().value(), &SymbolValue::Absolute(1));
    }

    #[test]
    fn test_value_set_once() {
        let mut ids = IdStorage::new();
        let mut st = SymbolTable::new();
        let a = ids.add("A");
        st.create(a, SymbolValue::Undefined, equ_attrs(), Location::default())
            .unwrap();
        assert!(!st.get(a).unwrap().is_defined());
        assert!(st.set_value(a, SymbolValue::Absolute(3)));
        assert!(!st.set_value(a, SymbolValue::Absolute(4)));
        assert_eq!(st.get(a).unwrap().value(), &SymbolValue::Absolute(3));
    }

    #[test]
    fn test_pending_attributes() {
        let mut ids = IdStorage::new();
        let mut st = SymbolTable::new();
        let x = ids.add("X");
        let attrs = SymbolAttributes {
            origin: SymbolOrigin::Data,
            type_attr: ebcdic::from_ascii('C'),
            length: AttrSlot::Pending,
            scale: AttrSlot::Known(0),
            integer: AttrSlot::Pending,
        };
        st.create(x, SymbolValue::Undefined, attrs, Location::default())
            .unwrap();
        assert!(st.set_length(x, 5));
        assert!(!st.set_length(x, 6));
        assert!(!st.set_scale(x, 2));
        assert!(st.set_integer(x, 0));
        let sym = st.get(x).unwrap();
        assert_eq!(sym.attributes.length.known(), Some(5));
        assert_eq!(sym.attributes.scale.known(), Some(0));
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(SymbolValue::from(Value::Abs(7)), SymbolValue::Absolute(7));
        assert_eq!(SymbolValue::Absolute(7).as_value(), Some(Value::Abs(7)));
        assert_eq!(SymbolValue::Undefined.as_value(), None);
    }
}

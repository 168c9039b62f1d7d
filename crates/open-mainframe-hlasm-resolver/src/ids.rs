//! Identifier interning.
//!
//! HLASM names (ordinary symbols, sections, location counters, variable
//! symbols, opcodes) are case-insensitive. [`IdStorage`] folds each name to
//! upper case once and hands out a small [`Id`] handle; every other table in
//! the crate is keyed by these handles.

use std::collections::HashMap;
use std::fmt;

/// An interned, upper-cased name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u32);

impl Id {
    /// Position of the name inside its [`IdStorage`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name interner for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct IdStorage {
    names: Vec<String>,
    lookup: HashMap<String, Id>,
}

impl IdStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing handle if already present.
    pub fn add(&mut self, name: &str) -> Id {
        let upper = name.to_ascii_uppercase();
        if let Some(&id) = self.lookup.get(&upper) {
            return id;
        }
        let id = Id(self.names.len() as u32);
        self.names.push(upper.clone());
        self.lookup.insert(upper, id);
        id
    }

    /// Find a name without interning it.
    pub fn find(&self, name: &str) -> Option<Id> {
        self.lookup.get(&name.to_ascii_uppercase()).copied()
    }

    /// The upper-cased spelling of `id`.
    pub fn name(&self, id: Id) -> &str {
        self.names.get(id.index()).map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

//! Symbolic addresses and the values expressions evaluate to.
//!
//! An [`Address`] is a linear combination
//!
//! ```text
//!   sum(base_i * k_i) + offset + sum(space_j * m_j)
//! ```
//!
//! where bases are section starts and spaces are reservations of unknown
//! length. Adding and subtracting addresses merges terms and cancels the
//! ones whose coefficients reach zero, so `B - A` for two labels in the same
//! section is an offset plus whatever spaces lie between them.

use std::ops::{Add, Neg, Sub};

use crate::section::SectionId;
use crate::space::{merge_term, SpaceArena, SpaceId};

/// Section-relative address with symbolic space terms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    bases: Vec<(SectionId, i32)>,
    offset: i32,
    spaces: Vec<(SpaceId, i32)>,
}

impl Address {
    /// Start of `section`.
    pub fn section_start(section: SectionId) -> Self {
        Self {
            bases: vec![(section, 1)],
            offset: 0,
            spaces: Vec::new(),
        }
    }

    /// A pure number.
    pub fn absolute(offset: i32) -> Self {
        Self {
            bases: Vec::new(),
            offset,
            spaces: Vec::new(),
        }
    }

    pub fn bases(&self) -> &[(SectionId, i32)] {
        &self.bases
    }

    /// Constant part, before substituting resolved spaces.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn spaces(&self) -> &[(SpaceId, i32)] {
        &self.spaces
    }

    /// No section bases remain.
    pub fn is_absolute(&self) -> bool {
        self.bases.is_empty()
    }

    /// Exactly one base with coefficient one, the only form a location in
    /// storage can take.
    pub fn is_simple(&self) -> bool {
        matches!(self.bases.as_slice(), [(_, 1)])
    }

    /// The single base of a simple address.
    pub fn section(&self) -> Option<SectionId> {
        match self.bases.as_slice() {
            [(s, 1)] => Some(*s),
            _ => None,
        }
    }

    pub fn with_offset(mut self, delta: i32) -> Self {
        self.offset = self.offset.wrapping_add(delta);
        self
    }

    pub fn with_space(mut self, space: SpaceId, coeff: i32) -> Self {
        merge_term(&mut self.spaces, space, coeff);
        self
    }

    /// Substitute every resolved space by its length.
    pub fn normalized(&self, arena: &SpaceArena) -> Address {
        let (constant, spaces) = arena.substitute(&self.spaces);
        Address {
            bases: self.bases.clone(),
            offset: (i64::from(self.offset) + constant) as i32,
            spaces,
        }
    }

    /// Spaces still unresolved in this address.
    pub fn unresolved_spaces(&self, arena: &SpaceArena) -> Vec<SpaceId> {
        arena.substitute(&self.spaces).1.into_iter().map(|(s, _)| s).collect()
    }

    pub fn has_unresolved_spaces(&self, arena: &SpaceArena) -> bool {
        !arena.substitute(&self.spaces).1.is_empty()
    }

    /// Known difference `self - other`, when every space between them is
    /// resolved.
    pub fn distance_from(&self, other: &Address, arena: &SpaceArena) -> Option<i32> {
        let diff = (self.clone() - other.clone()).normalized(arena);
        (diff.bases.is_empty() && diff.spaces.is_empty()).then_some(diff.offset)
    }

    fn combine(mut self, rhs: Address, sign: i32) -> Address {
        for (b, k) in rhs.bases {
            merge_term(&mut self.bases, b, k.wrapping_mul(sign));
        }
        for (s, k) in rhs.spaces {
            merge_term(&mut self.spaces, s, k.wrapping_mul(sign));
        }
        self.offset = self.offset.wrapping_add(rhs.offset.wrapping_mul(sign));
        self
    }
}

impl Add for Address {
    type Output = Address;

    fn add(self, rhs: Address) -> Address {
        self.combine(rhs, 1)
    }
}

impl Sub for Address {
    type Output = Address;

    fn sub(self, rhs: Address) -> Address {
        self.combine(rhs, -1)
    }
}

impl Neg for Address {
    type Output = Address;

    fn neg(self) -> Address {
        Address::default().combine(self, -1)
    }
}

// ---------------------------------------------------------------------------
//  Values
// ---------------------------------------------------------------------------

/// Result of evaluating a machine expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Abs(i32),
    Reloc(Address),
}

impl Value {
    pub fn into_address(self) -> Address {
        match self {
            Value::Abs(n) => Address::absolute(n),
            Value::Reloc(a) => a,
        }
    }

    pub fn as_abs(&self) -> Option<i32> {
        match self {
            Value::Abs(n) => Some(*n),
            Value::Reloc(_) => None,
        }
    }

    /// Substitute resolved spaces; a relocatable value whose bases cancelled
    /// and whose spaces are all known degrades to an absolute one.
    pub fn simplified(self, arena: &SpaceArena) -> Value {
        match self {
            Value::Abs(n) => Value::Abs(n),
            Value::Reloc(a) => {
                let a = a.normalized(arena);
                if a.bases.is_empty() && a.spaces.is_empty() {
                    Value::Abs(a.offset)
                } else {
                    Value::Reloc(a)
                }
            }
        }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Abs(a), Value::Abs(b)) => Value::Abs(a.wrapping_add(b)),
            (l, r) => Value::Reloc(l.into_address() + r.into_address()),
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Abs(a), Value::Abs(b)) => Value::Abs(a.wrapping_sub(b)),
            (l, r) => Value::Reloc(l.into_address() - r.into_address()),
        }
    }
}

impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        match self {
            Value::Abs(a) => Value::Abs(a.wrapping_neg()),
            Value::Reloc(a) => Value::Reloc(-a),
        }
    }
}

//! Spaces: stretches of a location counter whose length is not yet known.
//!
//! A `DS (X)C` with `X` undefined, padding that depends on such a
//! reservation, the start of a non-first LOCTR, or an `ORG` to an unknown
//! target all advance the location counter by a *space*. Addresses carry
//! spaces as symbolic terms (see [`crate::address::Address`]) until the
//! dependency resolver fixes their length.
//!
//! A space may resolve into a constant plus other, still unknown, spaces;
//! normalization substitutes such partial resolutions transitively. A space
//! only ever refers to spaces that were unresolved when it was resolved, so
//! the substitution chain is acyclic.

use crate::section::LoctrId;

/// Handle of a space in its [`SpaceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(u32);

impl SpaceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What created a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// Storage with a deferred length or duplication factor.
    Ordinary,
    /// Padding to a boundary after an unresolved space.
    Alignment,
    /// Start of a non-first location counter within its section.
    LoctrBegin,
    /// Repositioning to a target that is not yet known.
    OrgJump,
    /// Repositioning to the highest location reached, when not yet known.
    OrgMax,
}

/// A boundary and the residue required modulo that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub boundary: u32,
    pub byte: u32,
}

impl Alignment {
    /// No alignment requirement.
    pub const NONE: Alignment = Alignment { boundary: 1, byte: 0 };
    pub const HALFWORD: Alignment = Alignment { boundary: 2, byte: 0 };
    pub const FULLWORD: Alignment = Alignment { boundary: 4, byte: 0 };
    pub const DOUBLEWORD: Alignment = Alignment { boundary: 8, byte: 0 };

    pub fn new(boundary: u32) -> Self {
        Self { boundary: boundary.max(1), byte: 0 }
    }

    /// Bytes needed to move from `offset` to the next position satisfying
    /// this alignment.
    pub fn padding(self, offset: i64) -> i32 {
        let b = i64::from(self.boundary.max(1));
        (i64::from(self.byte) - offset).rem_euclid(b) as i32
    }

    /// Whether a position known to satisfy `self` also satisfies `wanted`.
    pub fn implies(self, wanted: Alignment) -> bool {
        wanted.boundary <= self.boundary && self.boundary % wanted.boundary == 0
    }
}

/// Final (possibly partial) length of a space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpaceResolution {
    pub length: i32,
    /// Unresolved spaces the length is still expressed in.
    pub spaces: Vec<(SpaceId, i32)>,
}

impl SpaceResolution {
    pub fn constant(length: i32) -> Self {
        Self { length, spaces: Vec::new() }
    }
}

/// A reserved stretch of a location counter.
#[derive(Debug, Clone)]
pub struct Space {
    pub id: SpaceId,
    pub kind: SpaceKind,
    pub loctr: LoctrId,
    /// Alignment guaranteed at the end of the space, relative to the origin
    /// of its location counter.
    pub guarantee: Alignment,
    resolution: Option<SpaceResolution>,
}

impl Space {
    pub fn resolution(&self) -> Option<&SpaceResolution> {
        self.resolution.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// Owner of all spaces of one analysis.
#[derive(Debug, Clone, Default)]
pub struct SpaceArena {
    spaces: Vec<Space>,
}

impl SpaceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: SpaceKind, loctr: LoctrId, guarantee: Alignment) -> SpaceId {
        let id = SpaceId(self.spaces.len() as u32);
        self.spaces.push(Space {
            id,
            kind,
            loctr,
            guarantee,
            resolution: None,
        });
        id
    }

    pub fn get(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.get(id.index())
    }

    pub fn is_resolved(&self, id: SpaceId) -> bool {
        self.get(id).is_some_and(Space::is_resolved)
    }

    pub fn resolution(&self, id: SpaceId) -> Option<&SpaceResolution> {
        self.get(id).and_then(Space::resolution)
    }

    /// Fix the length of `id`. Returns `false` if it was already resolved or
    /// the resolution refers to the space itself.
    pub fn resolve(&mut self, id: SpaceId, resolution: SpaceResolution) -> bool {
        if resolution.spaces.iter().any(|&(s, _)| s == id) {
            return false;
        }
        match self.spaces.get_mut(id.index()) {
            Some(space) if space.resolution.is_none() => {
                space.resolution = Some(resolution);
                true
            }
            _ => false,
        }
    }

    /// Spaces that are still waiting for a length.
    pub fn unresolved(&self) -> impl Iterator<Item = &Space> {
        self.spaces.iter().filter(|s| !s.is_resolved())
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Substitute resolved spaces in `terms`, returning the accumulated
    /// constant and the remaining unresolved terms.
    pub fn substitute(&self, terms: &[(SpaceId, i32)]) -> (i64, Vec<(SpaceId, i32)>) {
        let mut constant = 0i64;
        let mut remaining: Vec<(SpaceId, i32)> = Vec::new();
        let mut stack: Vec<(SpaceId, i64)> = terms.iter().map(|&(s, c)| (s, i64::from(c))).collect();
        while let Some((id, coeff)) = stack.pop() {
            if coeff == 0 {
                continue;
            }
            match self.resolution(id) {
                Some(res) => {
                    constant += coeff * i64::from(res.length);
                    stack.extend(res.spaces.iter().map(|&(s, c)| (s, coeff * i64::from(c))));
                }
                None => merge_term(&mut remaining, id, coeff as i32),
            }
        }
        remaining.sort_by_key(|&(s, _)| s);
        (constant, remaining)
    }
}

/// Add `coeff` to the entry for `key`, dropping it when it cancels to zero.
pub(crate) fn merge_term<K: PartialEq + Copy>(terms: &mut Vec<(K, i32)>, key: K, coeff: i32) {
    if coeff == 0 {
        return;
    }
    if let Some(pos) = terms.iter().position(|&(k, _)| k == key) {
        let sum = terms[pos].1.wrapping_add(coeff);
        if sum == 0 {
            terms.remove(pos);
        } else {
            terms[pos].1 = sum;
        }
    } else {
        terms.push((key, coeff));
    }
}

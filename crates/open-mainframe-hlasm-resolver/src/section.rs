//! Sections and location counters.
//!
//! Every section starts with one location counter named after it; `LOCTR`
//! adds further counters that are laid out one after another at the end of
//! the previous counter. The [`Layout`] owns the section table, all location
//! counters and the [`SpaceArena`] their positions are expressed in.

use crate::address::Address;
use crate::ids::Id;
use crate::space::{Alignment, SpaceArena, SpaceId, SpaceKind};

/// Handle of a section in its [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(u32);

impl SectionId {
    #[cfg(test)]
    pub(crate) fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a location counter in its [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoctrId(u32);

impl LoctrId {
    /// The counter created with the first section.
    pub fn first() -> Self {
        Self(0)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Section type as declared by CSECT, DSECT, RSECT or COM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Executable,
    Dummy,
    ReadOnly,
    Common,
}

impl SectionKind {
    pub fn directive(self) -> &'static str {
        match self {
            SectionKind::Executable => "CSECT",
            SectionKind::Dummy => "DSECT",
            SectionKind::ReadOnly => "RSECT",
            SectionKind::Common => "COM",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    pub id: SectionId,
    /// `None` for the private (unnamed) section.
    pub name: Option<Id>,
    pub kind: SectionKind,
    loctrs: Vec<LoctrId>,
    active: LoctrId,
}

impl Section {
    pub fn start(&self) -> Address {
        Address::section_start(self.id)
    }

    pub fn loctrs(&self) -> &[LoctrId] {
        &self.loctrs
    }
}

#[derive(Debug, Clone)]
pub struct LocationCounter {
    pub id: LoctrId,
    pub name: Option<Id>,
    pub section: SectionId,
    origin: Address,
    current: Address,
    /// Last appended space and the bytes reserved after it.
    tail: Option<(SpaceId, i32)>,
    /// Earlier positions left by ORG that may exceed the current one.
    high_water: Vec<Address>,
    begin: Option<SpaceId>,
}

impl LocationCounter {
    pub fn origin(&self) -> &Address {
        &self.origin
    }

    pub fn current(&self) -> &Address {
        &self.current
    }

    /// Space standing for the start of a non-first counter.
    pub fn begin_space(&self) -> Option<SpaceId> {
        self.begin
    }

    /// Every position that may be the highest one reached.
    pub fn high_water_candidates(&self) -> Vec<Address> {
        let mut all = self.high_water.clone();
        all.push(self.current.clone());
        all
    }
}

/// Outcome of aligning the current location counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignStep {
    /// Padding was known and reserved.
    Done,
    /// Padding depends on unresolved spaces; an alignment space was appended.
    Deferred {
        space: SpaceId,
        position: Address,
        reference: Address,
        alignment: Alignment,
    },
}

/// Request to place a non-first location counter after its predecessor.
#[derive(Debug, Clone)]
pub struct LoctrBegin {
    pub space: SpaceId,
    pub loctr: LoctrId,
    pub section_start: Address,
    /// High-water candidates of the preceding counter.
    pub candidates: Vec<Address>,
}

// ---------------------------------------------------------------------------
//  Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Layout {
    sections: Vec<Section>,
    loctrs: Vec<LocationCounter>,
    spaces: SpaceArena,
    current: Option<LoctrId>,
    loctr_alignment: Alignment,
}

impl Layout {
    pub fn new(loctr_alignment: u32) -> Self {
        Self {
            sections: Vec::new(),
            loctrs: Vec::new(),
            spaces: SpaceArena::new(),
            current: None,
            loctr_alignment: Alignment::new(loctr_alignment),
        }
    }

    pub fn spaces(&self) -> &SpaceArena {
        &self.spaces
    }

    pub fn spaces_mut(&mut self) -> &mut SpaceArena {
        &mut self.spaces
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.index())
    }

    pub fn loctr(&self, id: LoctrId) -> Option<&LocationCounter> {
        self.loctrs.get(id.index())
    }

    pub fn current_loctr(&self) -> Option<LoctrId> {
        self.current
    }

    pub fn current_section(&self) -> Option<SectionId> {
        self.current.map(|l| self.loctrs[l.index()].section)
    }

    pub fn find_section(&self, name: Id) -> Option<SectionId> {
        self.sections.iter().find(|s| s.name == Some(name)).map(|s| s.id)
    }

    pub fn private_section(&self, kind: SectionKind) -> Option<SectionId> {
        self.sections
            .iter()
            .find(|s| s.name.is_none() && s.kind == kind)
            .map(|s| s.id)
    }

    pub fn find_loctr(&self, name: Id) -> Option<LoctrId> {
        self.loctrs.iter().find(|l| l.name == Some(name)).map(|l| l.id)
    }

    /// Create a section with its first location counter and make it current.
    pub fn create_section(&mut self, name: Option<Id>, kind: SectionKind) -> SectionId {
        let id = SectionId(self.sections.len() as u32);
        let lid = LoctrId(self.loctrs.len() as u32);
        let start = Address::section_start(id);
        self.loctrs.push(LocationCounter {
            id: lid,
            name,
            section: id,
            origin: start.clone(),
            current: start,
            tail: None,
            high_water: Vec::new(),
            begin: None,
        });
        self.sections.push(Section {
            id,
            name,
            kind,
            loctrs: vec![lid],
            active: lid,
        });
        self.current = Some(lid);
        tracing::debug!(section = id.index(), kind = kind.directive(), "section created");
        id
    }

    /// Resume `id` at the location counter that was active in it last.
    pub fn switch_section(&mut self, id: SectionId) {
        if let Some(s) = self.sections.get(id.index()) {
            self.current = Some(s.active);
        }
    }

    pub fn switch_loctr(&mut self, id: LoctrId) {
        if let Some(l) = self.loctrs.get(id.index()) {
            let section = l.section;
            self.sections[section.index()].active = id;
            self.current = Some(id);
        }
    }

    /// Current location counter, opening the private section if no section
    /// has been started yet.
    pub fn ensure_section(&mut self) -> LoctrId {
        match self.current {
            Some(l) => l,
            None => {
                let sid = self.create_section(None, SectionKind::Executable);
                self.sections[sid.index()].active
            }
        }
    }

    /// Add a location counter to the current section and make it current.
    /// Its start is a space resolved once the preceding counter is complete.
    pub fn create_loctr(&mut self, name: Id) -> LoctrId {
        let prev = self.ensure_section();
        let section = self.loctrs[prev.index()].section;
        let lid = LoctrId(self.loctrs.len() as u32);
        let begin = self.spaces.create(SpaceKind::LoctrBegin, lid, self.loctr_alignment);
        let origin = Address::section_start(section).with_space(begin, 1);
        self.loctrs.push(LocationCounter {
            id: lid,
            name: Some(name),
            section,
            origin: origin.clone(),
            current: origin,
            tail: None,
            high_water: Vec::new(),
            begin: Some(begin),
        });
        let sect = &mut self.sections[section.index()];
        sect.loctrs.push(lid);
        sect.active = lid;
        self.current = Some(lid);
        lid
    }

    fn cur_mut(&mut self) -> &mut LocationCounter {
        let lid = self.ensure_section();
        &mut self.loctrs[lid.index()]
    }

    fn is_first_loctr(&self, lid: LoctrId) -> bool {
        self.loctrs[lid.index()].begin.is_none()
    }

    pub fn current_address(&mut self) -> Address {
        self.cur_mut().current.clone()
    }

    pub fn origin(&mut self) -> Address {
        self.cur_mut().origin.clone()
    }

    pub fn high_water_candidates(&mut self) -> Vec<Address> {
        self.cur_mut().high_water_candidates()
    }

    /// Advance by a known number of bytes.
    pub fn reserve(&mut self, length: i32) {
        let l = self.cur_mut();
        l.current = std::mem::take(&mut l.current).with_offset(length);
        if let Some((_, after)) = l.tail.as_mut() {
            *after = after.wrapping_add(length);
        }
    }

    /// Advance by a space of unknown length.
    pub fn append_space(&mut self, kind: SpaceKind, guarantee: Alignment) -> SpaceId {
        let lid = self.ensure_section();
        let guarantee = if self.is_first_loctr(lid) || self.loctr_alignment.implies(guarantee) {
            guarantee
        } else {
            Alignment::NONE
        };
        let sp = self.spaces.create(kind, lid, guarantee);
        let l = &mut self.loctrs[lid.index()];
        l.current = std::mem::take(&mut l.current).with_space(sp, 1);
        l.tail = Some((sp, 0));
        sp
    }

    /// Align the current location counter.
    pub fn align(&mut self, alignment: Alignment) -> AlignStep {
        if alignment.boundary <= 1 {
            return AlignStep::Done;
        }
        let lid = self.ensure_section();
        let l = &self.loctrs[lid.index()];
        let (current, tail) = (l.current.clone(), l.tail);
        let relative_to_origin = l.begin.is_none() || self.loctr_alignment.implies(alignment);
        let reference = if relative_to_origin {
            l.origin.clone()
        } else {
            Address::section_start(l.section)
        };
        let rel = (current.clone() - reference.clone()).normalized(&self.spaces);
        if rel.spaces().is_empty() {
            let pad = alignment.padding(i64::from(rel.offset()));
            self.reserve(pad);
            return AlignStep::Done;
        }
        if relative_to_origin {
            let guaranteed = tail.and_then(|(sp, after)| {
                self.spaces
                    .get(sp)
                    .filter(|s| !s.is_resolved() && s.guarantee.implies(alignment))
                    .map(|s| alignment.padding(i64::from(s.guarantee.byte) + i64::from(after)))
            });
            if let Some(pad) = guaranteed {
                self.reserve(pad);
                return AlignStep::Done;
            }
        }
        let space = self.append_space(SpaceKind::Alignment, alignment);
        AlignStep::Deferred {
            space,
            position: current,
            reference,
            alignment,
        }
    }

    fn record_high_water(&mut self, lid: LoctrId) {
        let spaces = &self.spaces;
        let l = &mut self.loctrs[lid.index()];
        let cur = l.current.clone();
        if l
            .high_water
            .iter()
            .any(|h| h.distance_from(&cur, spaces).is_some_and(|d| d >= 0))
        {
            return;
        }
        l.high_water
            .retain(|h| !cur.distance_from(h, spaces).is_some_and(|d| d >= 0));
        l.high_water.push(cur);
    }

    /// Move the current location counter to `address` (ORG).
    pub fn set_position(&mut self, address: Address) {
        let lid = self.ensure_section();
        self.record_high_water(lid);
        let l = &mut self.loctrs[lid.index()];
        l.current = address;
        l.tail = None;
    }

    /// Move by a space standing for a not yet known ORG displacement.
    pub fn jump_space(&mut self, kind: SpaceKind) -> SpaceId {
        let lid = self.ensure_section();
        self.record_high_water(lid);
        self.append_space(kind, Alignment::NONE)
    }

    /// Placement requests for every non-first location counter.
    pub fn loctr_begin_requests(&self) -> Vec<LoctrBegin> {
        let mut out = Vec::new();
        for section in &self.sections {
            for pair in section.loctrs.windows(2) {
                let (prev, next) = (&self.loctrs[pair[0].index()], &self.loctrs[pair[1].index()]);
                if let Some(space) = next.begin.filter(|s| !self.spaces.is_resolved(*s)) {
                    out.push(LoctrBegin {
                        space,
                        loctr: next.id,
                        section_start: section.start(),
                        candidates: prev.high_water_candidates(),
                    });
                }
            }
        }
        out
    }

    pub fn loctr_alignment(&self) -> Alignment {
        self.loctr_alignment
    }
}

/// Highest of `candidates`, or the spaces preventing the comparison.
pub fn highest(candidates: &[Address], spaces: &SpaceArena) -> Result<Address, Vec<SpaceId>> {
    let Some(first) = candidates.first() else {
        return Err(Vec::new());
    };
    let mut best = first.clone();
    let mut blocking: Vec<SpaceId> = Vec::new();
    for c in &candidates[1..] {
        let diff = (c.clone() - best.clone()).normalized(spaces);
        if !diff.spaces().is_empty() {
            blocking.extend(diff.spaces().iter().map(|&(s, _)| s));
            continue;
        }
        if diff.offset() > 0 {
            best = c.clone();
        }
    }
    if blocking.is_empty() {
        Ok(best)
    } else {
        blocking.sort();
        blocking.dedup();
        Err(blocking)
    }
}

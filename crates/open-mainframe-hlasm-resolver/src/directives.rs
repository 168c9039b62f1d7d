//! Assembler instruction catalog.
//!
//! Every assembler instruction has opcode class `A` for `O'`. Only a few of
//! them define ordinary symbols or move location counters; [`Directive::role`]
//! tells the statement handlers which.

use std::fmt;

use crate::section::SectionKind;

// ---------------------------------------------------------------------------
//  Directive catalog
// ---------------------------------------------------------------------------

/// Known HLASM assembler instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    // ─── Section control ───
    Csect,
    Dsect,
    Rsect,
    Com,
    Dxd,
    Start,
    End,
    Loctr,

    // ─── Data definition ───
    Dc,
    Ds,
    Ccw,
    Ccw0,
    Ccw1,

    // ─── Symbol & addressing ───
    Equ,
    Using,
    Drop,
    Org,
    Push,
    Pop,
    Opsyn,

    // ─── External linkage ───
    Entry,
    Extrn,
    Wxtrn,

    // ─── Source and listing ───
    Copy,
    Ltorg,
    Cnop,
    Amode,
    Rmode,
    Print,
    Title,
    Eject,
    Space,
    Punch,
    Repro,
    Acontrol,
    Adata,
    Ainsert,
    Exitctl,
    Xattr,
    Cattr,
    Alias,

    // ─── Macro definition ───
    Macro,
    Mend,
    Mexit,
    Mnote,

    // ─── Conditional assembly ───
    Lcla,
    Lclb,
    Lclc,
    Gbla,
    Gblb,
    Gblc,
    Seta,
    Setb,
    Setc,
    Aif,
    Ago,
    Anop,
    Actr,
    Aread,
    Aspace,
    Aeject,
}

const CATALOG: &[(&str, Directive)] = &[
    ("CSECT", Directive::Csect),
    ("DSECT", Directive::Dsect),
    ("RSECT", Directive::Rsect),
    ("COM", Directive::Com),
    ("DXD", Directive::Dxd),
    ("START", Directive::Start),
    ("END", Directive::End),
    ("LOCTR", Directive::Loctr),
    ("DC", Directive::Dc),
    ("DS", Directive::Ds),
    ("CCW", Directive::Ccw),
    ("CCW0", Directive::Ccw0),
    ("CCW1", Directive::Ccw1),
    ("EQU", Directive::Equ),
    ("USING", Directive::Using),
    ("DROP", Directive::Drop),
    ("ORG", Directive::Org),
    ("PUSH", Directive::Push),
    ("POP", Directive::Pop),
    ("OPSYN", Directive::Opsyn),
    ("ENTRY", Directive::Entry),
    ("EXTRN", Directive::Extrn),
    ("WXTRN", Directive::Wxtrn),
    ("COPY", Directive::Copy),
    ("LTORG", Directive::Ltorg),
    ("CNOP", Directive::Cnop),
    ("AMODE", Directive::Amode),
    ("RMODE", Directive::Rmode),
    ("PRINT", Directive::Print),
    ("TITLE", Directive::Title),
    ("EJECT", Directive::Eject),
    ("SPACE", Directive::Space),
    ("PUNCH", Directive::Punch),
    ("REPRO", Directive::Repro),
    ("ACONTROL", Directive::Acontrol),
    ("ADATA", Directive::Adata),
    ("AINSERT", Directive::Ainsert),
    ("EXITCTL", Directive::Exitctl),
    ("XATTR", Directive::Xattr),
    ("CATTR", Directive::Cattr),
    ("ALIAS", Directive::Alias),
    ("MACRO", Directive::Macro),
    ("MEND", Directive::Mend),
    ("MEXIT", Directive::Mexit),
    ("MNOTE", Directive::Mnote),
    ("LCLA", Directive::Lcla),
    ("LCLB", Directive::Lclb),
    ("LCLC", Directive::Lclc),
    ("GBLA", Directive::Gbla),
    ("GBLB", Directive::Gblb),
    ("GBLC", Directive::Gblc),
    ("SETA", Directive::Seta),
    ("SETB", Directive::Setb),
    ("SETC", Directive::Setc),
    ("AIF", Directive::Aif),
    ("AGO", Directive::Ago),
    ("ANOP", Directive::Anop),
    ("ACTR", Directive::Actr),
    ("AREAD", Directive::Aread),
    ("ASPACE", Directive::Aspace),
    ("AEJECT", Directive::Aeject),
];

/// What a directive means to ordinary symbol resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveRole {
    Section(SectionKind),
    Loctr,
    Equ,
    /// DC (`storage_only == false`) or DS.
    Data { storage_only: bool },
    Org,
    /// Opens a macro definition.
    MacroStart,
    MacroEnd,
    /// Processed by the conditional assembly layer, not here.
    ConditionalAssembly,
    /// No effect on symbols or location counters.
    Other,
}

impl Directive {
    /// Try to parse a directive from an opcode string.
    pub fn from_opcode(opcode: &str) -> Option<Self> {
        let upper = opcode.to_ascii_uppercase();
        CATALOG.iter().find(|(name, _)| *name == upper).map(|(_, d)| *d)
    }

    pub fn name(self) -> &'static str {
        CATALOG
            .iter()
            .find(|(_, d)| *d == self)
            .map_or("", |(name, _)| name)
    }

    pub fn role(self) -> DirectiveRole {
        match self {
            Self::Csect | Self::Start => DirectiveRole::Section(SectionKind::Executable),
            Self::Dsect => DirectiveRole::Section(SectionKind::Dummy),
            Self::Rsect => DirectiveRole::Section(SectionKind::ReadOnly),
            Self::Com => DirectiveRole::Section(SectionKind::Common),
            Self::Loctr => DirectiveRole::Loctr,
            Self::Equ => DirectiveRole::Equ,
            Self::Dc => DirectiveRole::Data { storage_only: false },
            Self::Ds => DirectiveRole::Data { storage_only: true },
            Self::Org => DirectiveRole::Org,
            Self::Macro => DirectiveRole::MacroStart,
            Self::Mend => DirectiveRole::MacroEnd,
            Self::Lcla
            | Self::Lclb
            | Self::Lclc
            | Self::Gbla
            | Self::Gblb
            | Self::Gblc
            | Self::Seta
            | Self::Setb
            | Self::Setc
            | Self::Aif
            | Self::Ago
            | Self::Anop
            | Self::Actr
            | Self::Aread
            | Self::Aspace
            | Self::Aeject
            | Self::Mexit
            | Self::Mnote => DirectiveRole::ConditionalAssembly,
            _ => DirectiveRole::Other,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

//! Machine instruction catalog for z/Architecture.
//!
//! Symbol resolution needs only three facts about a machine instruction:
//! its length (which follows from its format), that it is halfword aligned,
//! and whether the mnemonic is an extended branch mnemonic (opcode class `E`
//! rather than `O`).
//!
//! Covers the core instruction formats:
//! - E, I, RR (2-byte)
//! - RRE, RRF, RX, RS, RI, SI, S (4-byte)
//! - RXE, RXY, RSY, RIE, RIL, SIY, SIL, SS, SSE, SSF, vector (6-byte)

use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
//  Instruction format descriptors
// ---------------------------------------------------------------------------

/// The encoding format of a z/Architecture machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum InsnFormat {
    E,
    I,
    RR,
    RRE,
    RRF,
    RX,
    RXE,
    RXY,
    RS,
    RSY,
    RI,
    RIE,
    RIL,
    SI,
    SIY,
    SIL,
    S,
    SS,
    SSE,
    SSF,
    /// Any of the vector facility formats.
    V,
}

impl InsnFormat {
    /// Instruction length in bytes.
    pub fn length(self) -> u32 {
        match self {
            InsnFormat::E | InsnFormat::I | InsnFormat::RR => 2,
            InsnFormat::RRE
            | InsnFormat::RRF
            | InsnFormat::RX
            | InsnFormat::RS
            | InsnFormat::RI
            | InsnFormat::SI
            | InsnFormat::S => 4,
            InsnFormat::RXE
            | InsnFormat::RXY
            | InsnFormat::RSY
            | InsnFormat::RIE
            | InsnFormat::RIL
            | InsnFormat::SIY
            | InsnFormat::SIL
            | InsnFormat::SS
            | InsnFormat::SSE
            | InsnFormat::SSF
            | InsnFormat::V => 6,
        }
    }
}

impl fmt::Display for InsnFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
//  Instruction definition
// ---------------------------------------------------------------------------

/// Whether a mnemonic is a base instruction or an extended mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InsnKind {
    Machine,
    /// Branch on condition with an implied mask (`B`, `BE`, `J`, ...).
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsnDef {
    pub mnemonic: String,
    pub format: InsnFormat,
    pub kind: InsnKind,
}

impl InsnDef {
    pub fn length(&self) -> u32 {
        self.format.length()
    }

    /// `O'` classification letter.
    pub fn opcode_class(&self) -> char {
        match self.kind {
            InsnKind::Machine => 'O',
            InsnKind::Extended => 'E',
        }
    }
}

// ---------------------------------------------------------------------------
//  Instruction catalog
// ---------------------------------------------------------------------------

const RR: &[&str] = &[
    "LR", "CR", "AR", "SR", "MR", "DR", "ALR", "SLR", "LPDR", "LNDR", "LTDR", "LCDR", "HDR", "LDXR", "LDR",
    "CDR", "ADR", "SDR", "MDR", "DDR", "LER", "CER", "AER", "SER", "MER", "DER", "LPR", "LNR", "LTR", "LCR",
    "NR", "CLR", "OR", "XR", "BALR", "BCTR", "BCR", "BASR", "BASSM", "BSM", "SPM", "MVCL", "CLCL",
];

const I: &[&str] = &["SVC"];

const E: &[&str] = &["PR", "UPT", "PFPO", "SAM24", "SAM31", "SAM64", "TRAP2"];

const RRE: &[&str] = &[
    "LGR", "LGFR", "AGR", "SGR", "MSGR", "DSGR", "CGR", "CLGR", "NGR", "OGR", "XGR", "LTGR", "LCGR", "LPGR",
    "LNGR", "ALGR", "SLGR", "AGFR", "SGFR", "LLGFR", "LLGTR", "MSR", "IPM", "EAR", "SAR", "LURA", "STURA",
    "FLOGR", "LRVR", "LRVGR", "CKSM", "CUSE", "SRST", "MVST", "CLST", "TRE", "LBR", "LHR", "LLCR", "LLHR",
];

const RRF: &[&str] = &["MSRKC", "ARK", "SRK", "NRK", "ORK", "XRK", "AGRK", "SGRK", "LOCR", "LOCGR", "SELR"];

const RX: &[&str] = &[
    "L", "ST", "A", "S", "M", "D", "AL", "SL", "N", "O", "X", "C", "CL", "LA", "LH", "STH", "AH", "SH",
    "MH", "CH", "IC", "STC", "EX", "BAL", "BAS", "BC", "BCT", "LD", "STD", "LE", "STE", "CVB", "CVD", "AD",
    "SD", "MD", "DD", "CD", "AE", "SE", "ME", "DE", "CE",
];

const RXE: &[&str] = &["ADB", "SDB", "MDB", "DDB", "CDB", "AEB", "SEB", "MEEB", "DEB", "CEB", "LDEB"];

const RXY: &[&str] = &[
    "LG", "STG", "AG", "SG", "MSG", "DSG", "CG", "CLG", "NG", "OG", "XG", "LGF", "LGH", "LLGF", "LLGH",
    "LLGC", "LGB", "LAY", "LY", "STY", "AY", "SY", "CY", "LHY", "STHY", "ICY", "STCY", "LRV", "LRVG", "STRV",
    "LT", "LTG", "LB", "LLC", "LLH", "ALG", "SLG", "AGF", "SGF", "CGF", "NY", "OY", "XY", "LDY", "STDY",
];

const RS: &[&str] = &[
    "LM", "STM", "SLL", "SRL", "SLA", "SRA", "SLDL", "SRDL", "SLDA", "SRDA", "BXH", "BXLE", "CS", "CDS",
    "ICM", "STCM", "CLM", "LAM", "STAM", "MVCLE", "CLCLE",
];

const RSY: &[&str] = &[
    "LMG", "STMG", "SLLG", "SRLG", "SLAG", "SRAG", "CSG", "CDSG", "ICMH", "ICMY", "STCMY", "CLMY", "BXHG",
    "BXLEG", "RLL", "RLLG", "LMY", "STMY", "CSY", "LOC", "STOC", "LOCG", "STOCG",
];

const RI: &[&str] = &[
    "LHI", "AHI", "MHI", "CHI", "LGHI", "AGHI", "MGHI", "CGHI", "TMLL", "TMLH", "TMHL", "TMHH", "IILL",
    "IILH", "IIHL", "IIHH", "NILL", "NILH", "NIHL", "NIHH", "OILL", "OILH", "OIHL", "OIHH", "BRAS", "BRC",
    "BRCT", "BRCTG", "BRXH", "BRXLE",
];

const RIE: &[&str] = &[
    "CRJ", "CGRJ", "CIJ", "CGIJ", "CLRJ", "CLGRJ", "CLIJ", "CLGIJ", "RISBG", "RISBGN", "RNSBG", "ROSBG",
    "RXSBG", "AHIK", "AGHIK",
];

const RIL: &[&str] = &[
    "LARL", "BRASL", "BRCL", "LGFI", "LLIHF", "LLILF", "IIHF", "IILF", "NIHF", "NILF", "OIHF", "OILF", "XIHF",
    "XILF", "AFI", "AGFI", "ALFI", "ALGFI", "SLFI", "SLGFI", "CFI", "CGFI", "CLFI", "CLGFI", "MSFI", "MSGFI",
    "LRL", "LGRL", "STRL", "STGRL", "EXRL",
];

const SI: &[&str] = &["MVI", "CLI", "NI", "OI", "XI", "TM"];

const SIY: &[&str] = &["MVIY", "CLIY", "NIY", "OIY", "XIY", "TMY", "ASI", "AGSI"];

const SIL: &[&str] = &["MVHHI", "MVHI", "MVGHI", "CHHSI", "CHSI", "CGHSI", "CLHHSI", "CLFHSI", "CLGHSI"];

const S: &[&str] = &["STCK", "STCKE", "STCKF", "SPKA", "IPK", "SSM", "LPSW", "LPSWE", "STIDP", "TS", "SRNM"];

const SS: &[&str] = &[
    "MVC", "CLC", "NC", "OC", "XC", "TR", "TRT", "ED", "EDMK", "MVN", "MVZ", "MVCIN", "PACK", "UNPK", "ZAP",
    "CP", "AP", "SP", "MP", "DP", "MVO", "SRP", "PKA", "PKU", "UNPKA", "UNPKU", "MVCK", "MVCP", "MVCS",
];

const SSE: &[&str] = &["MVCDK", "MVCSK", "LASP", "TPROT"];

const SSF: &[&str] = &["MVCOS", "ECTG", "CSST", "LPD", "LPDG"];

const VECTOR: &[&str] = &[
    "VL", "VST", "VLM", "VSTM", "VLR", "VLREP", "VLEB", "VLEH", "VLEF", "VLEG", "VA", "VS", "VN", "VO", "VX",
    "VCEQ", "VCH", "VCHL", "VMX", "VMN", "VSEL", "VFA", "VFS", "VFM", "VFD", "VFMA", "VFMS", "VREP", "VREPI",
    "VLVG", "VLGV", "VGBM", "VZERO", "VONE", "VPERM", "VISTR", "VFAE", "VFEE", "VFENE",
];

/// Branch-on-condition masks that have extended mnemonics.
const CONDITIONS: &[&str] = &[
    "", "H", "L", "E", "NE", "NH", "NL", "Z", "NZ", "O", "NO", "P", "M", "NP", "NM",
];

/// The instruction catalog holds definitions for all known mnemonics.
#[derive(Debug, Clone)]
pub struct InsnCatalog {
    instructions: HashMap<String, InsnDef>,
}

impl Default for InsnCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InsnCatalog {
    /// Build the catalog with core z/Architecture instructions.
    pub fn new() -> Self {
        let mut catalog = Self {
            instructions: HashMap::new(),
        };
        let groups: &[(InsnFormat, &[&str])] = &[
            (InsnFormat::RR, RR),
            (InsnFormat::I, I),
            (InsnFormat::E, E),
            (InsnFormat::RRE, RRE),
            (InsnFormat::RRF, RRF),
            (InsnFormat::RX, RX),
            (InsnFormat::RXE, RXE),
            (InsnFormat::RXY, RXY),
            (InsnFormat::RS, RS),
            (InsnFormat::RSY, RSY),
            (InsnFormat::RI, RI),
            (InsnFormat::RIE, RIE),
            (InsnFormat::RIL, RIL),
            (InsnFormat::SI, SI),
            (InsnFormat::SIY, SIY),
            (InsnFormat::SIL, SIL),
            (InsnFormat::S, S),
            (InsnFormat::SS, SS),
            (InsnFormat::SSE, SSE),
            (InsnFormat::SSF, SSF),
            (InsnFormat::V, VECTOR),
        ];
        for (format, mnemonics) in groups {
            for m in *mnemonics {
                catalog.add(m, *format, InsnKind::Machine);
            }
        }
        catalog.register_extended_branches();
        catalog
    }

    fn add(&mut self, mnemonic: &str, format: InsnFormat, kind: InsnKind) {
        let mnemonic = mnemonic.to_ascii_uppercase();
        self.instructions.insert(
            mnemonic.clone(),
            InsnDef {
                mnemonic,
                format,
                kind,
            },
        );
    }

    // -- Extended branch mnemonics ------------------------------------------
    fn register_extended_branches(&mut self) {
        for cond in CONDITIONS {
            // BC / BCR based
            self.add(&format!("B{cond}"), InsnFormat::RX, InsnKind::Extended);
            self.add(&format!("B{cond}R"), InsnFormat::RR, InsnKind::Extended);
            // BRC / BRCL based
            self.add(&format!("J{cond}"), InsnFormat::RI, InsnKind::Extended);
            self.add(&format!("JL{cond}"), InsnFormat::RIL, InsnKind::Extended);
            self.add(&format!("BR{cond}"), InsnFormat::RI, InsnKind::Extended);
        }
        self.add("NOP", InsnFormat::RX, InsnKind::Extended);
        self.add("NOPR", InsnFormat::RR, InsnKind::Extended);
        self.add("JNOP", InsnFormat::RI, InsnKind::Extended);
        self.add("JLNOP", InsnFormat::RIL, InsnKind::Extended);
        self.add("BRU", InsnFormat::RI, InsnKind::Extended);
        self.add("BRUL", InsnFormat::RIL, InsnKind::Extended);
        self.add("JLU", InsnFormat::RIL, InsnKind::Extended);
        // "BR" is register branch (BCR 15), not the relative form
        self.add("BR", InsnFormat::RR, InsnKind::Extended);
    }

    /// Look up an instruction definition by mnemonic.
    pub fn lookup(&self, mnemonic: &str) -> Option<&InsnDef> {
        self.instructions.get(&mnemonic.to_ascii_uppercase())
    }

    /// Number of registered instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

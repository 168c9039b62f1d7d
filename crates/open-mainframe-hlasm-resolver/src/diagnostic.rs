//! Diagnostics reported by the resolver.
//!
//! Every problem found while resolving symbols is recovered locally: the
//! offending target receives a fallback value and a [`Diagnostic`] is
//! appended to the context. The diagnostic codes are stable and consumed
//! verbatim by editor front ends.

use std::fmt;

use crate::ids::Id;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Position of a statement in its source member.
///
/// Lines and columns are 0-based. `file` is the interned member name, `None`
/// for the primary source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    pub file: Option<Id>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { file: None, line, column }
    }

    pub fn in_file(file: Id, line: u32, column: u32) -> Self {
        Self { file: Some(file), line, column }
    }
}

// ---------------------------------------------------------------------------
//  Error taxonomy
// ---------------------------------------------------------------------------

/// Broad class of a resolver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Symbol or section already defined incompatibly.
    Redefinition,
    /// A value is used but never defined.
    UnresolvedReference,
    /// A value transitively depends on itself.
    CyclicDependency,
    /// Repositioning or alignment outside the section/location counter.
    AlignmentViolation,
    /// Attribute requested on a symbol kind that cannot carry it.
    AttributeMisuse,
    /// Operand of the wrong kind or out of range.
    InvalidOperand,
}

/// Errors detected while resolving ordinary symbols and addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ResolveError {
    /// Name already used by a symbol, section or counter of another kind.
    #[error("Cannot declare {what} with the same name")]
    #[diagnostic(code(hlasm::redefinition))]
    Redefinition { what: &'static str },

    /// Reference to a symbol that is never defined.
    #[error("Unknown {kind}: {name}")]
    #[diagnostic(code(hlasm::unresolved_reference))]
    UnresolvedReference { kind: &'static str, name: String },

    #[error("Cyclic symbol definition")]
    #[diagnostic(code(hlasm::cyclic_dependency))]
    CyclicDependency,

    /// ORG below the origin of the location counter, or into another section.
    #[error("Operand value falls outside of current section/LOCTR")]
    #[diagnostic(code(hlasm::outside_section))]
    OutsideSection,

    #[error("Error at ORG instruction: operand must specify relocatable expression")]
    #[diagnostic(code(hlasm::org_not_relocatable))]
    OrgNotRelocatable,

    #[error(
        "Error at ORG instruction: operand value must be either an absolute expression or the operand must be omitted"
    )]
    #[diagnostic(code(hlasm::org_operand_format))]
    OrgOperandFormat,

    #[error(
        "Error at ORG instruction: boundary operand value must be either a number that is a power of 2 with a range from 2 to 4096, or must be omitted"
    )]
    #[diagnostic(code(hlasm::org_boundary))]
    OrgBoundary,

    #[error("Illegal attribute reference")]
    #[diagnostic(code(hlasm::attribute_misuse))]
    AttributeMisuse,

    #[error("Unable to evaluate operand")]
    #[diagnostic(code(hlasm::unable_to_evaluate))]
    UnableToEvaluate,

    #[error(
        "Error at EQU instruction: operand representing length attribute value must either be an absolute value in the range 0 through 65535 or must be omitted"
    )]
    #[diagnostic(code(hlasm::equ_length))]
    EquLength,

    #[error(
        "Error at EQU instruction: operand representing type attribute value must either be an absolute value in the range 0 through 255 or must be omitted"
    )]
    #[diagnostic(code(hlasm::equ_type))]
    EquType,

    /// Explicit length modifier outside the range allowed for the type.
    #[error("The length modifier of type {type_code} must be between {min} and {max}")]
    #[diagnostic(code(hlasm::length_modifier))]
    LengthModifier { type_code: char, min: i32, max: i32 },
}

impl ResolveError {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::Redefinition { .. } => "E031",
            ResolveError::UnresolvedReference { .. } => "E010",
            ResolveError::CyclicDependency => "E033",
            ResolveError::OutsideSection => "E068",
            ResolveError::OrgNotRelocatable => "A245",
            ResolveError::OrgOperandFormat => "A115",
            ResolveError::OrgBoundary => "A116",
            ResolveError::AttributeMisuse => "E066",
            ResolveError::UnableToEvaluate => "E016",
            ResolveError::EquLength => "A133",
            ResolveError::EquType => "A134",
            ResolveError::LengthModifier { .. } => "D008",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolveError::Redefinition { .. } => ErrorCategory::Redefinition,
            ResolveError::UnresolvedReference { .. } => ErrorCategory::UnresolvedReference,
            ResolveError::CyclicDependency => ErrorCategory::CyclicDependency,
            ResolveError::OutsideSection | ResolveError::OrgBoundary => ErrorCategory::AlignmentViolation,
            ResolveError::AttributeMisuse => ErrorCategory::AttributeMisuse,
            ResolveError::OrgNotRelocatable
            | ResolveError::OrgOperandFormat
            | ResolveError::UnableToEvaluate
            | ResolveError::EquLength
            | ResolveError::EquType
            | ResolveError::LengthModifier { .. } => ErrorCategory::InvalidOperand,
        }
    }

    /// Lower into a diagnostic at `location`.
    pub fn at(&self, location: Location) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            code: self.code().to_string(),
            message: self.to_string(),
            location,
            category: Some(self.category()),
            suggestion: None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Diagnostic record
// ---------------------------------------------------------------------------

/// A diagnostic message attached to a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable code, e.g. `E033`.
    pub code: String,
    pub message: String,
    pub location: Location,
    /// Taxonomy class when produced from a [`ResolveError`].
    pub category: Option<ErrorCategory>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(code: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            location,
            category: None,
            suggestion: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            location,
            category: None,
            suggestion: None,
        }
    }

    /// Add a suggestion to this diagnostic.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

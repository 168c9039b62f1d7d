//! HLASM ordinary symbol and address dependency resolution.
//!
//! This crate provides:
//!
//! - **Context**: symbol table, sections and location counters, and the
//!   deferred resolution of values that depend on later statements
//! - **Addresses**: section-relative values with symbolic space terms for
//!   reservations of not yet known length
//! - **Attributes**: L', T', S', I', D', O', K' and N' on ordinary symbols,
//!   variable symbols and opcodes
//! - **Handlers**: EQU, DC/DS, ORG, CSECT/DSECT/RSECT/COM/START, LOCTR and
//!   machine instructions
//! - **Front end**: free-format source lexer, expression and operand parser,
//!   and an [`Analyzer`] driving the context from source text
//!
//! Cyclic definitions, undefined symbols and invalid operands are reported
//! as [`Diagnostic`]s; every unresolved value receives a fallback when the
//! analysis finishes.

pub mod address;
pub mod analyzer;
pub mod attribute;
pub mod config;
pub mod context;
pub mod data_def;
pub mod dependency;
pub mod diagnostic;
pub mod directives;
pub mod ebcdic;
pub mod expr;
mod handlers;
pub mod ids;
pub mod instruction;
pub mod lexer;
pub mod parser;
pub mod section;
pub mod space;
pub mod symbol;

pub use address::{Address, Value};
pub use analyzer::Analyzer;
pub use attribute::{MacroOrigin, VariableValue};
pub use config::{ConfigError, ResolverConfig};
pub use context::OrdinaryContext;
pub use dependency::Evaluation;
pub use diagnostic::{Diagnostic, Location, ResolveError, Severity};
pub use expr::{AttrKind, Expr};
pub use ids::{Id, IdStorage};
pub use lexer::{parse_source, parse_source_line, tokenize_operands, InstructionLine, LexerError, SourceLine, Token};
pub use parser::{parse_statement, ParseError, Statement, StatementKind};
pub use section::SectionKind;
pub use symbol::{AttrSlot, Symbol, SymbolAttributes, SymbolOrigin, SymbolValue};

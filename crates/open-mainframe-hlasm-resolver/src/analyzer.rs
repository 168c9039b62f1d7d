//! Source-level driver.
//!
//! Splits assembler source into statements, feeds them to an
//! [`OrdinaryContext`] in order and finishes it at end of input. Macro
//! definitions are not expanded: their prototypes are recorded for `O'`
//! and their bodies skipped. Conditional assembly statements are ignored.
//!
//! ```
//! use open_mainframe_hlasm_resolver::Analyzer;
//!
//! let ctx = Analyzer::new("A EQU B+1\nB EQU 2\n").analyze();
//! assert_eq!(ctx.lookup_symbol("A"), Some(3));
//! assert!(ctx.diagnostics().is_empty());
//! ```

use crate::attribute::MacroOrigin;
use crate::config::ResolverConfig;
use crate::context::OrdinaryContext;
use crate::diagnostic::{Diagnostic, Location, ResolveError};
use crate::directives::{Directive, DirectiveRole};
use crate::lexer::{parse_source, SourceLine};
use crate::parser::parse_statement;

pub struct Analyzer<'a> {
    source: &'a str,
    config: ResolverConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Process the whole source and return the finished context.
    pub fn analyze(self) -> OrdinaryContext {
        let mut ctx = OrdinaryContext::new(self.config);
        let mut macro_depth = 0usize;
        let mut expect_prototype = false;
        let mut statements = 0usize;

        for (line_no, line) in parse_source(self.source) {
            let SourceLine::Instruction(insn) = line else {
                continue;
            };
            let location = Location::new(line_no.saturating_sub(1), 0);

            if expect_prototype {
                expect_prototype = false;
                if macro_depth == 1 {
                    ctx.define_macro(&insn.opcode, MacroOrigin::Local);
                }
                continue;
            }
            match Directive::from_opcode(&insn.opcode).map(Directive::role) {
                Some(DirectiveRole::MacroStart) => {
                    macro_depth += 1;
                    expect_prototype = true;
                    continue;
                }
                Some(DirectiveRole::MacroEnd) if macro_depth > 0 => {
                    macro_depth -= 1;
                    continue;
                }
                _ if macro_depth > 0 => continue,
                Some(DirectiveRole::ConditionalAssembly) => continue,
                _ => {}
            }

            match parse_statement(&insn, location, ctx.ids_mut()) {
                Ok(statement) => {
                    statements += 1;
                    ctx.process(&statement);
                }
                Err(e) => {
                    tracing::debug!(line = location.line, error = %e, "statement not parsed");
                    let code = ResolveError::UnableToEvaluate.code();
                    ctx.add_diagnostic(Diagnostic::error(code, e.to_string(), location));
                }
            }
        }

        if macro_depth > 0 {
            tracing::warn!(depth = macro_depth, "source ends inside a macro definition");
        }
        tracing::debug!(statements, "source processed");
        ctx.finish();
        ctx
    }
}

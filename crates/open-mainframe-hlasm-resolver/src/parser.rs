//! Statement and operand parser.
//!
//! Turns a lexed [`InstructionLine`] into a [`Statement`] whose operands are
//! parsed once: machine expressions into [`Expr`] trees by recursive
//! descent, DC/DS operands into [`DataOperand`]s.

use crate::data_def::{DataOperand, DataType, LengthModifier, Nominal};
use crate::diagnostic::Location;
use crate::directives::{Directive, DirectiveRole};
use crate::ebcdic;
use crate::expr::{AttrKind, AttrOperand, BinOp, Expr};
use crate::ids::{Id, IdStorage};
use crate::lexer::{find_matching_paren, split_top_level_commas, tokenize_operands, InstructionLine, LexerError, Token};
use crate::section::SectionKind;

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ParseError {
    #[error(transparent)]
    #[diagnostic(code(hlasm::lex))]
    Lex(#[from] LexerError),

    #[error("Unexpected end of expression")]
    #[diagnostic(code(hlasm::parse::unexpected_end))]
    UnexpectedEnd,

    #[error("Unexpected token '{0}'")]
    #[diagnostic(code(hlasm::parse::unexpected_token))]
    UnexpectedToken(String),

    #[error("Invalid term: {0}")]
    #[diagnostic(code(hlasm::parse::invalid_term))]
    InvalidTerm(String),

    #[error("Invalid DC/DS operand: {0}")]
    #[diagnostic(code(hlasm::parse::data_operand))]
    InvalidDataOperand(String),

    #[error("Invalid name field: {0}")]
    #[diagnostic(code(hlasm::parse::label))]
    InvalidLabel(String),

    #[error("Operand expected")]
    #[diagnostic(code(hlasm::parse::missing_operand))]
    MissingOperand,
}

// ---------------------------------------------------------------------------
//  Expressions
// ---------------------------------------------------------------------------

/// Parse a complete machine expression.
pub fn parse_expression(text: &str, ids: &mut IdStorage) -> Result<Expr, ParseError> {
    let tokens = tokenize_operands(text)?;
    let mut pos = 0;
    let expr = parse_additive(&tokens, &mut pos, ids)?;
    match tokens.get(pos) {
        None => Ok(expr),
        Some(t) => Err(ParseError::UnexpectedToken(t.to_string())),
    }
}

fn parse_optional(text: &str, ids: &mut IdStorage) -> Result<Option<Expr>, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse_expression(text, ids).map(Some)
    }
}

fn parse_additive(tokens: &[Token], pos: &mut usize, ids: &mut IdStorage) -> Result<Expr, ParseError> {
    let mut left = parse_multiplicative(tokens, pos, ids)?;

    while let Some(Token::Operator(op @ ('+' | '-'))) = tokens.get(*pos) {
        let op = if *op == '+' { BinOp::Add } else { BinOp::Sub };
        *pos += 1;
        let right = parse_multiplicative(tokens, pos, ids)?;
        left = Expr::binary(op, left, right);
    }

    Ok(left)
}

fn parse_multiplicative(tokens: &[Token], pos: &mut usize, ids: &mut IdStorage) -> Result<Expr, ParseError> {
    let mut left = parse_unary(tokens, pos, ids)?;

    while let Some(Token::Operator(op @ ('*' | '/'))) = tokens.get(*pos) {
        let op = if *op == '*' { BinOp::Mul } else { BinOp::Div };
        *pos += 1;
        let right = parse_unary(tokens, pos, ids)?;
        left = Expr::binary(op, left, right);
    }

    Ok(left)
}

fn parse_unary(tokens: &[Token], pos: &mut usize, ids: &mut IdStorage) -> Result<Expr, ParseError> {
    match tokens.get(*pos) {
        Some(Token::Operator('-')) => {
            *pos += 1;
            Ok(Expr::Neg(Box::new(parse_unary(tokens, pos, ids)?)))
        }
        Some(Token::Operator('+')) => {
            *pos += 1;
            parse_unary(tokens, pos, ids)
        }
        _ => parse_primary(tokens, pos, ids),
    }
}

fn parse_primary(tokens: &[Token], pos: &mut usize, ids: &mut IdStorage) -> Result<Expr, ParseError> {
    let token = tokens.get(*pos).ok_or(ParseError::UnexpectedEnd)?;
    *pos += 1;

    match token {
        Token::Number(n) => i32::try_from(*n)
            .map(Expr::Num)
            .map_err(|_| ParseError::InvalidTerm(n.to_string())),
        Token::Symbol(name) => Ok(Expr::Symbol(ids.add(name))),
        Token::LocationCounter => Ok(Expr::LocationCounter),
        Token::HexTerm(h) => {
            if h.is_empty() || h.len() > 8 {
                return Err(ParseError::InvalidTerm(token.to_string()));
            }
            u32::from_str_radix(h, 16)
                .map(|v| Expr::Num(v as i32))
                .map_err(|_| ParseError::InvalidTerm(token.to_string()))
        }
        Token::BinTerm(b) => {
            if b.is_empty() || b.len() > 32 {
                return Err(ParseError::InvalidTerm(token.to_string()));
            }
            u32::from_str_radix(b, 2)
                .map(|v| Expr::Num(v as i32))
                .map_err(|_| ParseError::InvalidTerm(token.to_string()))
        }
        Token::CharTerm(c) => {
            let count = c.chars().count();
            if count == 0 || count > 4 {
                return Err(ParseError::InvalidTerm(token.to_string()));
            }
            let v = c.chars().fold(0u32, |acc, ch| (acc << 8) | u32::from(ebcdic::from_ascii(ch)));
            Ok(Expr::Num(v as i32))
        }
        Token::Attribute(letter, name) => {
            let kind = AttrKind::from_letter(*letter).ok_or_else(|| ParseError::InvalidTerm(token.to_string()))?;
            let operand = match name.strip_prefix('&') {
                Some(var) if !var.is_empty() => AttrOperand::Variable(ids.add(var)),
                None if !name.is_empty() => AttrOperand::Symbol(ids.add(name)),
                _ => return Err(ParseError::InvalidTerm(token.to_string())),
            };
            Ok(Expr::Attribute(kind, operand))
        }
        Token::LParen => {
            let inner = parse_additive(tokens, pos, ids)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(inner)
                }
                Some(t) => Err(ParseError::UnexpectedToken(t.to_string())),
                None => Err(ParseError::UnexpectedEnd),
            }
        }
        Token::Variable(_) => Err(ParseError::InvalidTerm(token.to_string())),
        other => Err(ParseError::UnexpectedToken(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
//  DC / DS operands
// ---------------------------------------------------------------------------

/// Read a modifier or duplication value: digits, or a parenthesized
/// expression. Returns the expression and the index after it.
fn read_modifier(
    chars: &[char],
    mut i: usize,
    signed: bool,
    ids: &mut IdStorage,
) -> Result<(Expr, usize), ParseError> {
    let text: String = chars.iter().collect();
    if chars.get(i) == Some(&'(') {
        let close = find_matching_paren(chars, i).ok_or_else(|| ParseError::InvalidDataOperand(text.clone()))?;
        let inner: String = chars[i + 1..close].iter().collect();
        return Ok((parse_expression(&inner, ids)?, close + 1));
    }
    let negative = signed && chars.get(i) == Some(&'-');
    if signed && matches!(chars.get(i), Some('-' | '+')) {
        i += 1;
    }
    let start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if start == i {
        return Err(ParseError::InvalidDataOperand(text));
    }
    let digits: String = chars[start..i].iter().collect();
    let n: i32 = digits
        .parse()
        .map_err(|_| ParseError::InvalidDataOperand(text.clone()))?;
    let expr = if negative { Expr::Neg(Box::new(Expr::Num(n))) } else { Expr::Num(n) };
    Ok((expr, i))
}

fn starts_modifier_value(c: Option<&char>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit() || matches!(c, '(' | '+' | '-' | '.'))
}

/// Parse one DC/DS operand such as `3CL(A+1)'ABC'`, `FS8'1.5'` or
/// `A(X,Y)`.
pub fn parse_data_operand(text: &str, ids: &mut IdStorage) -> Result<DataOperand, ParseError> {
    let chars: Vec<char> = text.trim().chars().collect();
    let invalid = || ParseError::InvalidDataOperand(text.trim().to_string());
    let mut i = 0;

    let duplication = if chars.first().is_some_and(|c| c.is_ascii_digit() || *c == '(') {
        let (e, next) = read_modifier(&chars, 0, false, ids)?;
        i = next;
        Some(e)
    } else {
        None
    };

    let code = chars.get(i).copied().ok_or_else(invalid)?;
    i += 1;
    let ext = chars
        .get(i)
        .copied()
        .filter(|c| c.is_ascii_alphabetic() && DataType::is_extension(code, *c));
    if ext.is_some() {
        i += 1;
    }
    let data_type = DataType::from_code(code, ext).ok_or_else(invalid)?;
    let mut operand = DataOperand::new(data_type);
    operand.duplication = duplication;

    if chars.get(i).is_some_and(|c| c.eq_ignore_ascii_case(&'L')) && starts_modifier_value(chars.get(i + 1)) {
        i += 1;
        let bits = chars.get(i) == Some(&'.');
        if bits {
            i += 1;
        }
        let (expr, next) = read_modifier(&chars, i, false, ids)?;
        i = next;
        operand.length = Some(LengthModifier { expr, bits });
    }
    if chars.get(i).is_some_and(|c| c.eq_ignore_ascii_case(&'S')) && starts_modifier_value(chars.get(i + 1)) {
        let (expr, next) = read_modifier(&chars, i + 1, true, ids)?;
        i = next;
        operand.scale = Some(expr);
    }
    if chars.get(i).is_some_and(|c| c.eq_ignore_ascii_case(&'E')) && starts_modifier_value(chars.get(i + 1)) {
        let (expr, next) = read_modifier(&chars, i + 1, true, ids)?;
        i = next;
        operand.exponent = Some(expr);
    }

    match chars.get(i) {
        Some('\'') => {
            let mut value = String::new();
            i += 1;
            loop {
                match (chars.get(i), chars.get(i + 1)) {
                    (Some('\''), Some('\'')) => {
                        value.push('\'');
                        i += 2;
                    }
                    (Some('\''), _) => {
                        i += 1;
                        break;
                    }
                    (Some(c), _) => {
                        value.push(*c);
                        i += 1;
                    }
                    (None, _) => return Err(invalid()),
                }
            }
            operand.nominal = Some(Nominal::String(value));
        }
        Some('(') => {
            let close = find_matching_paren(&chars, i).ok_or_else(invalid)?;
            let inner: String = chars[i + 1..close].iter().collect();
            let exprs = split_top_level_commas(&inner)
                .iter()
                .map(|part| parse_expression(part.trim(), ids))
                .collect::<Result<Vec<_>, _>>()?;
            operand.nominal = Some(Nominal::Exprs(exprs));
            i = close + 1;
        }
        _ => {}
    }

    if i != chars.len() {
        return Err(invalid());
    }
    Ok(operand)
}

// ---------------------------------------------------------------------------
//  Statements
// ---------------------------------------------------------------------------

/// Operands of ORG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgOperands {
    /// `ORG` or `ORG ,`: move to the highest location reached.
    Empty,
    Target {
        target: Option<Expr>,
        boundary: Option<Expr>,
        offset: Option<Expr>,
    },
}

/// What a statement means to ordinary symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Equ {
        value: Option<Expr>,
        length: Option<Expr>,
        type_attr: Option<Expr>,
    },
    Data {
        storage_only: bool,
        operands: Vec<DataOperand>,
    },
    Org(OrgOperands),
    Section(SectionKind),
    Loctr,
    /// Machine instruction or macro call, told apart by the opcode.
    Instruction,
    /// No effect on ordinary symbols.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub label: Option<Id>,
    pub opcode: Id,
    pub kind: StatementKind,
    pub location: Location,
}

fn is_ordinary_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_'))
        && name.len() <= 63
}

/// Ordinary symbol in the name field; sequence symbols and variable symbols
/// define nothing here.
fn parse_label(label: Option<&str>, ids: &mut IdStorage) -> Result<Option<Id>, ParseError> {
    match label {
        None => Ok(None),
        Some(l) if l.starts_with('.') || l.starts_with('&') => Ok(None),
        Some(l) if is_ordinary_name(l) => Ok(Some(ids.add(l))),
        Some(l) => Err(ParseError::InvalidLabel(l.to_string())),
    }
}

fn operand_parts(operands: &str) -> Vec<String> {
    if operands.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level_commas(operands)
    }
}

fn nth_expr(parts: &[String], n: usize, ids: &mut IdStorage) -> Result<Option<Expr>, ParseError> {
    match parts.get(n) {
        Some(p) => parse_optional(p, ids),
        None => Ok(None),
    }
}

/// Parse the operands of one instruction line.
pub fn parse_statement(line: &InstructionLine, location: Location, ids: &mut IdStorage) -> Result<Statement, ParseError> {
    let label = parse_label(line.label.as_deref(), ids)?;
    let opcode = ids.add(&line.opcode);
    let parts = operand_parts(&line.operands);

    let kind = match Directive::from_opcode(&line.opcode).map(Directive::role) {
        None => StatementKind::Instruction,
        Some(DirectiveRole::Equ) => StatementKind::Equ {
            value: nth_expr(&parts, 0, ids)?,
            length: nth_expr(&parts, 1, ids)?,
            type_attr: nth_expr(&parts, 2, ids)?,
        },
        Some(DirectiveRole::Data { storage_only }) => {
            if parts.is_empty() {
                return Err(ParseError::MissingOperand);
            }
            let operands = parts
                .iter()
                .map(|p| parse_data_operand(p, ids))
                .collect::<Result<Vec<_>, _>>()?;
            StatementKind::Data { storage_only, operands }
        }
        Some(DirectiveRole::Org) => {
            if parts.iter().all(|p| p.trim().is_empty()) {
                StatementKind::Org(OrgOperands::Empty)
            } else {
                StatementKind::Org(OrgOperands::Target {
                    target: nth_expr(&parts, 0, ids)?,
                    boundary: nth_expr(&parts, 1, ids)?,
                    offset: nth_expr(&parts, 2, ids)?,
                })
            }
        }
        Some(DirectiveRole::Section(kind)) => StatementKind::Section(kind),
        Some(DirectiveRole::Loctr) => StatementKind::Loctr,
        Some(_) => StatementKind::Other,
    };

    Ok(Statement {
        label,
        opcode,
        kind,
        location,
    })
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

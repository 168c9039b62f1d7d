//! HLASM lexer: source line splitting and operand tokenizer.
//!
//! Source statements are read in free format:
//! - **Column 1**: label start (space = no label, `*` or `.*` = comment)
//! - Fields are separated by blanks; operands end at the first blank
//!   outside a quoted string
//! - **Column 72**: continuation character (non-blank = continued)
//! - Continuation lines resume at column 16

use std::fmt;

// ---------------------------------------------------------------------------
//  Source line parsing
// ---------------------------------------------------------------------------

/// A parsed HLASM source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    /// A full-line comment (`*` or `.*` in column 1).
    Comment(String),
    /// An instruction line with optional label, opcode, operands, remarks.
    Instruction(InstructionLine),
    /// A blank line.
    Blank,
}

/// A parsed instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLine {
    /// Name field, if column 1 is not blank.
    pub label: Option<String>,
    /// Operation code.
    pub opcode: String,
    /// Operand string (may be empty).
    pub operands: String,
    /// Remarks (trailing comment).
    pub remarks: String,
}

/// Parse a single logical source line into a `SourceLine`.
pub fn parse_source_line(raw: &str) -> SourceLine {
    if raw.starts_with('*') || raw.starts_with(".*") {
        return SourceLine::Comment(raw.to_string());
    }
    if raw.trim().is_empty() {
        return SourceLine::Blank;
    }

    let (label, rest) = if raw.starts_with(char::is_whitespace) {
        (None, raw)
    } else {
        let end = raw.find(char::is_whitespace).unwrap_or(raw.len());
        (Some(raw[..end].to_string()), &raw[end..])
    };

    let trimmed = rest.trim_start();
    let opcode_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let opcode = trimmed[..opcode_end].to_string();
    let (operands, remarks) = split_operands_remarks(trimmed[opcode_end..].trim_start());

    SourceLine::Instruction(InstructionLine {
        label,
        opcode,
        operands,
        remarks,
    })
}

fn is_continued(line: &str) -> bool {
    line.chars().nth(71).is_some_and(|c| c != ' ')
}

fn columns(line: &str, from: usize, to: usize) -> String {
    line.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// Parse multiple source lines with continuation handling.
///
/// Returns each logical line with the 1-based number of its first physical
/// line.
pub fn parse_source(source: &str) -> Vec<(u32, SourceLine)> {
    let raw_lines: Vec<&str> = source.lines().collect();
    let mut result = Vec::new();
    let mut i = 0;

    while i < raw_lines.len() {
        let line_no = i as u32 + 1;
        let line = raw_lines[i];

        if !is_continued(line) {
            result.push((line_no, parse_source_line(line)));
            i += 1;
            continue;
        }

        let mut combined = columns(line, 0, 71).trim_end().to_string();
        i += 1;
        while i < raw_lines.len() {
            let cont = raw_lines[i];
            combined.push_str(columns(cont, 15, 71).trim_end());
            i += 1;
            if !is_continued(cont) {
                break;
            }
        }
        result.push((line_no, parse_source_line(&combined)));
    }

    result
}

/// Whether the quote at `i` follows an attribute letter (`L'X`, `T'&V`)
/// rather than opening a string.
fn is_attribute_quote(chars: &[char], i: usize) -> bool {
    if i == 0 || !matches!(chars[i - 1].to_ascii_uppercase(), 'L' | 'T' | 'I' | 'S' | 'K' | 'N' | 'D' | 'O') {
        return false;
    }
    if i >= 2 && (chars[i - 2].is_ascii_alphanumeric() || matches!(chars[i - 2], '@' | '#' | '$' | '_')) {
        return false;
    }
    chars
        .get(i + 1)
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_' | '&'))
}

/// Split operand string from remarks. Respects quoted strings.
pub fn split_operands_remarks(text: &str) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    let mut in_quote = false;

    for (i, &c) in chars.iter().enumerate() {
        if c == '\'' {
            if in_quote || !is_attribute_quote(&chars, i) {
                in_quote = !in_quote;
            }
        } else if c.is_whitespace() && !in_quote {
            let operands: String = chars[..i].iter().collect();
            let remarks: String = chars[i..].iter().collect();
            return (operands.trim().to_string(), remarks.trim().to_string());
        }
    }

    (text.trim().to_string(), String::new())
}

/// Split at commas outside parentheses and quoted strings.
pub fn split_top_level_commas(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quote = false;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\'' if in_quote || !is_attribute_quote(&chars, i) => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth -= 1,
            ',' if !in_quote && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

/// Index of the parenthesis closing the one at `open`.
pub fn find_matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '\'' if in_quote || !is_attribute_quote(chars, i) => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
//  Token types
// ---------------------------------------------------------------------------

/// An HLASM operand token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A symbol/label reference.
    Symbol(String),
    /// A decimal number.
    Number(i64),
    /// A hex self-defining term: X'nn'.
    HexTerm(String),
    /// A character self-defining term: C'...'.
    CharTerm(String),
    /// A binary self-defining term: B'...'.
    BinTerm(String),
    /// An arithmetic operator: +, -, *, /.
    Operator(char),
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// Comma separator.
    Comma,
    /// A location counter reference: *.
    LocationCounter,
    /// Attribute reference such as `L'FIELD` or `T'&VAR`; the name keeps
    /// its leading `&` for variable symbols.
    Attribute(char, String),
    /// Variable symbol `&NAME`, without the `&`.
    Variable(String),
}

impl Token {
    fn ends_term(&self) -> bool {
        matches!(
            self,
            Token::Symbol(_)
                | Token::Number(_)
                | Token::HexTerm(_)
                | Token::CharTerm(_)
                | Token::BinTerm(_)
                | Token::RParen
                | Token::LocationCounter
                | Token::Attribute(..)
                | Token::Variable(_)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(s) => write!(f, "{s}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::HexTerm(h) => write!(f, "X'{h}'"),
            Token::CharTerm(c) => write!(f, "C'{c}'"),
            Token::BinTerm(b) => write!(f, "B'{b}'"),
            Token::Operator(o) => write!(f, "{o}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::LocationCounter => write!(f, "*"),
            Token::Attribute(a, s) => write!(f, "{a}'{s}"),
            Token::Variable(v) => write!(f, "&{v}"),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_')
}

/// Read a quoted string starting after the opening quote; `''` stands for
/// one quote. Returns the content and the index after the closing quote.
fn read_quoted(chars: &[char], mut i: usize) -> Result<(String, usize), LexerError> {
    let open = i.saturating_sub(1);
    let mut s = String::new();
    while i < chars.len() {
        if chars[i] == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                s.push('\'');
                i += 2;
                continue;
            }
            return Ok((s, i + 1));
        }
        s.push(chars[i]);
        i += 1;
    }
    Err(LexerError::UnterminatedString { column: open + 1 })
}

/// Tokenize an operand string into a vector of `Token`s.
pub fn tokenize_operands(operands: &str) -> Result<Vec<Token>, LexerError> {
    let mut tokens: Vec<Token> = Vec::new();
    let chars: Vec<char> = operands.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' | '-' | '/' => {
                tokens.push(Token::Operator(chars[i]));
                i += 1;
            }
            '*' => {
                // Multiply after a term, location counter otherwise.
                if tokens.last().is_some_and(Token::ends_term) {
                    tokens.push(Token::Operator('*'));
                } else {
                    tokens.push(Token::LocationCounter);
                }
                i += 1;
            }
            '&' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                if i == start {
                    return Err(LexerError::UnexpectedCharacter { ch: '&', column: start });
                }
                tokens.push(Token::Variable(chars[start..i].iter().collect::<String>().to_ascii_uppercase()));
            }
            c if c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_') => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_ascii_uppercase();

                if chars.get(i) != Some(&'\'') {
                    tokens.push(Token::Symbol(word));
                    continue;
                }
                if word.len() == 1 && is_attribute_quote(&chars, i) {
                    let name_start = i + 1;
                    i = name_start;
                    if chars[i] == '&' {
                        i += 1;
                    }
                    while i < chars.len() && is_name_char(chars[i]) {
                        i += 1;
                    }
                    let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_uppercase();
                    let letter = word.chars().next().unwrap_or('L');
                    tokens.push(Token::Attribute(letter, name));
                    continue;
                }
                let (val, next) = read_quoted(&chars, i + 1)?;
                i = next;
                match word.as_str() {
                    "X" => tokens.push(Token::HexTerm(val)),
                    "C" | "CA" | "CE" => tokens.push(Token::CharTerm(val)),
                    "B" => tokens.push(Token::BinTerm(val)),
                    _ => {
                        return Err(LexerError::UnexpectedCharacter {
                            ch: '\'',
                            column: start + word.len() + 1,
                        })
                    }
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let n = num_str
                    .parse::<i64>()
                    .map_err(|_| LexerError::NumberTooLarge { column: start + 1 })?;
                tokens.push(Token::Number(n));
            }
            c => return Err(LexerError::UnexpectedCharacter { ch: c, column: i + 1 }),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
//  Error types
// ---------------------------------------------------------------------------

/// HLASM lexer error. Columns are 1-based within the operand field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexerError {
    #[error("Unterminated string starting at column {column}")]
    UnterminatedString { column: usize },
    #[error("Unexpected character '{ch}' at column {column}")]
    UnexpectedCharacter { ch: char, column: usize },
    #[error("Number too large at column {column}")]
    NumberTooLarge { column: usize },
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

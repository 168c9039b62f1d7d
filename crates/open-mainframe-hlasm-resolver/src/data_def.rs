//! DC / DS operands: type codes and the attributes they imply.
//!
//! Covers implicit lengths, alignment, the type attribute, length modifier
//! bounds and the integer attribute formula of every supported type code.

use crate::expr::Expr;
use crate::space::Alignment;

// ---------------------------------------------------------------------------
//  Type codes
// ---------------------------------------------------------------------------

/// Floating-point representation selected by the type extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatFormat {
    /// No extension or `H`.
    Hex,
    /// `B`
    Binary,
    /// `D`
    Decimal,
}

/// A DC/DS type code with its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Address constant (A).
    A,
    /// Address doubleword (AD).
    Ad,
    /// Binary (B).
    B,
    /// Character (C).
    C,
    /// Character, ASCII (CA).
    Ca,
    /// Character, EBCDIC (CE).
    Ce,
    /// Character, Unicode (CU).
    Cu,
    /// Long floating-point (D, DH, DB, DD).
    D(FloatFormat),
    /// Short floating-point (E, EH, EB, ED).
    E(FloatFormat),
    /// Extended floating-point (L, LH, LB, LD).
    L(FloatFormat),
    /// Fullword fixed-point (F).
    F,
    /// Doubleword fixed-point (FD).
    Fd,
    /// Graphic DBCS (G).
    G,
    /// Halfword fixed-point (H).
    H,
    /// Class length (J).
    J,
    /// Packed decimal (P).
    P,
    /// External dummy section offset (Q).
    Q,
    /// External dummy section offset, doubleword (QD).
    Qd,
    /// PSECT address (R).
    R,
    /// PSECT address, doubleword (RD).
    Rd,
    /// Base-displacement address (S).
    S,
    /// External address (V).
    V,
    /// External address, doubleword (VD).
    Vd,
    /// Hexadecimal (X).
    X,
    /// Address halfword (Y).
    Y,
    /// Zoned decimal (Z).
    Z,
}

impl DataType {
    /// Parse a type code and optional extension character.
    pub fn from_code(code: char, extension: Option<char>) -> Option<Self> {
        let ext = extension.map(|c| c.to_ascii_uppercase());
        let float = |e: Option<char>| match e {
            None | Some('H') => Some(FloatFormat::Hex),
            Some('B') => Some(FloatFormat::Binary),
            Some('D') => Some(FloatFormat::Decimal),
            _ => None,
        };
        let t = match (code.to_ascii_uppercase(), ext) {
            ('A', None) => Self::A,
            ('A', Some('D')) => Self::Ad,
            ('B', None) => Self::B,
            ('C', None) => Self::C,
            ('C', Some('A')) => Self::Ca,
            ('C', Some('E')) => Self::Ce,
            ('C', Some('U')) => Self::Cu,
            ('D', e) => Self::D(float(e)?),
            ('E', e) => Self::E(float(e)?),
            ('L', e) => Self::L(float(e)?),
            ('F', None) => Self::F,
            ('F', Some('D')) => Self::Fd,
            ('G', None) => Self::G,
            ('H', None) => Self::H,
            ('J', None) => Self::J,
            ('P', None) => Self::P,
            ('Q', None) => Self::Q,
            ('Q', Some('D')) => Self::Qd,
            ('R', None) => Self::R,
            ('R', Some('D')) => Self::Rd,
            ('S', None) => Self::S,
            ('V', None) => Self::V,
            ('V', Some('D')) => Self::Vd,
            ('X', None) => Self::X,
            ('Y', None) => Self::Y,
            ('Z', None) => Self::Z,
            _ => return None,
        };
        Some(t)
    }

    /// Whether `ext` following `code` forms a two-character type code.
    pub fn is_extension(code: char, ext: char) -> bool {
        Self::from_code(code, Some(ext)).is_some()
    }

    /// Implicit length of one nominal value when it does not depend on the
    /// value itself.
    pub fn default_length(self) -> u32 {
        match self {
            Self::A | Self::Q | Self::R | Self::V | Self::J => 4,
            Self::Ad | Self::Qd | Self::Rd | Self::Vd | Self::Fd => 8,
            Self::B | Self::C | Self::Ca | Self::Ce | Self::P | Self::X | Self::Z => 1,
            Self::Cu | Self::G => 2,
            Self::D(_) => 8,
            Self::E(_) => 4,
            Self::L(_) => 16,
            Self::F => 4,
            Self::H | Self::S | Self::Y => 2,
        }
    }

    /// Boundary applied when no explicit length is given.
    pub fn alignment(self) -> Alignment {
        match self {
            Self::A | Self::Q | Self::R | Self::V | Self::J | Self::F | Self::E(_) => Alignment::FULLWORD,
            Self::Ad | Self::Qd | Self::Rd | Self::Vd | Self::Fd | Self::D(_) | Self::L(_) => Alignment::DOUBLEWORD,
            Self::H | Self::Y | Self::S => Alignment::HALFWORD,
            _ => Alignment::NONE,
        }
    }

    /// The type attribute letter; some types report a different letter when
    /// an explicit length is given.
    pub fn type_attr(self, explicit_length: bool) -> char {
        match self {
            Self::A | Self::Ad | Self::Q | Self::Qd | Self::R | Self::Rd | Self::S | Self::V | Self::Vd | Self::Y | Self::J
                if explicit_length =>
            {
                'R'
            }
            Self::F | Self::Fd | Self::H if explicit_length => 'G',
            Self::D(_) | Self::E(_) | Self::L(_) if explicit_length => 'K',
            Self::A | Self::Ad => 'A',
            Self::B => 'B',
            Self::C | Self::Ca | Self::Ce | Self::Cu => 'C',
            Self::D(_) => 'D',
            Self::E(_) => 'E',
            Self::L(_) => 'L',
            Self::F | Self::Fd => 'F',
            Self::G => '@',
            Self::H => 'H',
            Self::J => 'J',
            Self::P => 'P',
            Self::Q | Self::Qd => 'Q',
            Self::R | Self::Rd => 'R',
            Self::S => 'S',
            Self::V | Self::Vd => 'V',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Type code character used in messages.
    pub fn code(self) -> char {
        match self {
            Self::A | Self::Ad => 'A',
            Self::B => 'B',
            Self::C | Self::Ca | Self::Ce | Self::Cu => 'C',
            Self::D(_) => 'D',
            Self::E(_) => 'E',
            Self::L(_) => 'L',
            Self::F | Self::Fd => 'F',
            Self::G => 'G',
            Self::H => 'H',
            Self::J => 'J',
            Self::P => 'P',
            Self::Q | Self::Qd => 'Q',
            Self::R | Self::Rd => 'R',
            Self::S => 'S',
            Self::V | Self::Vd => 'V',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Allowed range of an explicit length modifier, in bytes.
    pub fn length_bounds(self, storage_only: bool) -> (i32, i32) {
        match self {
            Self::C | Self::Ca | Self::Ce | Self::X if storage_only => (1, 65535),
            Self::G if storage_only => (1, 65534),
            Self::B | Self::C | Self::Ca | Self::Ce | Self::Cu | Self::G | Self::X => (1, 256),
            Self::F | Self::Fd | Self::H => (1, 8),
            Self::P | Self::Z => (1, 16),
            Self::D(_) | Self::E(_) => (1, 8),
            Self::L(_) => (1, 16),
            Self::A | Self::Q => (1, 4),
            Self::Ad | Self::Qd | Self::Rd | Self::Vd => (1, 8),
            Self::R | Self::V => (3, 4),
            Self::J => (2, 4),
            Self::S => (2, 2),
            Self::Y => (1, 2),
        }
    }

    /// Whether nominal values are parenthesized expressions.
    pub fn takes_expressions(self) -> bool {
        matches!(
            self,
            Self::A | Self::Ad | Self::J | Self::Q | Self::Qd | Self::R | Self::Rd | Self::S | Self::V | Self::Vd | Self::Y
        )
    }

    /// Whether one quoted nominal holds a single value (commas included).
    fn single_string_value(self) -> bool {
        matches!(self, Self::C | Self::Ca | Self::Ce | Self::Cu | Self::G)
    }

    /// Whether S' is derived from the constant.
    pub fn has_scale(self) -> bool {
        matches!(
            self,
            Self::F | Self::Fd | Self::H | Self::P | Self::Z | Self::D(_) | Self::E(_) | Self::L(_)
        )
    }

    /// I' for a constant of this type with length `length` and scale
    /// `scale`.
    pub fn integer_attribute(self, length: u32, scale: i32) -> i32 {
        let l = length as i32;
        match self {
            Self::F | Self::Fd | Self::H => 8 * l - scale - 1,
            Self::P => 2 * l - scale - 1,
            Self::Z => l - scale,
            Self::D(FloatFormat::Hex) | Self::E(FloatFormat::Hex) | Self::L(FloatFormat::Hex) => {
                if length > 8 {
                    2 * (l - 1) - scale - 2
                } else {
                    2 * (l - 1) - scale
                }
            }
            _ => 0,
        }
    }

    /// Implicit length of one nominal value.
    fn value_length(self, value: &str) -> u32 {
        match self {
            Self::C | Self::Ca | Self::Ce => character_count(value).max(1),
            Self::Cu => 2 * character_count(value).max(1),
            Self::G => (value.chars().count() as u32).max(2),
            Self::X => {
                let digits = value.chars().filter(|c| c.is_ascii_hexdigit()).count() as u32;
                digits.div_ceil(2).max(1)
            }
            Self::B => {
                let bits = value.chars().filter(|c| *c == '0' || *c == '1').count() as u32;
                bits.div_ceil(8).max(1)
            }
            Self::P => (digit_count(value) + 2) / 2,
            Self::Z => digit_count(value).max(1),
            other => other.default_length(),
        }
    }
}

/// Characters of a C-type nominal, counting `&&` as one.
fn character_count(value: &str) -> u32 {
    value.replace("&&", "&").chars().count() as u32
}

fn digit_count(value: &str) -> u32 {
    value.chars().filter(char::is_ascii_digit).count() as u32
}

// ---------------------------------------------------------------------------
//  Operands
// ---------------------------------------------------------------------------

/// Length modifier `Ln`, `L(expr)` or `L.n` (bits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthModifier {
    pub expr: Expr,
    pub bits: bool,
}

/// Nominal value of a DC/DS operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nominal {
    /// Quoted string with doubled quotes collapsed.
    String(String),
    /// Parenthesized expression list of address constants.
    Exprs(Vec<Expr>),
}

/// One parsed DC/DS operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataOperand {
    pub duplication: Option<Expr>,
    pub data_type: DataType,
    pub length: Option<LengthModifier>,
    pub scale: Option<Expr>,
    pub exponent: Option<Expr>,
    pub nominal: Option<Nominal>,
}

impl DataOperand {
    pub fn new(data_type: DataType) -> Self {
        Self {
            duplication: None,
            data_type,
            length: None,
            scale: None,
            exponent: None,
            nominal: None,
        }
    }

    fn string_values(&self, value: &str) -> Vec<String> {
        if self.data_type.single_string_value() {
            vec![value.to_string()]
        } else {
            value.split(',').map(str::to_string).collect()
        }
    }

    /// Number of nominal values (at least one).
    pub fn value_count(&self) -> u32 {
        match &self.nominal {
            None => 1,
            Some(Nominal::String(s)) => self.string_values(s).len() as u32,
            Some(Nominal::Exprs(e)) => (e.len() as u32).max(1),
        }
    }

    /// Implicit length of the first value, the operand's length attribute
    /// when no modifier is given.
    pub fn implicit_length(&self) -> u32 {
        match &self.nominal {
            Some(Nominal::String(s)) => self
                .string_values(s)
                .first()
                .map_or(1, |v| self.data_type.value_length(v)),
            _ => self.data_type.default_length(),
        }
    }

    /// Bytes occupied by one duplication of the operand without a modifier.
    pub fn implicit_total(&self) -> u32 {
        match &self.nominal {
            Some(Nominal::String(s)) => self
                .string_values(s)
                .iter()
                .map(|v| self.data_type.value_length(v))
                .sum(),
            _ => self.data_type.default_length() * self.value_count(),
        }
    }

    /// Scale implied by the nominal value: fraction digits of P and Z.
    pub fn implicit_scale(&self) -> i32 {
        match (&self.nominal, self.data_type) {
            (Some(Nominal::String(s)), DataType::P | DataType::Z) => {
                let first = s.split(',').next().unwrap_or("");
                first
                    .split_once('.')
                    .map_or(0, |(_, frac)| frac.chars().filter(char::is_ascii_digit).count() as i32)
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(t: DataType, nominal: &str) -> DataOperand {
        let mut op = DataOperand::new(t);
        op.nominal = Some(Nominal::String(nominal.to_string()));
        op
    }

    #[test]
    fn test_from_code() {
        assert_eq!(DataType::from_code('F', None), Some(DataType::F));
        assert_eq!(DataType::from_code('c', None), Some(DataType::C));
        assert_eq!(DataType::from_code('A', Some('D')), Some(DataType::Ad));
        assert_eq!(DataType::from_code('D', Some('B')), Some(DataType::D(FloatFormat::Binary)));
        assert_eq!(DataType::from_code('!', None), None);
        assert!(DataType::is_extension('F', 'D'));
        assert!(!DataType::is_extension('F', 'S'));
        assert!(!DataType::is_extension('D', 'S'));
    }

    #[test]
    fn test_default_length() {
        assert_eq!(DataType::F.default_length(), 4);
        assert_eq!(DataType::H.default_length(), 2);
        assert_eq!(DataType::D(FloatFormat::Hex).default_length(), 8);
        assert_eq!(DataType::C.default_length(), 1);
        assert_eq!(DataType::S.default_length(), 2);
    }

    #[test]
    fn test_doubleword_types_align_on_eight() {
        assert_eq!(DataType::F.alignment(), Alignment::FULLWORD);
        assert_eq!(DataType::Fd.alignment(), Alignment::DOUBLEWORD);
        assert_eq!(DataType::Ad.alignment(), Alignment::DOUBLEWORD);
        assert_eq!(DataType::H.alignment(), Alignment::HALFWORD);
        assert_eq!(DataType::C.alignment(), Alignment::NONE);
    }

    #[test]
    fn test_type_attr_with_explicit_length() {
        assert_eq!(DataType::F.type_attr(false), 'F');
        assert_eq!(DataType::F.type_attr(true), 'G');
        assert_eq!(DataType::E(FloatFormat::Hex).type_attr(true), 'K');
        assert_eq!(DataType::A.type_attr(true), 'R');
        assert_eq!(DataType::C.type_attr(true), 'C');
    }

    #[test]
    fn test_integer_attribute() {
        assert_eq!(DataType::H.integer_attribute(2, 6), 9);
        assert_eq!(DataType::F.integer_attribute(4, 8), 23);
        assert_eq!(DataType::E(FloatFormat::Hex).integer_attribute(4, 2), 4);
        assert_eq!(DataType::D(FloatFormat::Hex).integer_attribute(8, 5), 9);
        assert_eq!(DataType::L(FloatFormat::Hex).integer_attribute(16, 10), 18);
        assert_eq!(DataType::P.integer_attribute(3, 2), 3);
        assert_eq!(DataType::Z.integer_attribute(5, 2), 3);
        assert_eq!(DataType::C.integer_attribute(5, 0), 0);
    }

    #[test]
    fn test_implicit_lengths() {
        assert_eq!(operand(DataType::C, "HELLO").implicit_length(), 5);
        assert_eq!(operand(DataType::C, "A,B").implicit_length(), 3);
        assert_eq!(operand(DataType::X, "FFF").implicit_length(), 2);
        assert_eq!(operand(DataType::B, "101").implicit_length(), 1);
        assert_eq!(operand(DataType::P, "-123").implicit_length(), 2);
        assert_eq!(operand(DataType::Z, "12.5").implicit_length(), 3);
        assert_eq!(operand(DataType::F, "1").implicit_length(), 4);
    }

    #[test]
    fn test_multiple_values() {
        let f = operand(DataType::F, "1,2,3");
        assert_eq!(f.value_count(), 3);
        assert_eq!(f.implicit_total(), 12);
        let x = operand(DataType::X, "01,0203");
        assert_eq!(x.implicit_length(), 1);
        assert_eq!(x.implicit_total(), 3);
        let mut s = DataOperand::new(DataType::S);
        s.nominal = Some(Nominal::Exprs(vec![Expr::Num(1)]));
        assert_eq!(s.implicit_total(), 2);
    }

    #[test]
    fn test_implicit_scale() {
        assert_eq!(operand(DataType::P, "12.345").implicit_scale(), 3);
        assert_eq!(operand(DataType::Z, "7").implicit_scale(), 0);
        assert_eq!(operand(DataType::F, "1.5").implicit_scale(), 0);
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(DataType::C.length_bounds(false), (1, 256));
        assert_eq!(DataType::C.length_bounds(true), (1, 65535));
        assert_eq!(DataType::F.length_bounds(false), (1, 8));
        assert_eq!(DataType::S.length_bounds(true), (2, 2));
    }
}

//! EBCDIC code points for attribute values and character terms.
//!
//! Type (`T'`) and opcode (`O'`) attributes are stored as the EBCDIC code of
//! their classification letter, and `C'..'` self-defining terms evaluate to
//! the EBCDIC bytes of their characters.

/// EBCDIC code of a printable ASCII character. Unmapped characters become a
/// blank (0x40).
pub fn from_ascii(ch: char) -> u8 {
    match ch {
        ' ' => 0x40,
        '0'..='9' => 0xF0 + (ch as u8 - b'0'),
        'A'..='I' => 0xC1 + (ch as u8 - b'A'),
        'J'..='R' => 0xD1 + (ch as u8 - b'J'),
        'S'..='Z' => 0xE2 + (ch as u8 - b'S'),
        'a'..='i' => 0x81 + (ch as u8 - b'a'),
        'j'..='r' => 0x91 + (ch as u8 - b'j'),
        's'..='z' => 0xA2 + (ch as u8 - b's'),
        '.' => 0x4B,
        '<' => 0x4C,
        '(' => 0x4D,
        '+' => 0x4E,
        '&' => 0x50,
        '!' => 0x5A,
        '$' => 0x5B,
        '*' => 0x5C,
        ')' => 0x5D,
        ';' => 0x5E,
        '-' => 0x60,
        '/' => 0x61,
        ',' => 0x6B,
        '%' => 0x6C,
        '_' => 0x6D,
        '>' => 0x6E,
        '?' => 0x6F,
        ':' => 0x7A,
        '#' => 0x7B,
        '@' => 0x7C,
        '\'' => 0x7D,
        '=' => 0x7E,
        '"' => 0x7F,
        _ => 0x40,
    }
}

/// Inverse of [`from_ascii`] for letters, digits and the common specials.
pub fn to_ascii(code: u8) -> Option<char> {
    let ch = match code {
        0x40 => ' ',
        0xF0..=0xF9 => (b'0' + (code - 0xF0)) as char,
        0xC1..=0xC9 => (b'A' + (code - 0xC1)) as char,
        0xD1..=0xD9 => (b'J' + (code - 0xD1)) as char,
        0xE2..=0xE9 => (b'S' + (code - 0xE2)) as char,
        0x81..=0x89 => (b'a' + (code - 0x81)) as char,
        0x91..=0x99 => (b'j' + (code - 0x91)) as char,
        0xA2..=0xA9 => (b's' + (code - 0xA2)) as char,
        0x4B => '.',
        0x4D => '(',
        0x4E => '+',
        0x50 => '&',
        0x5B => '$',
        0x5C => '*',
        0x5D => ')',
        0x60 => '-',
        0x61 => '/',
        0x6B => ',',
        0x6D => '_',
        0x7B => '#',
        0x7C => '@',
        0x7D => '\'',
        0x7E => '=',
        _ => return None,
    };
    Some(ch)
}

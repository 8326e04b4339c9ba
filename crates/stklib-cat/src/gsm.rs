//! GSM 03.38 default alphabet encoding for user-entered text.
//!
//! GET INPUT / GET INKEY answers are returned in the coding the card asked
//! for: UCS2, packed 7-bit septets, or unpacked septets (one per octet,
//! the "SMS 8-bit data" form). Characters from the extension table are
//! prefixed with the escape septet `0x1B`. Characters outside both tables
//! are replaced with `?`.

use tracing::debug;

/// Escape septet that selects the extension table for the next septet.
pub const ESCAPE: u8 = 0x1B;

/// Septet used for characters the alphabet cannot represent.
const REPLACEMENT: u8 = 0x3F;

/// Default alphabet, indexed by septet. Index 0x1B is the escape and never
/// matches a character.
const DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{FFFF}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Extension table entries as (septet after escape, character).
const EXTENSION_TABLE: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Append the septet(s) for one character.
fn push_septets(out: &mut Vec<u8>, c: char) {
    if let Some(pos) = DEFAULT_ALPHABET
        .iter()
        .position(|&a| a == c && c != '\u{FFFF}')
    {
        out.push(pos as u8);
    } else if let Some(&(septet, _)) = EXTENSION_TABLE.iter().find(|&&(_, e)| e == c) {
        out.push(ESCAPE);
        out.push(septet);
    } else {
        debug!(ch = %c.escape_unicode(), "character not in GSM alphabet, substituting '?'");
        out.push(REPLACEMENT);
    }
}

/// Convert text to GSM septets, one septet per byte.
///
/// # Example
///
/// ```
/// use stklib_cat::gsm::encode_unpacked;
///
/// assert_eq!(encode_unpacked("Hi@"), vec![0x48, 0x69, 0x00]);
/// assert_eq!(encode_unpacked("€"), vec![0x1B, 0x65]);
/// ```
pub fn encode_unpacked(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        push_septets(&mut out, c);
    }
    out
}

/// Pack septets into octets, least significant bit first.
pub fn pack_septets(septets: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((septets.len() * 7).div_ceil(8));
    let mut acc: u16 = 0;
    let mut bits = 0u32;
    for &septet in septets {
        acc |= u16::from(septet & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        out.push(acc as u8);
    }
    out
}

/// Convert text to packed GSM 7-bit octets.
///
/// # Example
///
/// ```
/// use stklib_cat::gsm::encode_packed;
///
/// assert_eq!(encode_packed("ABC"), vec![0x41, 0xE1, 0x10]);
/// ```
pub fn encode_packed(text: &str) -> Vec<u8> {
    pack_septets(&encode_unpacked(text))
}

/// Convert text to big-endian UCS2.
pub fn encode_ucs2(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

//! Comprehension-TLV and BER-TLV writer primitives.
//!
//! Terminal responses are a flat sequence of comprehension-TLV (simple-TLV)
//! objects; envelopes wrap the same objects inside one BER-TLV with a
//! single-byte tag. This module provides the byte-level pieces shared by
//! [`crate::response`] and [`crate::envelope`].
//!
//! # Length encoding
//!
//! ```text
//! 0x00..=0x7F   -> one byte:  <len>
//! 0x80..=0xFF   -> two bytes: 0x81 <len>
//! ```
//!
//! Longer values never occur in toolkit traffic handled here and are
//! rejected with [`Error::Encoding`].

use bytes::{BufMut, BytesMut};
use stklib_core::{COMPREHENSION_REQUIRED, Error, Result};

/// Marker byte introducing the two-byte length form.
pub const LENGTH_EXTENSION: u8 = 0x81;

/// Largest length representable in the single-byte form.
pub const MAX_SHORT_LENGTH: usize = 0x7F;

/// Largest length this encoder supports.
pub const MAX_LENGTH: usize = 0xFF;

/// Apply the comprehension-required bit to a tag when asked.
pub fn tag_with_cr(tag: u8, comprehension_required: bool) -> u8 {
    if comprehension_required {
        tag | COMPREHENSION_REQUIRED
    } else {
        tag
    }
}

/// Number of bytes [`write_length`] produces for `len`.
pub fn length_size(len: usize) -> usize {
    if len > MAX_SHORT_LENGTH { 2 } else { 1 }
}

/// Append a TLV length, using the extended form for values of 0x80 or more.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use stklib_cat::tlv::write_length;
///
/// let mut buf = BytesMut::new();
/// write_length(&mut buf, 0x05).unwrap();
/// write_length(&mut buf, 0x90).unwrap();
/// assert_eq!(&buf[..], &[0x05, 0x81, 0x90]);
/// ```
pub fn write_length(buf: &mut BytesMut, len: usize) -> Result<()> {
    if len > MAX_LENGTH {
        return Err(Error::Encoding(format!(
            "TLV length {len} exceeds {MAX_LENGTH}"
        )));
    }
    if len > MAX_SHORT_LENGTH {
        buf.put_u8(LENGTH_EXTENSION);
    }
    buf.put_u8(len as u8);
    Ok(())
}

/// Append a complete TLV object: tag byte, length, value.
pub fn write_tlv(buf: &mut BytesMut, tag: u8, value: &[u8]) -> Result<()> {
    buf.reserve(1 + length_size(value.len()) + value.len());
    buf.put_u8(tag);
    write_length(buf, value.len())?;
    buf.put_slice(value);
    Ok(())
}

/// Start a BER-TLV envelope: the tag followed by a zero length placeholder.
///
/// Finish it with [`fix_up_envelope_length`] once all objects are written.
pub fn begin_envelope(tag: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(32);
    buf.put_u8(tag);
    buf.put_u8(0x00);
    buf
}

/// Rewrite the length placeholder at index 1 of an envelope.
///
/// The placeholder becomes `total - 2`. When the content is 0x80 bytes or
/// longer the placeholder is widened in place to the `0x81 <len>` form.
///
/// # Example
///
/// ```
/// use stklib_cat::tlv::fix_up_envelope_length;
///
/// let mut env = vec![0xD3, 0x00, 0x82, 0x02, 0x01, 0x81];
/// fix_up_envelope_length(&mut env).unwrap();
/// assert_eq!(env[1], 0x04);
/// ```
pub fn fix_up_envelope_length(bytes: &mut Vec<u8>) -> Result<()> {
    if bytes.len() < 2 {
        return Err(Error::Encoding(
            "envelope shorter than its tag and length".into(),
        ));
    }
    let content_len = bytes.len() - 2;
    if content_len > MAX_LENGTH {
        return Err(Error::Encoding(format!(
            "envelope content {content_len} exceeds {MAX_LENGTH}"
        )));
    }
    if content_len > MAX_SHORT_LENGTH {
        bytes[1] = LENGTH_EXTENSION;
        bytes.insert(2, content_len as u8);
    } else {
        bytes[1] = content_len as u8;
    }
    Ok(())
}

/// Render bytes as upper-case hex, the form the RIL transport expects.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

//! TERMINAL RESPONSE encoder.
//!
//! A terminal response is a flat sequence of comprehension-TLV objects:
//!
//! ```text
//! 01|81 03 <number> <type> <qualifier>     COMMAND DETAILS
//! 02    02 82 81                           DEVICE IDENTITIES (terminal -> UICC)
//! 83    01|02 <result> [<additional info>] RESULT
//! [response data | command-specific optional objects]
//! ```
//!
//! DEVICE IDENTITIES never carries the comprehension-required bit: TS 102 223
//! section 6.8 requires CR=0 for every Min=N simple-TLV in a terminal
//! response.
//!
//! All functions are pure -- they produce byte vectors without performing
//! any I/O. The engine renders the bytes as hex and passes them to the
//! [`RilTransport`](stklib_core::RilTransport).

use bytes::{BufMut, BytesMut};
use tracing::debug;

use stklib_core::{
    CommandDetails, CommandType, ComprehensionTag, DeviceIdentity, Input, LANGUAGE_SETTING,
    Result, ResultCode, TimeUnit,
};

use crate::gsm;
use crate::tlv::{tag_with_cr, write_length, write_tlv};

/// TEXT STRING value answering "yes" to a yes/no GET INKEY.
pub const GET_INKEY_YES: u8 = 0x01;

/// TEXT STRING value answering "no" to a yes/no GET INKEY.
pub const GET_INKEY_NO: u8 = 0x00;

/// Data coding scheme: GSM 7-bit packed.
pub const DCS_7BIT_PACKED: u8 = 0x00;

/// Data coding scheme: 8-bit data (unpacked GSM septets).
pub const DCS_8BIT: u8 = 0x04;

/// Data coding scheme: UCS2.
pub const DCS_UCS2: u8 = 0x08;

/// Command-specific payload appended after the RESULT object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    /// SELECT ITEM: the chosen item identifier.
    SelectItem { id: u8 },
    /// GET INPUT / GET INKEY: text entered by the user, encoded according
    /// to the command's coding flags.
    GetInput {
        text: String,
        ucs2: bool,
        packed: bool,
    },
    /// GET INKEY in yes/no mode.
    YesNo(bool),
    /// PROVIDE LOCAL INFORMATION (language setting): ISO 639 language code.
    Language(String),
}

impl ResponseData {
    /// Append this payload's TLV object(s) to `buf`.
    pub fn format(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            ResponseData::SelectItem { id } => {
                write_tlv(buf, ComprehensionTag::ItemId.with_cr(), &[*id])
            }
            ResponseData::GetInput { text, ucs2, packed } => {
                let data = if text.is_empty() {
                    Vec::new()
                } else if *ucs2 {
                    gsm::encode_ucs2(text)
                } else if *packed {
                    gsm::encode_packed(text)
                } else {
                    gsm::encode_unpacked(text)
                };
                let dcs = if *ucs2 {
                    DCS_UCS2
                } else if *packed {
                    DCS_7BIT_PACKED
                } else {
                    DCS_8BIT
                };
                write_text_string(buf, dcs, &data)
            }
            ResponseData::YesNo(yes) => {
                let value = if *yes { GET_INKEY_YES } else { GET_INKEY_NO };
                write_text_string(buf, DCS_8BIT, &[value])
            }
            ResponseData::Language(code) => {
                write_tlv(buf, ComprehensionTag::Language.value(), code.as_bytes())
            }
        }
    }
}

/// TEXT STRING object: the length covers the coding scheme byte plus data.
fn write_text_string(buf: &mut BytesMut, dcs: u8, data: &[u8]) -> Result<()> {
    buf.put_u8(ComprehensionTag::TextString.with_cr());
    write_length(buf, data.len() + 1)?;
    buf.put_u8(dcs);
    buf.put_slice(data);
    Ok(())
}

/// Context used to derive command-specific optional objects when the
/// response carries no [`ResponseData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalTags<'a> {
    /// Input descriptor of the command being answered.
    pub input: Option<&'a Input>,
    /// Language code reported for PROVIDE LOCAL INFORMATION.
    pub language: Option<&'a str>,
}

/// Encode a complete terminal response.
///
/// `additional_info` adds a second byte to the RESULT object. When `data`
/// is `None`, command-specific optional objects are derived from
/// `optional`.
///
/// # Example
///
/// ```
/// use stklib_cat::response::{encode_terminal_response, OptionalTags, ResponseData};
/// use stklib_core::{CommandDetails, CommandType, ResultCode};
///
/// let details = CommandDetails::new(1, CommandType::SelectItem, 0);
/// let bytes = encode_terminal_response(
///     &details,
///     ResultCode::Ok,
///     None,
///     Some(&ResponseData::SelectItem { id: 3 }),
///     OptionalTags::default(),
/// )
/// .unwrap();
/// assert_eq!(
///     bytes,
///     vec![
///         0x81, 0x03, 0x01, 0x24, 0x00, 0x02, 0x02, 0x82, 0x81, 0x83, 0x01, 0x00, 0x90,
///         0x01, 0x03,
///     ]
/// );
/// ```
pub fn encode_terminal_response(
    details: &CommandDetails,
    result: ResultCode,
    additional_info: Option<u8>,
    data: Option<&ResponseData>,
    optional: OptionalTags<'_>,
) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(32);

    buf.put_u8(tag_with_cr(
        ComprehensionTag::CommandDetails.value(),
        details.comprehension_required,
    ));
    buf.put_u8(0x03);
    buf.put_u8(details.command_number);
    buf.put_u8(details.type_of_command);
    buf.put_u8(details.command_qualifier);

    buf.put_u8(ComprehensionTag::DeviceIdentities.value());
    buf.put_u8(0x02);
    buf.put_u8(DeviceIdentity::Terminal.value());
    buf.put_u8(DeviceIdentity::Uicc.value());

    buf.put_u8(ComprehensionTag::Result.with_cr());
    match additional_info {
        Some(info) => {
            buf.put_u8(0x02);
            buf.put_u8(result.value());
            buf.put_u8(info);
        }
        None => {
            buf.put_u8(0x01);
            buf.put_u8(result.value());
        }
    }

    match data {
        Some(data) => data.format(&mut buf)?,
        None => encode_optional_tags(&mut buf, details, result, optional)?,
    }

    Ok(buf.to_vec())
}

/// Append the optional objects a command type requires when the host
/// supplied no payload.
fn encode_optional_tags(
    buf: &mut BytesMut,
    details: &CommandDetails,
    result: ResultCode,
    optional: OptionalTags<'_>,
) -> Result<()> {
    match details.command_type() {
        Some(CommandType::GetInkey) => {
            // Variable timeout expired: echo the duration back (TS 102 384 27.22.4.2.8).
            if result == ResultCode::NoResponseFromUser {
                if let Some(duration) = optional.input.and_then(|input| input.duration) {
                    buf.put_u8(ComprehensionTag::Duration.value());
                    buf.put_u8(0x02);
                    buf.put_u8(TimeUnit::Second.value());
                    buf.put_u8(duration.time_interval);
                }
            }
            Ok(())
        }
        Some(CommandType::ProvideLocalInformation) => {
            if details.command_qualifier == LANGUAGE_SETTING && result == ResultCode::Ok {
                if let Some(language) = optional.language {
                    ResponseData::Language(language.to_string()).format(buf)?;
                }
            }
            Ok(())
        }
        _ => {
            debug!(details = %details, "no optional objects for command");
            Ok(())
        }
    }
}

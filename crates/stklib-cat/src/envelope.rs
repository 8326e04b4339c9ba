//! ENVELOPE encoders: menu selection and event download.
//!
//! Envelopes are terminal-initiated BER-TLVs sent outside the proactive
//! command / terminal response cycle:
//!
//! ```text
//! D3 <len> 82 02 01 81  90 01 <item>  [15 00]              MENU SELECTION
//! D6 <len> 99 01 <event>  82 02 <src> <dst>  [<event obj>] [<added info>]
//!                                                          EVENT DOWNLOAD
//! ```
//!
//! The length byte is written as a placeholder and rewritten to
//! `total - 2` once the body is complete.

use bytes::BufMut;
use tracing::debug;

use stklib_core::{BerTag, ComprehensionTag, DeviceIdentity, EventCode, Result};

use crate::tlv::{begin_envelope, fix_up_envelope_length};

/// Encode a MENU SELECTION envelope for the item the user picked from the
/// SET UP MENU menu. `help_requested` adds an empty HELP REQUEST object.
///
/// # Example
///
/// ```
/// use stklib_cat::envelope::encode_menu_selection;
///
/// let env = encode_menu_selection(2, false).unwrap();
/// assert_eq!(env, vec![0xD3, 0x07, 0x82, 0x02, 0x01, 0x81, 0x90, 0x01, 0x02]);
/// ```
pub fn encode_menu_selection(item_id: u8, help_requested: bool) -> Result<Vec<u8>> {
    let mut buf = begin_envelope(BerTag::MenuSelection.value());

    buf.put_u8(ComprehensionTag::DeviceIdentities.with_cr());
    buf.put_u8(0x02);
    buf.put_u8(DeviceIdentity::Keypad.value());
    buf.put_u8(DeviceIdentity::Uicc.value());

    buf.put_u8(ComprehensionTag::ItemId.with_cr());
    buf.put_u8(0x01);
    buf.put_u8(item_id);

    if help_requested {
        buf.put_u8(ComprehensionTag::HelpRequest.value());
        buf.put_u8(0x00);
    }

    let mut bytes = buf.to_vec();
    fix_up_envelope_length(&mut bytes)?;
    Ok(bytes)
}

/// Encode an EVENT DOWNLOAD envelope.
///
/// The event-specific object header depends on `event`: BROWSER TERMINATION
/// gets a one-byte BROWSER TERMINATION CAUSE header, LANGUAGE SELECTION a
/// two-byte LANGUAGE header, IDLE SCREEN AVAILABLE nothing. The values for
/// those headers come from `added_info`, which is appended verbatim. Other
/// event codes get no event-specific header.
///
/// # Example
///
/// ```
/// use stklib_cat::envelope::encode_event_download;
///
/// // Idle screen available, reported by the display.
/// let env = encode_event_download(0x05, 0x02, 0x81, &[]).unwrap();
/// assert_eq!(env, vec![0xD6, 0x07, 0x99, 0x01, 0x05, 0x82, 0x02, 0x02, 0x81]);
/// ```
pub fn encode_event_download(
    event: u8,
    source: u8,
    destination: u8,
    added_info: &[u8],
) -> Result<Vec<u8>> {
    let mut buf = begin_envelope(BerTag::EventDownload.value());

    buf.put_u8(ComprehensionTag::EventList.with_cr());
    buf.put_u8(0x01);
    buf.put_u8(event);

    buf.put_u8(ComprehensionTag::DeviceIdentities.with_cr());
    buf.put_u8(0x02);
    buf.put_u8(source);
    buf.put_u8(destination);

    match EventCode::from_value(event) {
        Some(EventCode::IdleScreenAvailable) => {}
        Some(EventCode::LanguageSelection) => {
            buf.put_u8(ComprehensionTag::Language.with_cr());
            buf.put_u8(0x02);
        }
        Some(EventCode::BrowserTermination) => {
            buf.put_u8(ComprehensionTag::BrowserTerminationCause.with_cr());
            buf.put_u8(0x01);
        }
        _ => {
            debug!(event, "no event-specific object for event download");
        }
    }

    buf.put_slice(added_info);

    let mut bytes = buf.to_vec();
    fix_up_envelope_length(&mut bytes)?;
    Ok(bytes)
}

//! Wire vocabulary for the card application toolkit.
//!
//! Every enumeration here is closed and carries the numeric value that
//! appears on the wire (ETSI TS 102 223 / 3GPP TS 31.111). Each type offers
//! `value()` for encoding and `from_value()` / `TryFrom<u8>` for the reverse
//! lookup from a raw byte back to its symbol.

use std::fmt;

use crate::error::Error;

/// Bit set on a comprehension-TLV tag when the receiver must understand it.
pub const COMPREHENSION_REQUIRED: u8 = 0x80;

/// Declares a `u8`-backed wire enum with its value table, reverse lookup,
/// `TryFrom<u8>` and `Display` (which prints the symbolic name).
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every symbol in wire-value order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// The numeric value used on the wire.
            pub fn value(self) -> u8 {
                match self {
                    $( $name::$variant => $value, )+
                }
            }

            /// Reverse lookup from a wire byte. Returns `None` for unknown values.
            pub fn from_value(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Symbolic name as used in TS 102 223.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
                $name::from_value(value).ok_or(Error::UnknownValue { kind: $kind, value })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.name())
            }
        }
    };
}

wire_enum! {
    /// Comprehension-TLV tag identifiers (TS 102 223 section 9.3), without
    /// the comprehension-required bit.
    ComprehensionTag, "comprehension tag" {
        CommandDetails = 0x01 => "COMMAND_DETAILS",
        DeviceIdentities = 0x02 => "DEVICE_IDENTITIES",
        Result = 0x03 => "RESULT",
        Duration = 0x04 => "DURATION",
        AlphaId = 0x05 => "ALPHA_ID",
        Address = 0x06 => "ADDRESS",
        UssdString = 0x0A => "USSD_STRING",
        SmsTpdu = 0x0B => "SMS_TPDU",
        TextString = 0x0D => "TEXT_STRING",
        Tone = 0x0E => "TONE",
        Item = 0x0F => "ITEM",
        ItemId = 0x10 => "ITEM_ID",
        ResponseLength = 0x11 => "RESPONSE_LENGTH",
        FileList = 0x12 => "FILE_LIST",
        HelpRequest = 0x15 => "HELP_REQUEST",
        DefaultText = 0x17 => "DEFAULT_TEXT",
        EventList = 0x19 => "EVENT_LIST",
        IconId = 0x1E => "ICON_ID",
        ItemIconIdList = 0x1F => "ITEM_ICON_ID_LIST",
        ImmediateResponse = 0x2B => "IMMEDIATE_RESPONSE",
        Language = 0x2D => "LANGUAGE",
        Url = 0x31 => "URL",
        BrowserTerminationCause = 0x34 => "BROWSER_TERMINATION_CAUSE",
        TextAttribute = 0x50 => "TEXT_ATTRIBUTE",
    }
}

impl ComprehensionTag {
    /// The tag byte with the comprehension-required bit set.
    pub fn with_cr(self) -> u8 {
        self.value() | COMPREHENSION_REQUIRED
    }
}

wire_enum! {
    /// General result of a terminal response (TS 102 223 section 8.12).
    ResultCode, "result code" {
        /// Command performed successfully.
        Ok = 0x00 => "OK",
        PrfrmdWithPartialComprehension = 0x01 => "PRFRMD_WITH_PARTIAL_COMPREHENSION",
        PrfrmdWithMissingInfo = 0x02 => "PRFRMD_WITH_MISSING_INFO",
        PrfrmdWithAdditionalEfsRead = 0x03 => "PRFRMD_WITH_ADDITIONAL_EFS_READ",
        /// Performed, but the requested icon could not be displayed.
        PrfrmdIconNotDisplayed = 0x04 => "PRFRMD_ICON_NOT_DISPLAYED",
        PrfrmdModifiedByNaa = 0x05 => "PRFRMD_MODIFIED_BY_NAA",
        PrfrmdLimitedService = 0x06 => "PRFRMD_LIMITED_SERVICE",
        PrfrmdWithModification = 0x07 => "PRFRMD_WITH_MODIFICATION",
        PrfrmdNaaNotActive = 0x08 => "PRFRMD_NAA_NOT_ACTIVE",
        PrfrmdToneNotPlayed = 0x09 => "PRFRMD_TONE_NOT_PLAYED",
        UiccSessionTermByUser = 0x10 => "UICC_SESSION_TERM_BY_USER",
        BackwardMoveByUser = 0x11 => "BACKWARD_MOVE_BY_USER",
        NoResponseFromUser = 0x12 => "NO_RESPONSE_FROM_USER",
        HelpInfoRequired = 0x13 => "HELP_INFO_REQUIRED",
        UssdSsSessionTermByUser = 0x14 => "USSD_SS_SESSION_TERM_BY_USER",
        TerminalCrntlyUnableToProcess = 0x20 => "TERMINAL_CRNTLY_UNABLE_TO_PROCESS",
        NetworkCrntlyUnableToProcess = 0x21 => "NETWORK_CRNTLY_UNABLE_TO_PROCESS",
        UserNotAccept = 0x22 => "USER_NOT_ACCEPT",
        UserClearDownCall = 0x23 => "USER_CLEAR_DOWN_CALL",
        ContradictionWithTimer = 0x24 => "CONTRADICTION_WITH_TIMER",
        NaaCallControlTemporary = 0x25 => "NAA_CALL_CONTROL_TEMPORARY",
        LaunchBrowserError = 0x26 => "LAUNCH_BROWSER_ERROR",
        MmsTemporary = 0x27 => "MMS_TEMPORARY",
        BeyondTerminalCapability = 0x30 => "BEYOND_TERMINAL_CAPABILITY",
        CmdTypeNotUnderstood = 0x31 => "CMD_TYPE_NOT_UNDERSTOOD",
        CmdDataNotUnderstood = 0x32 => "CMD_DATA_NOT_UNDERSTOOD",
        CmdNumNotKnown = 0x33 => "CMD_NUM_NOT_KNOWN",
        SsReturnError = 0x34 => "SS_RETURN_ERROR",
        SmsRpError = 0x35 => "SMS_RP_ERROR",
        RequiredValuesMissing = 0x36 => "REQUIRED_VALUES_MISSING",
        UssdReturnError = 0x37 => "USSD_RETURN_ERROR",
        MultiCardsCmdError = 0x38 => "MULTI_CARDS_CMD_ERROR",
        UsimCallControlPermanent = 0x39 => "USIM_CALL_CONTROL_PERMANENT",
        BipError = 0x3A => "BIP_ERROR",
        AccessTechUnableToProcess = 0x3B => "ACCESS_TECH_UNABLE_TO_PROCESS",
        FramesError = 0x3C => "FRAMES_ERROR",
        MmsError = 0x3D => "MMS_ERROR",
    }
}

impl ResultCode {
    /// Returns `true` for OK and the `PRFRMD_*` partial-success codes.
    pub fn is_success(self) -> bool {
        self.value() <= ResultCode::PrfrmdToneNotPlayed.value()
    }
}

wire_enum! {
    /// Proactive command types (TS 102 223 section 9.4).
    CommandType, "command type" {
        Refresh = 0x01 => "REFRESH",
        MoreTime = 0x02 => "MORE_TIME",
        PollInterval = 0x03 => "POLL_INTERVAL",
        PollingOff = 0x04 => "POLLING_OFF",
        SetUpEventList = 0x05 => "SET_UP_EVENT_LIST",
        SetUpCall = 0x10 => "SET_UP_CALL",
        SendSs = 0x11 => "SEND_SS",
        SendUssd = 0x12 => "SEND_USSD",
        SendSms = 0x13 => "SEND_SMS",
        SendDtmf = 0x14 => "SEND_DTMF",
        LaunchBrowser = 0x15 => "LAUNCH_BROWSER",
        PlayTone = 0x20 => "PLAY_TONE",
        DisplayText = 0x21 => "DISPLAY_TEXT",
        GetInkey = 0x22 => "GET_INKEY",
        GetInput = 0x23 => "GET_INPUT",
        SelectItem = 0x24 => "SELECT_ITEM",
        SetUpMenu = 0x25 => "SET_UP_MENU",
        ProvideLocalInformation = 0x26 => "PROVIDE_LOCAL_INFORMATION",
        TimerManagement = 0x27 => "TIMER_MANAGEMENT",
        SetUpIdleModeText = 0x28 => "SET_UP_IDLE_MODE_TEXT",
        LanguageNotification = 0x35 => "LANGUAGE_NOTIFICATION",
        OpenChannel = 0x40 => "OPEN_CHANNEL",
        CloseChannel = 0x41 => "CLOSE_CHANNEL",
        ReceiveData = 0x42 => "RECEIVE_DATA",
        SendData = 0x43 => "SEND_DATA",
        GetChannelStatus = 0x44 => "GET_CHANNEL_STATUS",
    }
}

wire_enum! {
    /// Device identities used in the DEVICE_IDENTITIES object (TS 102 223 8.7).
    DeviceIdentity, "device identity" {
        Keypad = 0x01 => "KEYPAD",
        Display = 0x02 => "DISPLAY",
        Earpiece = 0x03 => "EARPIECE",
        Uicc = 0x81 => "UICC",
        Terminal = 0x82 => "TERMINAL",
        Network = 0x83 => "NETWORK",
    }
}

wire_enum! {
    /// BER-TLV tags framing proactive commands and envelopes.
    BerTag, "BER tag" {
        ProactiveCommand = 0xD0 => "PROACTIVE_COMMAND",
        MenuSelection = 0xD3 => "MENU_SELECTION",
        EventDownload = 0xD6 => "EVENT_DOWNLOAD",
    }
}

wire_enum! {
    /// Event codes carried in EVENT_LIST objects (TS 102 223 section 8.25).
    EventCode, "event code" {
        MtCall = 0x00 => "MT_CALL",
        CallConnected = 0x01 => "CALL_CONNECTED",
        CallDisconnected = 0x02 => "CALL_DISCONNECTED",
        LocationStatus = 0x03 => "LOCATION_STATUS",
        UserActivity = 0x04 => "USER_ACTIVITY",
        IdleScreenAvailable = 0x05 => "IDLE_SCREEN_AVAILABLE",
        CardReaderStatus = 0x06 => "CARD_READER_STATUS",
        LanguageSelection = 0x07 => "LANGUAGE_SELECTION",
        BrowserTermination = 0x08 => "BROWSER_TERMINATION",
        DataAvailable = 0x09 => "DATA_AVAILABLE",
        ChannelStatus = 0x0A => "CHANNEL_STATUS",
    }
}

impl EventCode {
    /// Events this terminal can report through an event-download envelope.
    pub const SUPPORTED: [EventCode; 3] = [
        EventCode::BrowserTermination,
        EventCode::IdleScreenAvailable,
        EventCode::LanguageSelection,
    ];

    /// Returns `true` if a raw event byte is in [`EventCode::SUPPORTED`].
    pub fn is_supported(value: u8) -> bool {
        EventCode::SUPPORTED.iter().any(|e| e.value() == value)
    }
}

wire_enum! {
    /// Time unit of a DURATION object (TS 102 223 section 8.8).
    TimeUnit, "time unit" {
        Minute = 0x00 => "MINUTE",
        Second = 0x01 => "SECOND",
        TenthSecond = 0x02 => "TENTH_SECOND",
    }
}

wire_enum! {
    /// Outcome reported by the modem after the card asked for a REFRESH of
    /// its files or application.
    RefreshResult, "refresh result" {
        /// Some files on the card changed.
        FileUpdate = 0x00 => "FILE_UPDATE",
        /// The card application was re-initialised.
        Init = 0x01 => "INIT",
        /// The card was reset.
        Reset = 0x02 => "RESET",
    }
}

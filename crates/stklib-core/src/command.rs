//! Proactive command and host response model.
//!
//! A proactive command arrives from the (external) raw-message decoder as
//! [`CommandParams`]. The engine turns it into a [`CatCmdMessage`], the
//! public representation handed to the host application. The host answers
//! with a [`CatResponseMessage`], which the engine correlates against the
//! outstanding command before encoding anything for the card.

use std::fmt;

use crate::types::{CommandType, EventCode, ResultCode, TimeUnit};

/// Qualifier of PROVIDE LOCAL INFORMATION asking for the language setting.
pub const LANGUAGE_SETTING: u8 = 0x04;

/// The COMMAND DETAILS object of a proactive command.
///
/// Two details are the same command (for correlating a host response with
/// the outstanding command) when number, type and qualifier all match; the
/// comprehension-required flag only affects how the tag is encoded.
#[derive(Debug, Clone, Copy, Eq)]
pub struct CommandDetails {
    /// Whether the card marked the object as comprehension-required.
    pub comprehension_required: bool,
    /// Command number assigned by the card (0-255).
    pub command_number: u8,
    /// Raw command type byte. See [`CommandDetails::command_type`].
    pub type_of_command: u8,
    /// Type-specific qualifier bits.
    pub command_qualifier: u8,
}

impl CommandDetails {
    /// Create command details for a known command type.
    pub fn new(command_number: u8, command_type: CommandType, command_qualifier: u8) -> Self {
        CommandDetails {
            comprehension_required: true,
            command_number,
            type_of_command: command_type.value(),
            command_qualifier,
        }
    }

    /// Set the comprehension-required flag.
    pub fn comprehension_required(mut self, required: bool) -> Self {
        self.comprehension_required = required;
        self
    }

    /// Typed view of the command type, `None` if the byte is unknown.
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::from_value(self.type_of_command)
    }
}

impl PartialEq for CommandDetails {
    fn eq(&self, other: &Self) -> bool {
        self.command_number == other.command_number
            && self.type_of_command == other.type_of_command
            && self.command_qualifier == other.command_qualifier
    }
}

impl fmt::Display for CommandDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command_type() {
            Some(ty) => write!(
                f,
                "#{} {} q=0x{:02X}",
                self.command_number, ty, self.command_qualifier
            ),
            None => write!(
                f,
                "#{} type=0x{:02X} q=0x{:02X}",
                self.command_number, self.type_of_command, self.command_qualifier
            ),
        }
    }
}

/// One selectable entry in a menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Item identifier returned to the card when selected.
    pub id: u8,
    /// Item label.
    pub text: String,
}

impl Item {
    pub fn new(id: u8, text: impl Into<String>) -> Self {
        Item {
            id,
            text: text.into(),
        }
    }
}

/// A SET UP MENU or SELECT ITEM menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    /// Alpha identifier shown as the menu title.
    pub title: Option<String>,
    /// Items in card order. An item of `None` is an absent ITEM object.
    pub items: Vec<Option<Item>>,
    /// Item to preselect, if the card gave one.
    pub default_item: Option<u8>,
    /// Whether the card offers help for the items.
    pub help_available: bool,
    /// Soft-key selection preferred by the card.
    pub soft_key_preferred: bool,
}

impl Menu {
    /// Build a menu from present items.
    pub fn with_items(title: Option<String>, items: Vec<Item>) -> Self {
        Menu {
            title,
            items: items.into_iter().map(Some).collect(),
            ..Menu::default()
        }
    }

    /// The "remove menu" sentinel: exactly one item, and it is absent.
    pub fn removal() -> Self {
        Menu {
            items: vec![None],
            ..Menu::default()
        }
    }

    /// Returns `true` if this menu asks the terminal to remove its current menu.
    pub fn is_removal(&self) -> bool {
        matches!(self.items.as_slice(), [None])
    }
}

/// A DURATION object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub time_unit: TimeUnit,
    pub time_interval: u8,
}

/// Input descriptor of GET INPUT / GET INKEY.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    /// Prompt shown to the user.
    pub text: String,
    /// Text pre-filled in the input field.
    pub default_text: Option<String>,
    pub min_len: u8,
    pub max_len: u8,
    /// Answer is a yes/no choice rather than text.
    pub yes_no: bool,
    /// Answer must be encoded in UCS2.
    pub ucs2: bool,
    /// Answer must be encoded as packed GSM 7-bit.
    pub packed: bool,
    pub digit_only: bool,
    pub echo: bool,
    pub help_available: bool,
    /// Variable timeout. Echoed back when the user does not respond.
    pub duration: Option<Duration>,
}

/// Text descriptor of DISPLAY TEXT, SET UP IDLE MODE TEXT and friends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMessage {
    pub title: Option<String>,
    pub text: Option<String>,
    /// Whether the card expects the host to answer after displaying.
    pub response_needed: bool,
    pub icon_self_explanatory: bool,
    pub is_high_priority: bool,
    pub user_clear: bool,
    pub duration: Option<Duration>,
}

/// Parameters of SET UP CALL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSetup {
    /// Text asking the user to confirm the call.
    pub confirm_msg: TextMessage,
    /// Text shown while the call is set up.
    pub call_msg: TextMessage,
}

/// Parameters of LAUNCH BROWSER.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Browser {
    pub url: Option<String>,
    pub confirm_msg: TextMessage,
}

/// Type-specific payload of a decoded proactive command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommandPayload {
    #[default]
    None,
    /// SET UP MENU, SELECT ITEM.
    Menu(Menu),
    /// GET INPUT, GET INKEY.
    Input(Input),
    /// DISPLAY TEXT, SET UP IDLE MODE TEXT, REFRESH, SEND SMS/SS/USSD/DTMF,
    /// PLAY TONE, the channel commands.
    Text(TextMessage),
    /// SET UP EVENT LIST: raw event bytes as sent by the card.
    EventList(Vec<u8>),
    /// SET UP CALL.
    CallSetup(CallSetup),
    /// LAUNCH BROWSER.
    Browser(Browser),
}

/// A proactive command as produced by the external decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParams {
    pub details: CommandDetails,
    pub payload: CommandPayload,
    /// The decoder could not load one of the icons the command references.
    pub load_icon_failed: bool,
}

impl CommandParams {
    pub fn new(details: CommandDetails, payload: CommandPayload) -> Self {
        CommandParams {
            details,
            payload,
            load_icon_failed: false,
        }
    }

    pub fn load_icon_failed(mut self, failed: bool) -> Self {
        self.load_icon_failed = failed;
        self
    }
}

/// The public representation of a proactive command, raised to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatCmdMessage {
    pub details: CommandDetails,
    pub payload: CommandPayload,
    pub load_icon_failed: bool,
}

impl CatCmdMessage {
    pub fn command_type(&self) -> Option<CommandType> {
        self.details.command_type()
    }

    pub fn menu(&self) -> Option<&Menu> {
        match &self.payload {
            CommandPayload::Menu(menu) => Some(menu),
            _ => None,
        }
    }

    pub fn input(&self) -> Option<&Input> {
        match &self.payload {
            CommandPayload::Input(input) => Some(input),
            _ => None,
        }
    }

    /// The command's text descriptor; for SET UP CALL this is the
    /// confirmation text, for LAUNCH BROWSER the confirmation prompt.
    pub fn text_message(&self) -> Option<&TextMessage> {
        match &self.payload {
            CommandPayload::Text(text) => Some(text),
            CommandPayload::CallSetup(call) => Some(&call.confirm_msg),
            CommandPayload::Browser(browser) => Some(&browser.confirm_msg),
            _ => None,
        }
    }

    pub fn event_list(&self) -> Option<&[u8]> {
        match &self.payload {
            CommandPayload::EventList(events) => Some(events),
            _ => None,
        }
    }
}

impl From<CommandParams> for CatCmdMessage {
    fn from(params: CommandParams) -> Self {
        CatCmdMessage {
            details: params.details,
            payload: params.payload,
            load_icon_failed: params.load_icon_failed,
        }
    }
}

/// The host application's answer to a forwarded proactive command.
///
/// Only the fields relevant to the answered command type need to be set;
/// the rest keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatResponseMessage {
    pub details: CommandDetails,
    pub result: ResultCode,
    /// Item chosen in SET UP MENU / SELECT ITEM.
    pub users_menu_selection: u8,
    /// Text entered for GET INPUT / GET INKEY.
    pub users_input: Option<String>,
    /// Answer to a yes/no GET INKEY.
    pub users_yes_no_selection: bool,
    /// Whether the user accepted a SET UP CALL.
    pub users_confirm: bool,
    /// Event being reported for SET UP EVENT LIST.
    pub event_value: u8,
    /// Extra bytes appended verbatim to an event-download envelope.
    pub added_info: Vec<u8>,
    /// Whether the RESULT object carries an additional-information byte.
    pub include_additional_info: bool,
    pub additional_info: u8,
}

impl CatResponseMessage {
    /// Start a response to the command identified by `details`.
    pub fn new(details: CommandDetails, result: ResultCode) -> Self {
        CatResponseMessage {
            details,
            result,
            users_menu_selection: 0,
            users_input: None,
            users_yes_no_selection: false,
            users_confirm: false,
            event_value: 0,
            added_info: Vec::new(),
            include_additional_info: false,
            additional_info: 0,
        }
    }

    /// Start a response to a command message received from the engine.
    pub fn for_command(cmd: &CatCmdMessage, result: ResultCode) -> Self {
        CatResponseMessage::new(cmd.details, result)
    }

    pub fn menu_selection(mut self, item_id: u8) -> Self {
        self.users_menu_selection = item_id;
        self
    }

    pub fn input(mut self, text: impl Into<String>) -> Self {
        self.users_input = Some(text.into());
        self
    }

    pub fn yes_no(mut self, yes: bool) -> Self {
        self.users_yes_no_selection = yes;
        self
    }

    pub fn confirm(mut self, accepted: bool) -> Self {
        self.users_confirm = accepted;
        self
    }

    /// Report an event for SET UP EVENT LIST, with the event-specific bytes
    /// that follow the event TLV header (e.g. the browser termination cause).
    pub fn event(mut self, event: EventCode, added_info: &[u8]) -> Self {
        self.event_value = event.value();
        self.added_info = added_info.to_vec();
        self
    }

    /// Attach an additional-information byte to the RESULT object.
    pub fn additional_info(mut self, info: u8) -> Self {
        self.include_additional_info = true;
        self.additional_info = info;
        self
    }
}

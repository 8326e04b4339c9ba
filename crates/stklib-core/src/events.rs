//! Host-facing notifications.
//!
//! The CAT service raises [`CatEvent`]s through a `tokio::sync::broadcast`
//! channel. The host application (menu UI, prompt dialogs, idle-screen
//! widget) subscribes, renders what the card asked for, and answers through
//! the service's response channel.

use crate::command::CatCmdMessage;
use crate::types::RefreshResult;

/// A notification raised by the CAT service for the host application.
///
/// Delivery is best-effort through a bounded broadcast channel; a host that
/// falls too far behind may miss events and should resynchronise on the
/// next [`CatEvent::ProactiveCommand`].
#[derive(Debug, Clone)]
pub enum CatEvent {
    /// A proactive command is available for the host to act on.
    ProactiveCommand(CatCmdMessage),

    /// The card ended the proactive session; any prompt on screen should
    /// be dismissed.
    SessionEnded,

    /// The card was refreshed or removed.
    IccStatusChanged {
        /// `false` once the card is absent.
        card_present: bool,
        /// Refresh outcome, when the change came from a REFRESH.
        refresh_result: Option<RefreshResult>,
    },
}

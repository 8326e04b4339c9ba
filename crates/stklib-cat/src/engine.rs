//! The proactive-command dispatch state machine.
//!
//! [`CatEngine`] holds the single outstanding command slot and the
//! remembered SET UP MENU command, owns the [`RilTransport`], and processes
//! one [`Inbound`] message at a time:
//!
//! ```text
//!            proactive command (forwarded)
//!   Idle  ---------------------------------->  Dispatched
//!    ^                                              |
//!    |   terminal response / envelope / call setup  |
//!    +----------------------------------------------+
//!    session end: outstanding := remembered menu command
//! ```
//!
//! Protocol-level rejections never surface as errors: an uncorrelated host
//! response, an unsupported command type, or an unhandled result code is
//! dropped with a debug log and nothing is sent to the card. Only transport
//! and encoding failures are returned as `Err`.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use stklib_core::{
    CatCmdMessage, CatEvent, CatResponseMessage, CommandDetails, CommandParams, CommandType,
    DeviceIdentity, EventCode, Input, RefreshResult, Result, ResultCode, RilTransport,
};

use crate::envelope;
use crate::response::{self, OptionalTags, ResponseData};
use crate::tlv::to_hex;

/// A message for the engine. Processed strictly in arrival order.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A proactive command from the decoder. `result` is the decoder's
    /// verdict; anything other than OK is answered straight away.
    ProactiveCommand {
        params: CommandParams,
        result: ResultCode,
    },
    /// The decoder could not produce command parameters at all.
    DecodeFailure { result: ResultCode },
    /// The host application's answer to a forwarded command.
    HostResponse(CatResponseMessage),
    /// The card ended the proactive session.
    SessionEnd,
    /// The modem reported the outcome of a card REFRESH.
    IccRefresh(RefreshResult),
    /// The card was removed.
    CardAbsent,
}

/// Snapshot of the engine's correlation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    /// Details of the command awaiting a response, if any.
    pub outstanding: Option<CommandDetails>,
    /// Details of the remembered SET UP MENU command, if any.
    pub menu: Option<CommandDetails>,
}

/// The CAT protocol engine.
pub struct CatEngine {
    transport: Box<dyn RilTransport>,
    event_tx: broadcast::Sender<CatEvent>,
    language: String,
    current_cmd: Option<CatCmdMessage>,
    menu_cmd: Option<CatCmdMessage>,
}

impl CatEngine {
    /// Create an idle engine.
    ///
    /// `language` is the ISO 639 code reported for PROVIDE LOCAL
    /// INFORMATION (language setting).
    pub fn new(
        transport: Box<dyn RilTransport>,
        event_tx: broadcast::Sender<CatEvent>,
        language: impl Into<String>,
    ) -> Self {
        CatEngine {
            transport,
            event_tx,
            language: language.into(),
            current_cmd: None,
            menu_cmd: None,
        }
    }

    /// Current correlation state.
    pub fn state(&self) -> EngineState {
        EngineState {
            outstanding: self.current_cmd.as_ref().map(|c| c.details),
            menu: self.menu_cmd.as_ref().map(|c| c.details),
        }
    }

    /// Tell the modem the toolkit is ready for proactive commands.
    pub async fn report_running(&mut self) -> Result<()> {
        self.transport.report_stk_service_running().await
    }

    /// Give up the engine and recover its transport.
    pub fn into_transport(self) -> Box<dyn RilTransport> {
        self.transport
    }

    /// Process one inbound message to completion.
    pub async fn handle(&mut self, msg: Inbound) -> Result<()> {
        match msg {
            Inbound::ProactiveCommand { params, result } => {
                self.handle_proactive_command(params, result).await
            }
            Inbound::DecodeFailure { result } => self.handle_decode_failure(result).await,
            Inbound::HostResponse(resp) => self.handle_host_response(resp).await,
            Inbound::SessionEnd => {
                self.handle_session_end();
                Ok(())
            }
            Inbound::IccRefresh(result) => {
                self.handle_icc_refresh(result);
                Ok(())
            }
            Inbound::CardAbsent => {
                self.handle_card_absent();
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------
    // Card -> host
    // -----------------------------------------------------------------

    async fn handle_proactive_command(
        &mut self,
        params: CommandParams,
        decoder_result: ResultCode,
    ) -> Result<()> {
        if decoder_result != ResultCode::Ok {
            debug!(
                details = %params.details,
                result = %decoder_result,
                "decoder rejected command"
            );
            return self
                .send_terminal_response(&params.details, decoder_result, None, None, None)
                .await;
        }

        let mut cmd = CatCmdMessage::from(params);
        let Some(command_type) = cmd.command_type() else {
            debug!(details = %cmd.details, "unsupported command type, dropping");
            return Ok(());
        };
        debug!(details = %cmd.details, "proactive command");

        // Immediate acks go out before the command is forwarded, but a
        // failed ack must not keep the command from the host.
        let mut ack = None;
        match command_type {
            CommandType::SetUpMenu => {
                if cmd.menu().is_some_and(|menu| menu.is_removal()) {
                    debug!("menu removed by card");
                    self.menu_cmd = None;
                } else {
                    self.menu_cmd = Some(cmd.clone());
                }
                ack = Some(icon_result(&cmd));
            }
            CommandType::DisplayText | CommandType::SetUpIdleModeText => {
                let response_needed = cmd.text_message().is_some_and(|t| t.response_needed);
                if !response_needed {
                    ack = Some(icon_result(&cmd));
                }
            }
            CommandType::Refresh => {
                // Only idle-mode-text removal is supported for REFRESH.
                cmd.details.type_of_command = CommandType::SetUpIdleModeText.value();
            }
            CommandType::SetUpEventList => {
                let supported = cmd
                    .event_list()
                    .is_none_or(|events| events.iter().all(|&e| EventCode::is_supported(e)));
                if !supported {
                    debug!(events = ?cmd.event_list(), "event list beyond terminal capability");
                    return self
                        .send_terminal_response(
                            &cmd.details,
                            ResultCode::BeyondTerminalCapability,
                            None,
                            None,
                            None,
                        )
                        .await;
                }
                ack = Some(ResultCode::Ok);
            }
            CommandType::ProvideLocalInformation
            | CommandType::CloseChannel
            | CommandType::ReceiveData
            | CommandType::SendData
            | CommandType::GetChannelStatus => {
                return self
                    .send_terminal_response(&cmd.details, ResultCode::Ok, None, None, None)
                    .await;
            }
            CommandType::OpenChannel
            | CommandType::LaunchBrowser
            | CommandType::SelectItem
            | CommandType::GetInput
            | CommandType::GetInkey
            | CommandType::SendDtmf
            | CommandType::SendSms
            | CommandType::SendSs
            | CommandType::SendUssd
            | CommandType::PlayTone
            | CommandType::SetUpCall => {}
            _ => {
                debug!(details = %cmd.details, "unsupported command, dropping");
                return Ok(());
            }
        }

        let acked = match ack {
            Some(result) => {
                let sent = self
                    .send_terminal_response(&cmd.details, result, None, None, None)
                    .await;
                if let Err(e) = &sent {
                    warn!(details = %cmd.details, error = %e, "immediate ack failed");
                }
                sent
            }
            None => Ok(()),
        };

        self.current_cmd = Some(cmd.clone());
        self.notify(CatEvent::ProactiveCommand(cmd));
        acked
    }

    /// Answer a command the decoder could not parse, addressed to command
    /// number 0 so the card can recover.
    async fn handle_decode_failure(&mut self, result: ResultCode) -> Result<()> {
        let type_of_command = self
            .current_cmd
            .as_ref()
            .map_or(0x00, |c| c.details.type_of_command);
        let details = CommandDetails {
            comprehension_required: true,
            command_number: 0,
            type_of_command,
            command_qualifier: 0,
        };
        debug!(details = %details, result = %result, "answering undecodable command");
        self.send_terminal_response(&details, result, None, None, None)
            .await
    }

    // -----------------------------------------------------------------
    // Host -> card
    // -----------------------------------------------------------------

    /// SET UP EVENT LIST and SET UP MENU answers arrive long after the
    /// command and are always accepted; everything else must match the
    /// outstanding command.
    fn validate_response(&self, resp: &CatResponseMessage) -> bool {
        match resp.details.command_type() {
            Some(CommandType::SetUpEventList | CommandType::SetUpMenu) => true,
            _ => self
                .current_cmd
                .as_ref()
                .is_some_and(|cmd| cmd.details == resp.details),
        }
    }

    async fn handle_host_response(&mut self, resp: CatResponseMessage) -> Result<()> {
        if !self.validate_response(&resp) {
            debug!(
                details = %resp.details,
                "response does not match outstanding command, dropping"
            );
            return Ok(());
        }

        // Echo the card's own details (and comprehension flag) when correlated.
        let details = match &self.current_cmd {
            Some(cmd) if cmd.details == resp.details => cmd.details,
            _ => resp.details,
        };
        let input = self.current_cmd.as_ref().and_then(|c| c.input()).cloned();
        let mut data = None;

        match resp.result {
            code if code.is_success()
                || code == ResultCode::HelpInfoRequired
                || code == ResultCode::LaunchBrowserError =>
            {
                let help_required = code == ResultCode::HelpInfoRequired;
                match details.command_type() {
                    Some(CommandType::SetUpMenu) => {
                        return self
                            .send_menu_selection(resp.users_menu_selection, help_required)
                            .await;
                    }
                    Some(CommandType::SelectItem) => {
                        data = Some(ResponseData::SelectItem {
                            id: resp.users_menu_selection,
                        });
                    }
                    Some(CommandType::GetInput | CommandType::GetInkey) => {
                        let input = input.clone().unwrap_or_default();
                        if input.yes_no {
                            data = Some(ResponseData::YesNo(resp.users_yes_no_selection));
                        } else if !help_required {
                            data = Some(ResponseData::GetInput {
                                text: resp.users_input.clone().unwrap_or_default(),
                                ucs2: input.ucs2,
                                packed: input.packed,
                            });
                        }
                    }
                    Some(CommandType::DisplayText | CommandType::LaunchBrowser) => {}
                    Some(CommandType::SetUpCall) => {
                        debug!(accept = resp.users_confirm, "forwarding call setup decision");
                        self.transport
                            .handle_call_setup_request(resp.users_confirm)
                            .await?;
                        self.current_cmd = None;
                        return Ok(());
                    }
                    Some(CommandType::SetUpEventList) => {
                        let source = if resp.event_value == EventCode::IdleScreenAvailable.value() {
                            DeviceIdentity::Display
                        } else {
                            DeviceIdentity::Terminal
                        };
                        let bytes = envelope::encode_event_download(
                            resp.event_value,
                            source.value(),
                            DeviceIdentity::Uicc.value(),
                            &resp.added_info,
                        )?;
                        debug!(event = resp.event_value, "sending event download");
                        self.transport.send_envelope(&to_hex(&bytes)).await?;
                        self.current_cmd = None;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            ResultCode::NoResponseFromUser
            | ResultCode::UiccSessionTermByUser
            | ResultCode::BackwardMoveByUser => {}
            other => {
                debug!(result = %other, "unhandled result code, dropping response");
                return Ok(());
            }
        }

        let additional_info = resp
            .include_additional_info
            .then_some(resp.additional_info);
        self.send_terminal_response(
            &details,
            resp.result,
            additional_info,
            data.as_ref(),
            input.as_ref(),
        )
        .await?;
        self.current_cmd = None;
        Ok(())
    }

    async fn send_menu_selection(&mut self, item_id: u8, help_required: bool) -> Result<()> {
        if self.menu_cmd.is_none() {
            debug!(item_id, "menu selection without a menu, dropping");
            return Ok(());
        }
        let bytes = envelope::encode_menu_selection(item_id, help_required)?;
        debug!(item_id, help_required, "sending menu selection");
        self.transport.send_envelope(&to_hex(&bytes)).await?;
        self.current_cmd = None;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Session and card lifecycle
    // -----------------------------------------------------------------

    fn handle_session_end(&mut self) {
        debug!(menu = self.menu_cmd.is_some(), "session end");
        self.current_cmd = self.menu_cmd.clone();
        self.notify(CatEvent::SessionEnded);
    }

    fn handle_icc_refresh(&mut self, result: RefreshResult) {
        debug!(result = %result, "ICC refresh");
        if matches!(result, RefreshResult::Init | RefreshResult::Reset) {
            self.current_cmd = None;
            self.menu_cmd = None;
        }
        self.notify(CatEvent::IccStatusChanged {
            card_present: true,
            refresh_result: Some(result),
        });
    }

    fn handle_card_absent(&mut self) {
        debug!("card absent");
        self.current_cmd = None;
        self.menu_cmd = None;
        self.notify(CatEvent::IccStatusChanged {
            card_present: false,
            refresh_result: None,
        });
    }

    // -----------------------------------------------------------------
    // Outbound helpers
    // -----------------------------------------------------------------

    async fn send_terminal_response(
        &mut self,
        details: &CommandDetails,
        result: ResultCode,
        additional_info: Option<u8>,
        data: Option<&ResponseData>,
        input: Option<&Input>,
    ) -> Result<()> {
        let bytes = response::encode_terminal_response(
            details,
            result,
            additional_info,
            data,
            OptionalTags {
                input,
                language: Some(&self.language),
            },
        )?;
        debug!(details = %details, result = %result, "sending terminal response");
        self.transport
            .send_terminal_response(&to_hex(&bytes))
            .await
    }

    fn notify(&self, event: CatEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no host subscribed to CAT events");
        }
    }
}

/// Immediate-ack result: OK, or icon-not-displayed when the decoder could
/// not load an icon.
fn icon_result(cmd: &CatCmdMessage) -> ResultCode {
    if cmd.load_icon_failed {
        ResultCode::PrfrmdIconNotDisplayed
    } else {
        ResultCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stklib_core::{
        CallSetup, CommandPayload, Duration, Item, LANGUAGE_SETTING, Menu, TextMessage, TimeUnit,
    };
    use stklib_test_harness::{MockRil, RilLog, RilRequest};

    fn make_engine() -> (CatEngine, RilLog, broadcast::Receiver<CatEvent>) {
        let ril = MockRil::new();
        let log = ril.log();
        let (event_tx, event_rx) = broadcast::channel(16);
        (CatEngine::new(Box::new(ril), event_tx, "en"), log, event_rx)
    }

    fn command(
        number: u8,
        command_type: CommandType,
        qualifier: u8,
        payload: CommandPayload,
    ) -> Inbound {
        Inbound::ProactiveCommand {
            params: CommandParams::new(
                CommandDetails::new(number, command_type, qualifier),
                payload,
            ),
            result: ResultCode::Ok,
        }
    }

    fn main_menu() -> Menu {
        Menu::with_items(
            Some("Services".into()),
            vec![Item::new(1, "News"), Item::new(2, "Weather")],
        )
    }

    fn text(response_needed: bool) -> CommandPayload {
        CommandPayload::Text(TextMessage {
            text: Some("Hello".into()),
            response_needed,
            ..TextMessage::default()
        })
    }

    fn forwarded(rx: &mut broadcast::Receiver<CatEvent>) -> Vec<CatCmdMessage> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CatEvent::ProactiveCommand(cmd) = event {
                out.push(cmd);
            }
        }
        out
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn set_up_menu_acks_and_forwards() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();

        assert_eq!(
            log.requests(),
            vec![RilRequest::TerminalResponse("810301250002028281830100".into())]
        );
        assert_eq!(forwarded(&mut rx).len(), 1);
        let state = engine.state();
        assert_eq!(state.menu, Some(CommandDetails::new(1, CommandType::SetUpMenu, 0)));
        assert_eq!(state.outstanding, state.menu);
    }

    #[tokio::test]
    async fn set_up_menu_icon_failure_acks_icon_not_displayed() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(Inbound::ProactiveCommand {
                params: CommandParams::new(
                    CommandDetails::new(1, CommandType::SetUpMenu, 0),
                    CommandPayload::Menu(main_menu()),
                )
                .load_icon_failed(true),
                result: ResultCode::Ok,
            })
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810301250002028281830104".to_string()]);
    }

    #[tokio::test]
    async fn set_up_menu_removal_clears_menu_and_never_selects() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine
            .handle(command(2, CommandType::SetUpMenu, 0, CommandPayload::Menu(Menu::removal())))
            .await
            .unwrap();

        assert_eq!(engine.state().menu, None);
        assert_eq!(
            log.terminal_responses().last().map(String::as_str),
            Some("810302250002028281830100")
        );

        let details = CommandDetails::new(2, CommandType::SetUpMenu, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).menu_selection(1),
            ))
            .await
            .unwrap();
        assert!(log.envelopes().is_empty());
    }

    #[tokio::test]
    async fn display_text_without_response_is_acked_immediately() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(3, CommandType::DisplayText, 0x80, text(false)))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810303218002028281830100".to_string()]);
        assert_eq!(forwarded(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn display_text_with_response_waits_for_host() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(3, CommandType::DisplayText, 0x80, text(true)))
            .await
            .unwrap();
        assert!(log.is_empty());
        assert_eq!(forwarded(&mut rx).len(), 1);
        assert!(engine.state().outstanding.is_some());
    }

    #[tokio::test]
    async fn idle_mode_text_is_acked_immediately() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpIdleModeText, 0, text(false)))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810301280002028281830100".to_string()]);
        let cmds = forwarded(&mut rx);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command_type(), Some(CommandType::SetUpIdleModeText));
    }

    #[tokio::test]
    async fn failed_ack_still_forwards() {
        let mut ril = MockRil::new();
        ril.set_connected(false);
        let (event_tx, mut rx) = broadcast::channel(16);
        let mut engine = CatEngine::new(Box::new(ril), event_tx, "en");

        let err = engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap_err();
        assert!(matches!(err, stklib_core::Error::Transport(_)));
        let err = engine
            .handle(command(2, CommandType::DisplayText, 0, text(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, stklib_core::Error::Transport(_)));

        let cmds = forwarded(&mut rx);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].command_type(), Some(CommandType::SetUpMenu));
        assert_eq!(cmds[1].command_type(), Some(CommandType::DisplayText));
        assert_eq!(
            engine.state(),
            EngineState {
                outstanding: Some(CommandDetails::new(2, CommandType::DisplayText, 0)),
                menu: Some(CommandDetails::new(1, CommandType::SetUpMenu, 0)),
            }
        );
    }

    #[tokio::test]
    async fn refresh_is_forwarded_as_idle_mode_text() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(4, CommandType::Refresh, 0x00, text(false)))
            .await
            .unwrap();
        assert!(log.is_empty());
        let cmds = forwarded(&mut rx);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command_type(), Some(CommandType::SetUpIdleModeText));
    }

    #[tokio::test]
    async fn event_list_supported_is_acked_and_forwarded() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(
                5,
                CommandType::SetUpEventList,
                0,
                CommandPayload::EventList(vec![0x05, 0x07, 0x08]),
            ))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810305050002028281830100".to_string()]);
        assert_eq!(forwarded(&mut rx).len(), 1);
        assert!(engine.state().outstanding.is_some());
    }

    #[tokio::test]
    async fn event_list_unsupported_is_beyond_capability_and_not_forwarded() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(
                5,
                CommandType::SetUpEventList,
                0,
                CommandPayload::EventList(vec![0x05, 0x00]),
            ))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810305050002028281830130".to_string()]);
        assert!(forwarded(&mut rx).is_empty());
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn provide_local_information_language() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(
                6,
                CommandType::ProvideLocalInformation,
                LANGUAGE_SETTING,
                CommandPayload::None,
            ))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["8103062604020282818301002D02656E".to_string()]
        );
        assert!(forwarded(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn channel_commands_are_acked_without_forwarding() {
        let (mut engine, log, mut rx) = make_engine();
        for ty in [
            CommandType::CloseChannel,
            CommandType::ReceiveData,
            CommandType::SendData,
            CommandType::GetChannelStatus,
        ] {
            engine
                .handle(command(7, ty, 0, CommandPayload::None))
                .await
                .unwrap();
        }
        assert_eq!(log.terminal_responses().len(), 4);
        assert!(forwarded(&mut rx).is_empty());
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn host_driven_commands_are_forwarded_silently() {
        let (mut engine, log, mut rx) = make_engine();
        for ty in [
            CommandType::OpenChannel,
            CommandType::LaunchBrowser,
            CommandType::SelectItem,
            CommandType::GetInput,
            CommandType::GetInkey,
            CommandType::SendDtmf,
            CommandType::SendSms,
            CommandType::SendSs,
            CommandType::SendUssd,
            CommandType::PlayTone,
            CommandType::SetUpCall,
        ] {
            engine
                .handle(command(8, ty, 0, CommandPayload::None))
                .await
                .unwrap();
            assert_eq!(
                engine.state().outstanding,
                Some(CommandDetails::new(8, ty, 0))
            );
        }
        assert!(log.is_empty());
        assert_eq!(forwarded(&mut rx).len(), 11);
    }

    #[tokio::test]
    async fn unsupported_commands_are_dropped() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(command(9, CommandType::TimerManagement, 0, CommandPayload::None))
            .await
            .unwrap();
        engine
            .handle(Inbound::ProactiveCommand {
                params: CommandParams::new(
                    CommandDetails {
                        comprehension_required: true,
                        command_number: 10,
                        type_of_command: 0x7A,
                        command_qualifier: 0,
                    },
                    CommandPayload::None,
                ),
                result: ResultCode::Ok,
            })
            .await
            .unwrap();
        assert!(log.is_empty());
        assert!(forwarded(&mut rx).is_empty());
        assert_eq!(engine.state(), EngineState::default());
    }

    #[tokio::test]
    async fn decoder_error_is_answered_with_its_result() {
        let (mut engine, log, mut rx) = make_engine();
        engine
            .handle(Inbound::ProactiveCommand {
                params: CommandParams::new(
                    CommandDetails::new(11, CommandType::GetInput, 0),
                    CommandPayload::None,
                ),
                result: ResultCode::CmdDataNotUnderstood,
            })
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["81030B230002028281830132".to_string()]);
        assert!(forwarded(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn decode_failure_answers_command_number_zero() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(Inbound::DecodeFailure {
                result: ResultCode::CmdDataNotUnderstood,
            })
            .await
            .unwrap();
        engine
            .handle(command(1, CommandType::GetInkey, 0, CommandPayload::None))
            .await
            .unwrap();
        engine
            .handle(Inbound::DecodeFailure {
                result: ResultCode::CmdDataNotUnderstood,
            })
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec![
                "810300000002028281830132".to_string(),
                "810300220002028281830132".to_string(),
            ]
        );
        assert!(engine.state().outstanding.is_some());
    }

    // -----------------------------------------------------------------
    // Host responses
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn select_item_scenario() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        let details = CommandDetails::new(1, CommandType::SelectItem, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).menu_selection(3),
            ))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["810301240002028281830100900103".to_string()]
        );
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn display_text_and_browser_ok_carry_no_payload() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(3, CommandType::DisplayText, 0x80, text(true)))
            .await
            .unwrap();
        let details = CommandDetails::new(3, CommandType::DisplayText, 0x80);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(details, ResultCode::Ok)))
            .await
            .unwrap();

        engine
            .handle(command(4, CommandType::LaunchBrowser, 0, CommandPayload::None))
            .await
            .unwrap();
        let details = CommandDetails::new(4, CommandType::LaunchBrowser, 0);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(details, ResultCode::Ok)))
            .await
            .unwrap();

        assert_eq!(
            log.terminal_responses(),
            vec![
                "810303218002028281830100".to_string(),
                "810304150002028281830100".to_string(),
            ]
        );
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn launch_browser_error_is_returned_to_card() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::LaunchBrowser, 0, CommandPayload::None))
            .await
            .unwrap();
        let details = CommandDetails::new(1, CommandType::LaunchBrowser, 0);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(
                details,
                ResultCode::LaunchBrowserError,
            )))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810301150002028281830126".to_string()]);
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn event_list_response_accepted_over_other_command() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(
                5,
                CommandType::SetUpEventList,
                0,
                CommandPayload::EventList(vec![0x05]),
            ))
            .await
            .unwrap();
        engine
            .handle(command(6, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        assert_eq!(
            engine.state().outstanding,
            Some(CommandDetails::new(6, CommandType::SelectItem, 0))
        );
        log.clear();

        let details = CommandDetails::new(5, CommandType::SetUpEventList, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok)
                    .event(EventCode::IdleScreenAvailable, &[]),
            ))
            .await
            .unwrap();

        assert_eq!(log.requests(), vec![RilRequest::Envelope("D60799010582020281".into())]);
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn menu_selection_accepted_over_other_command() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine
            .handle(command(2, CommandType::GetInput, 0, CommandPayload::Input(Input::default())))
            .await
            .unwrap();
        log.clear();

        let details = CommandDetails::new(1, CommandType::SetUpMenu, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).menu_selection(2),
            ))
            .await
            .unwrap();

        assert_eq!(log.requests(), vec![RilRequest::Envelope("D30782020181900102".into())]);
        let state = engine.state();
        assert_eq!(state.outstanding, None);
        assert_eq!(state.menu, Some(details));
    }

    #[tokio::test]
    async fn uncorrelated_response_is_dropped() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        for stale in [
            CommandDetails::new(2, CommandType::SelectItem, 0),
            CommandDetails::new(1, CommandType::GetInput, 0),
            CommandDetails::new(1, CommandType::SelectItem, 1),
        ] {
            engine
                .handle(Inbound::HostResponse(
                    CatResponseMessage::new(stale, ResultCode::Ok).menu_selection(3),
                ))
                .await
                .unwrap();
        }
        assert!(log.is_empty());
        assert!(engine.state().outstanding.is_some());
    }

    #[tokio::test]
    async fn response_without_outstanding_command_is_dropped() {
        let (mut engine, log, _rx) = make_engine();
        let details = CommandDetails::new(1, CommandType::DisplayText, 0);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(details, ResultCode::Ok)))
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn set_up_menu_selection_sends_envelope() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        log.clear();

        let details = CommandDetails::new(1, CommandType::SetUpMenu, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).menu_selection(2),
            ))
            .await
            .unwrap();

        assert!(log.terminal_responses().is_empty());
        let envelopes = log.envelopes();
        assert_eq!(envelopes, vec!["D30782020181900102".to_string()]);
        let bytes = hex::decode(&envelopes[0]).unwrap();
        assert_eq!(bytes[1] as usize, bytes.len() - 2);
        assert_eq!(engine.state().outstanding, None);
        assert!(engine.state().menu.is_some());
    }

    #[tokio::test]
    async fn set_up_menu_help_request() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        log.clear();
        let details = CommandDetails::new(1, CommandType::SetUpMenu, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::HelpInfoRequired).menu_selection(2),
            ))
            .await
            .unwrap();
        assert_eq!(log.envelopes(), vec!["D309820201819001021500".to_string()]);
    }

    #[tokio::test]
    async fn get_input_text_uses_input_coding() {
        let (mut engine, log, _rx) = make_engine();
        let input = Input {
            packed: true,
            ..Input::default()
        };
        engine
            .handle(command(2, CommandType::GetInput, 0x08, CommandPayload::Input(input)))
            .await
            .unwrap();
        let details = CommandDetails::new(2, CommandType::GetInput, 0x08);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).input("ABC"),
            ))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["8103022308020282818301008D040041E110".to_string()]
        );
    }

    #[tokio::test]
    async fn get_input_help_sends_no_text() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(2, CommandType::GetInput, 0, CommandPayload::Input(Input::default())))
            .await
            .unwrap();
        let details = CommandDetails::new(2, CommandType::GetInput, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::HelpInfoRequired).input("ignored"),
            ))
            .await
            .unwrap();
        assert_eq!(log.terminal_responses(), vec!["810302230002028281830113".to_string()]);
    }

    #[tokio::test]
    async fn get_inkey_yes_no() {
        let (mut engine, log, _rx) = make_engine();
        let input = Input {
            yes_no: true,
            ..Input::default()
        };
        engine
            .handle(command(2, CommandType::GetInkey, 0x04, CommandPayload::Input(input)))
            .await
            .unwrap();
        let details = CommandDetails::new(2, CommandType::GetInkey, 0x04);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).yes_no(true),
            ))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["8103022204020282818301008D020401".to_string()]
        );
    }

    #[tokio::test]
    async fn get_inkey_timeout_echoes_duration() {
        let (mut engine, log, _rx) = make_engine();
        let input = Input {
            duration: Some(Duration {
                time_unit: TimeUnit::Minute,
                time_interval: 2,
            }),
            ..Input::default()
        };
        engine
            .handle(command(2, CommandType::GetInkey, 0, CommandPayload::Input(input)))
            .await
            .unwrap();
        let details = CommandDetails::new(2, CommandType::GetInkey, 0);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(
                details,
                ResultCode::NoResponseFromUser,
            )))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["81030222000202828183011204020102".to_string()]
        );
    }

    #[tokio::test]
    async fn set_up_call_forwards_confirmation() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(
                3,
                CommandType::SetUpCall,
                0,
                CommandPayload::CallSetup(CallSetup::default()),
            ))
            .await
            .unwrap();
        let details = CommandDetails::new(3, CommandType::SetUpCall, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).confirm(true),
            ))
            .await
            .unwrap();
        assert_eq!(log.requests(), vec![RilRequest::CallSetup(true)]);
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn event_list_response_sends_event_download() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(
                5,
                CommandType::SetUpEventList,
                0,
                CommandPayload::EventList(vec![0x05, 0x08]),
            ))
            .await
            .unwrap();
        log.clear();

        let details = CommandDetails::new(5, CommandType::SetUpEventList, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok)
                    .event(EventCode::IdleScreenAvailable, &[]),
            ))
            .await
            .unwrap();
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok)
                    .event(EventCode::BrowserTermination, &[0x01]),
            ))
            .await
            .unwrap();

        assert!(log.terminal_responses().is_empty());
        assert_eq!(
            log.envelopes(),
            vec![
                "D60799010582020281".to_string(),
                "D60A99010882028281B40101".to_string(),
            ]
        );
        assert_eq!(engine.state().outstanding, None);
    }

    #[tokio::test]
    async fn user_termination_codes_send_plain_terminal_response() {
        for result in [
            ResultCode::NoResponseFromUser,
            ResultCode::UiccSessionTermByUser,
            ResultCode::BackwardMoveByUser,
        ] {
            let (mut engine, log, _rx) = make_engine();
            engine
                .handle(command(1, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
                .await
                .unwrap();
            let details = CommandDetails::new(1, CommandType::SelectItem, 0);
            engine
                .handle(Inbound::HostResponse(
                    CatResponseMessage::new(details, result).menu_selection(1),
                ))
                .await
                .unwrap();
            assert_eq!(
                log.terminal_responses(),
                vec![format!("8103012400020282818301{:02X}", result.value())]
            );
        }
    }

    #[tokio::test]
    async fn other_result_codes_are_dropped() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::SendSms, 0, text(false)))
            .await
            .unwrap();
        let details = CommandDetails::new(1, CommandType::SendSms, 0);
        engine
            .handle(Inbound::HostResponse(CatResponseMessage::new(
                details,
                ResultCode::UserNotAccept,
            )))
            .await
            .unwrap();
        assert!(log.is_empty());
        assert!(engine.state().outstanding.is_some());
    }

    #[tokio::test]
    async fn partial_success_is_surfaced_verbatim() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(1, CommandType::PlayTone, 0, text(true)))
            .await
            .unwrap();
        let details = CommandDetails::new(1, CommandType::PlayTone, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::PrfrmdToneNotPlayed)
                    .additional_info(0x01),
            ))
            .await
            .unwrap();
        assert_eq!(
            log.terminal_responses(),
            vec!["81030120000202828183020901".to_string()]
        );
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn session_end_rearms_menu() {
        let (mut engine, _log, mut rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine
            .handle(command(2, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine.handle(Inbound::SessionEnd).await.unwrap();

        assert_eq!(
            engine.state().outstanding,
            Some(CommandDetails::new(1, CommandType::SetUpMenu, 0))
        );
        let mut saw_end = false;
        while let Ok(event) = rx.try_recv() {
            saw_end |= matches!(event, CatEvent::SessionEnded);
        }
        assert!(saw_end);
    }

    #[tokio::test]
    async fn session_end_without_menu_goes_idle() {
        let (mut engine, _log, _rx) = make_engine();
        engine
            .handle(command(2, CommandType::GetInput, 0, CommandPayload::Input(Input::default())))
            .await
            .unwrap();
        engine.handle(Inbound::SessionEnd).await.unwrap();
        assert_eq!(engine.state(), EngineState::default());
    }

    #[tokio::test]
    async fn stale_response_after_session_end_is_dropped() {
        let (mut engine, log, _rx) = make_engine();
        engine
            .handle(command(2, CommandType::SelectItem, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine.handle(Inbound::SessionEnd).await.unwrap();
        let details = CommandDetails::new(2, CommandType::SelectItem, 0);
        engine
            .handle(Inbound::HostResponse(
                CatResponseMessage::new(details, ResultCode::Ok).menu_selection(1),
            ))
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn refresh_reset_clears_state() {
        let (mut engine, _log, mut rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine
            .handle(Inbound::IccRefresh(RefreshResult::FileUpdate))
            .await
            .unwrap();
        assert!(engine.state().menu.is_some());

        engine
            .handle(Inbound::IccRefresh(RefreshResult::Reset))
            .await
            .unwrap();
        assert_eq!(engine.state(), EngineState::default());

        let refreshes: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|event| match event {
                CatEvent::IccStatusChanged {
                    card_present,
                    refresh_result,
                } => Some((card_present, refresh_result)),
                _ => None,
            })
            .collect();
        assert_eq!(
            refreshes,
            vec![
                (true, Some(RefreshResult::FileUpdate)),
                (true, Some(RefreshResult::Reset)),
            ]
        );
    }

    #[tokio::test]
    async fn card_absent_clears_state() {
        let (mut engine, _log, mut rx) = make_engine();
        engine
            .handle(command(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(main_menu())))
            .await
            .unwrap();
        engine.handle(Inbound::CardAbsent).await.unwrap();
        assert_eq!(engine.state(), EngineState::default());
        let last = std::iter::from_fn(|| rx.try_recv().ok()).last();
        assert!(matches!(
            last,
            Some(CatEvent::IccStatusChanged {
                card_present: false,
                refresh_result: None
            })
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let mut ril = MockRil::new();
        ril.set_connected(false);
        let (event_tx, _rx) = broadcast::channel(4);
        let mut engine = CatEngine::new(Box::new(ril), event_tx, "en");
        let err = engine
            .handle(command(1, CommandType::ProvideLocalInformation, 0, CommandPayload::None))
            .await
            .unwrap_err();
        assert!(matches!(err, stklib_core::Error::Transport(_)));
    }
}

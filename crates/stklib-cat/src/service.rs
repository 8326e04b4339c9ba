//! CatService -- the owning handle for a running CAT engine.
//!
//! The service owns the IO task; dropping it stops the task. Any number of
//! [`CatHandle`]s can be cloned off it for the tasks that feed the engine
//! (the command decoder, the UI answering prompts). Every inbound method
//! only queues the message: correlation and encoding happen on the IO task,
//! and outcomes are observable through [`CatService::subscribe`] and the
//! transport.

use tokio::sync::{broadcast, mpsc};

use stklib_core::{
    CatEvent, CatResponseMessage, CommandParams, RefreshResult, Result, ResultCode, RilTransport,
};

use crate::engine::{EngineState, Inbound};
use crate::io::{self, EngineIo, Request};

/// Cloneable sender side of a running CAT engine.
#[derive(Clone)]
pub struct CatHandle {
    cmd_tx: mpsc::Sender<Request>,
    event_tx: broadcast::Sender<CatEvent>,
}

impl CatHandle {
    /// Queue a decoded proactive command.
    pub async fn handle_proactive_command(&self, params: CommandParams) -> Result<()> {
        self.handle_proactive_command_with_result(params, ResultCode::Ok)
            .await
    }

    /// Queue a decoded proactive command together with the decoder's
    /// verdict. A non-OK `result` is sent straight back to the card.
    pub async fn handle_proactive_command_with_result(
        &self,
        params: CommandParams,
        result: ResultCode,
    ) -> Result<()> {
        io::submit(&self.cmd_tx, Inbound::ProactiveCommand { params, result }).await
    }

    /// Report that the decoder produced no command parameters.
    ///
    /// `result` defaults to CMD_DATA_NOT_UNDERSTOOD.
    pub async fn handle_decode_failure(&self, result: Option<ResultCode>) -> Result<()> {
        let result = result.unwrap_or(ResultCode::CmdDataNotUnderstood);
        io::submit(&self.cmd_tx, Inbound::DecodeFailure { result }).await
    }

    /// Queue the host application's answer to a forwarded command.
    pub async fn send_response(&self, response: CatResponseMessage) -> Result<()> {
        io::submit(&self.cmd_tx, Inbound::HostResponse(response)).await
    }

    pub async fn session_end(&self) -> Result<()> {
        io::submit(&self.cmd_tx, Inbound::SessionEnd).await
    }

    pub async fn icc_refresh(&self, result: RefreshResult) -> Result<()> {
        io::submit(&self.cmd_tx, Inbound::IccRefresh(result)).await
    }

    pub async fn card_absent(&self) -> Result<()> {
        io::submit(&self.cmd_tx, Inbound::CardAbsent).await
    }

    /// The engine's correlation state once every previously queued message
    /// has been processed.
    pub async fn state(&self) -> Result<EngineState> {
        io::state(&self.cmd_tx).await
    }

    /// Subscribe to host notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CatEvent> {
        self.event_tx.subscribe()
    }
}

/// A running CAT engine.
///
/// Constructed via [`CatServiceBuilder`](crate::builder::CatServiceBuilder).
pub struct CatService {
    io: Option<EngineIo>,
    handle: CatHandle,
}

impl Drop for CatService {
    fn drop(&mut self) {
        if let Some(io) = &self.io {
            io.cancel.cancel();
            io.task.abort();
        }
    }
}

impl CatService {
    pub(crate) fn new(io: EngineIo, event_tx: broadcast::Sender<CatEvent>) -> Self {
        let handle = CatHandle {
            cmd_tx: io.cmd_tx.clone(),
            event_tx,
        };
        CatService {
            io: Some(io),
            handle,
        }
    }

    /// A cloneable handle for feeding the engine from other tasks.
    pub fn handle(&self) -> CatHandle {
        self.handle.clone()
    }

    /// See [`CatHandle::handle_proactive_command`].
    pub async fn handle_proactive_command(&self, params: CommandParams) -> Result<()> {
        self.handle.handle_proactive_command(params).await
    }

    /// See [`CatHandle::handle_proactive_command_with_result`].
    pub async fn handle_proactive_command_with_result(
        &self,
        params: CommandParams,
        result: ResultCode,
    ) -> Result<()> {
        self.handle
            .handle_proactive_command_with_result(params, result)
            .await
    }

    /// See [`CatHandle::handle_decode_failure`].
    pub async fn handle_decode_failure(&self, result: Option<ResultCode>) -> Result<()> {
        self.handle.handle_decode_failure(result).await
    }

    pub async fn send_response(&self, response: CatResponseMessage) -> Result<()> {
        self.handle.send_response(response).await
    }

    pub async fn session_end(&self) -> Result<()> {
        self.handle.session_end().await
    }

    pub async fn icc_refresh(&self, result: RefreshResult) -> Result<()> {
        self.handle.icc_refresh(result).await
    }

    pub async fn card_absent(&self) -> Result<()> {
        self.handle.card_absent().await
    }

    pub async fn state(&self) -> Result<EngineState> {
        self.handle.state().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatEvent> {
        self.handle.subscribe()
    }

    /// Stop the engine after it drains the messages queued so far, and
    /// recover the transport.
    ///
    /// Outstanding [`CatHandle`]s start returning
    /// [`Error::NotRunning`](stklib_core::Error::NotRunning).
    pub async fn shutdown(mut self) -> Result<Box<dyn RilTransport>> {
        match self.io.take() {
            Some(io) => io.shutdown().await,
            None => Err(stklib_core::Error::NotRunning),
        }
    }
}

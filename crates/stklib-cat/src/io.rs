//! IO task: the single task that owns the [`CatEngine`] and its transport.
//!
//! Every inbound message (proactive commands from the decoder, host
//! responses, session/card lifecycle) is funnelled through one `mpsc`
//! queue, so the engine sees them strictly in arrival order and its two
//! state slots never need a lock.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stklib_core::error::{Error, Result};
use stklib_core::transport::RilTransport;

use crate::engine::{CatEngine, EngineState, Inbound};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A request sent from the service handle to the IO task.
pub(crate) enum Request {
    /// Process one message; no reply.
    Inbound(Inbound),
    /// Report the engine's correlation state. Because requests are handled
    /// in order, the reply also means every earlier message was processed.
    State { reply: oneshot::Sender<EngineState> },
    /// Graceful shutdown; returns the transport for test recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn RilTransport>>,
    },
}

/// Handle to the IO task. Stored inside `CatService`.
pub(crate) struct EngineIo {
    pub cmd_tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Queue one inbound message.
pub(crate) async fn submit(cmd_tx: &mpsc::Sender<Request>, msg: Inbound) -> Result<()> {
    cmd_tx
        .send(Request::Inbound(msg))
        .await
        .map_err(|_| Error::NotRunning)
}

/// Ask the IO task for the engine state.
pub(crate) async fn state(cmd_tx: &mpsc::Sender<Request>) -> Result<EngineState> {
    let (reply_tx, reply_rx) = oneshot::channel();
    cmd_tx
        .send(Request::State { reply: reply_tx })
        .await
        .map_err(|_| Error::NotRunning)?;
    reply_rx.await.map_err(|_| Error::NotRunning)
}

impl EngineIo {
    /// Shut down the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn RilTransport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let transport = reply_rx.await.map_err(|_| Error::NotRunning)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task around `engine`.
///
/// When `report_running` is set the modem is told the toolkit is ready
/// before the first request is read.
pub(crate) fn spawn_io_task(
    engine: CatEngine,
    mailbox_capacity: usize,
    report_running: bool,
) -> EngineIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(mailbox_capacity);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(engine, cmd_rx, cancel_clone, report_running));

    EngineIo {
        cmd_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Failures while handling a message (transport or encoding) are logged
/// and the loop moves on to the next message; the card will re-issue or
/// time out on its own.
async fn io_loop(
    mut engine: CatEngine,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
    report_running: bool,
) {
    if report_running {
        if let Err(e) = engine.report_running().await {
            warn!(error = %e, "failed to report STK service running");
        }
    }

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Request::Inbound(msg)) => {
                        if let Err(e) = engine.handle(msg).await {
                            warn!(error = %e, "CAT message handling failed");
                        }
                    }
                    Some(Request::State { reply }) => {
                        let _ = reply.send(engine.state());
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        let _ = reply.send(engine.into_transport());
                        return;
                    }
                    None => {
                        debug!("all senders dropped, exiting IO task");
                        break;
                    }
                }
            }
        }
    }
}

//! Mock RIL transport for deterministic testing of the CAT engine.
//!
//! [`MockRil`] implements [`RilTransport`] by recording every outbound
//! request into a shared [`RilLog`]. The engine takes ownership of the
//! transport, so tests keep a [`RilLog`] handle (cloned before the mock is
//! boxed) to inspect what was sent.
//!
//! # Example
//!
//! ```
//! use stklib_core::RilTransport;
//! use stklib_test_harness::{MockRil, RilRequest};
//!
//! # tokio_test_block(async {
//! let mut ril = MockRil::new();
//! let log = ril.log();
//! ril.send_terminal_response("810301250002028281830100").await.unwrap();
//! assert_eq!(
//!     log.requests(),
//!     vec![RilRequest::TerminalResponse("810301250002028281830100".into())]
//! );
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use stklib_core::error::{Error, Result};
use stklib_core::transport::RilTransport;

/// One outbound request as seen by the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RilRequest {
    /// Hex-encoded TERMINAL RESPONSE.
    TerminalResponse(String),
    /// Hex-encoded ENVELOPE.
    Envelope(String),
    /// SET UP CALL decision.
    CallSetup(bool),
    /// The service reported itself ready.
    ServiceRunning,
}

/// Shared, cloneable view of the requests a [`MockRil`] has sent.
#[derive(Debug, Clone, Default)]
pub struct RilLog {
    inner: Arc<Mutex<Vec<RilRequest>>>,
}

impl RilLog {
    fn lock(&self) -> MutexGuard<'_, Vec<RilRequest>> {
        // A panicking test thread must not hide the log from the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, request: RilRequest) {
        self.lock().push(request);
    }

    /// Every request, in send order.
    pub fn requests(&self) -> Vec<RilRequest> {
        self.lock().clone()
    }

    /// Hex of every terminal response, in send order.
    pub fn terminal_responses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                RilRequest::TerminalResponse(hex) => Some(hex.clone()),
                _ => None,
            })
            .collect()
    }

    /// Hex of every envelope, in send order.
    pub fn envelopes(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                RilRequest::Envelope(hex) => Some(hex.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every SET UP CALL decision, in send order.
    pub fn call_setups(&self) -> Vec<bool> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                RilRequest::CallSetup(accept) => Some(*accept),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A mock [`RilTransport`] that records instead of talking to a modem.
///
/// When disconnected (see [`MockRil::set_connected`]) every call fails with
/// [`Error::Transport`] and nothing is recorded.
#[derive(Debug)]
pub struct MockRil {
    log: RilLog,
    connected: bool,
}

impl MockRil {
    /// Create a new mock in the connected state.
    pub fn new() -> Self {
        MockRil {
            log: RilLog::default(),
            connected: true,
        }
    }

    /// A handle onto this mock's request log.
    pub fn log(&self) -> RilLog {
        self.log.clone()
    }

    /// Set the connected state of the mock.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn record(&self, request: RilRequest) -> Result<()> {
        if !self.connected {
            return Err(Error::Transport("mock RIL disconnected".into()));
        }
        self.log.push(request);
        Ok(())
    }
}

impl Default for MockRil {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RilTransport for MockRil {
    async fn send_terminal_response(&mut self, hex: &str) -> Result<()> {
        self.record(RilRequest::TerminalResponse(hex.to_string()))
    }

    async fn send_envelope(&mut self, hex: &str) -> Result<()> {
        self.record(RilRequest::Envelope(hex.to_string()))
    }

    async fn handle_call_setup_request(&mut self, accept: bool) -> Result<()> {
        self.record(RilRequest::CallSetup(accept))
    }

    async fn report_stk_service_running(&mut self) -> Result<()> {
        self.record(RilRequest::ServiceRunning)
    }
}

//! RIL transport trait.
//!
//! The [`RilTransport`] trait abstracts over the radio interface layer that
//! carries toolkit traffic to the modem and card. The CAT engine in
//! `stklib-cat` never touches the modem directly: it produces hex-encoded
//! terminal responses and envelopes and hands them to a `RilTransport`,
//! which makes the engine testable with `MockRil` from the
//! `stklib-test-harness` crate.

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous outbound channel to the modem/card.
#[async_trait]
pub trait RilTransport: Send + Sync {
    /// Send a TERMINAL RESPONSE, hex-encoded.
    async fn send_terminal_response(&mut self, hex: &str) -> Result<()>;

    /// Send an ENVELOPE (menu selection, event download), hex-encoded.
    async fn send_envelope(&mut self, hex: &str) -> Result<()>;

    /// Answer the modem's pending SET UP CALL request.
    ///
    /// Call setup has its own acknowledgment channel on the modem side, so
    /// the user's decision is passed through here instead of being encoded
    /// as a terminal response.
    async fn handle_call_setup_request(&mut self, accept: bool) -> Result<()>;

    /// Tell the modem the toolkit service is ready to receive proactive
    /// commands. Called once when the service starts.
    async fn report_stk_service_running(&mut self) -> Result<()>;
}

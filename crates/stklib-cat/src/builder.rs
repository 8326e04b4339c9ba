//! CatServiceBuilder -- fluent builder for constructing [`CatService`]
//! instances.
//!
//! # Example
//!
//! ```
//! use stklib_cat::builder::CatServiceBuilder;
//! use stklib_test_harness::MockRil;
//!
//! # async fn example() -> stklib_core::Result<()> {
//! let service = CatServiceBuilder::new()
//!     .language("de")
//!     .event_capacity(16)
//!     .build_with_transport(Box::new(MockRil::new()))
//!     .await?;
//! let events = service.subscribe();
//! # drop(events);
//! # Ok(())
//! # }
//! ```

use tokio::sync::broadcast;
use tracing::debug;

use stklib_core::error::{Error, Result};
use stklib_core::transport::RilTransport;

use crate::engine::CatEngine;
use crate::io::spawn_io_task;
use crate::service::CatService;

/// Fluent builder for [`CatService`].
pub struct CatServiceBuilder {
    language: String,
    event_capacity: usize,
    mailbox_capacity: usize,
    report_running: bool,
}

impl CatServiceBuilder {
    pub fn new() -> Self {
        CatServiceBuilder {
            language: "en".to_string(),
            event_capacity: 64,
            mailbox_capacity: 32,
            report_running: true,
        }
    }

    /// ISO 639 language code returned for PROVIDE LOCAL INFORMATION
    /// (language setting). Default: `"en"`.
    pub fn language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Capacity of the host notification channel (default: 64).
    ///
    /// Subscribers lagging by more than this many events miss the oldest.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Capacity of the inbound message queue (default: 32).
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Whether to call `report_stk_service_running` when the service starts
    /// (default: true).
    pub fn report_running(mut self, enabled: bool) -> Self {
        self.report_running = enabled;
        self
    }

    /// Start a [`CatService`] on a caller-provided transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn build_with_transport(
        self,
        transport: Box<dyn RilTransport>,
    ) -> Result<CatService> {
        if self.language.is_empty() || !self.language.is_ascii() {
            return Err(Error::InvalidParameter(format!(
                "language must be a non-empty ASCII code, got {:?}",
                self.language
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be at least 1".into(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(Error::InvalidParameter(
                "mailbox_capacity must be at least 1".into(),
            ));
        }

        debug!(
            language = %self.language,
            event_capacity = self.event_capacity,
            mailbox_capacity = self.mailbox_capacity,
            "starting CAT service"
        );

        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let engine = CatEngine::new(transport, event_tx.clone(), self.language);
        let io = spawn_io_task(engine, self.mailbox_capacity, self.report_running);
        Ok(CatService::new(io, event_tx))
    }
}

impl Default for CatServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

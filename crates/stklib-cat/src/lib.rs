//! stklib-cat: The card application toolkit (CAT) proactive-command engine.
//!
//! This crate turns decoded proactive commands into host notifications and
//! turns the host's answers back into the card's wire format:
//!
//! - [`tlv`] -- comprehension-TLV / BER-TLV writer primitives
//! - [`gsm`] -- GSM 7-bit default alphabet and UCS2 text encoding
//! - [`response`] -- TERMINAL RESPONSE encoder
//! - [`envelope`] -- MENU SELECTION and EVENT DOWNLOAD envelope encoders
//! - [`engine`] -- the dispatch/correlation state machine
//! - [`service`] / [`builder`] -- the running engine behind an IO task
//!
//! # Example
//!
//! ```no_run
//! use stklib_cat::CatServiceBuilder;
//! use stklib_core::{CatEvent, CatResponseMessage, ResultCode};
//! use stklib_test_harness::MockRil;
//!
//! # async fn example() -> stklib_core::Result<()> {
//! let service = CatServiceBuilder::new()
//!     .build_with_transport(Box::new(MockRil::new()))
//!     .await?;
//! let mut events = service.subscribe();
//!
//! while let Ok(event) = events.recv().await {
//!     if let CatEvent::ProactiveCommand(cmd) = event {
//!         // Render the command, then answer it.
//!         service
//!             .send_response(CatResponseMessage::for_command(&cmd, ResultCode::Ok))
//!             .await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod engine;
pub mod envelope;
pub mod gsm;
mod io;
pub mod response;
pub mod service;
pub mod tlv;

pub use builder::CatServiceBuilder;
pub use engine::{CatEngine, EngineState, Inbound};
pub use service::{CatHandle, CatService};

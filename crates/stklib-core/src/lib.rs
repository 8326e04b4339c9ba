//! stklib-core: Core vocabulary, model, and error definitions for stklib.
//!
//! This crate defines the protocol-agnostic pieces of the card application
//! toolkit (SIM toolkit) engine. Host applications depend on these types to
//! receive proactive commands and build their responses without pulling in
//! the encoder or the engine itself.
//!
//! # Key types
//!
//! - [`CommandDetails`], [`CatCmdMessage`], [`CatResponseMessage`] -- the
//!   command/response model
//! - [`ResultCode`], [`CommandType`], [`ComprehensionTag`] -- wire vocabulary
//! - [`RilTransport`] -- outbound channel to the modem
//! - [`CatEvent`] -- notifications for the host application
//! - [`Error`] / [`Result`] -- error handling

pub mod command;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use stklib_core::*`.
pub use command::{
    Browser, CallSetup, CatCmdMessage, CatResponseMessage, CommandDetails, CommandParams,
    CommandPayload, Duration, Input, Item, LANGUAGE_SETTING, Menu, TextMessage,
};
pub use error::{Error, Result};
pub use events::CatEvent;
pub use transport::RilTransport;
pub use types::*;

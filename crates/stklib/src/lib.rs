//! # stklib -- SIM Toolkit proactive-command engine
//!
//! `stklib` is the proactive-command side of a card application toolkit
//! (CAT, a.k.a. SIM toolkit): it takes proactive commands decoded from the
//! card, hands them to the host application, collects the host's answers,
//! and encodes them back into the card's comprehension-TLV wire format as
//! TERMINAL RESPONSEs and ENVELOPEs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stklib::{CatEvent, CatResponseMessage, CatServiceBuilder, ResultCode};
//! # use stklib::RilTransport;
//!
//! # async fn example(ril: Box<dyn RilTransport>) -> anyhow::Result<()> {
//! let service = CatServiceBuilder::new()
//!     .language("en")
//!     .build_with_transport(ril)
//!     .await?;
//!
//! let mut events = service.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         CatEvent::ProactiveCommand(cmd) => {
//!             println!("card says: {}", cmd.details);
//!             service
//!                 .send_response(CatResponseMessage::for_command(&cmd, ResultCode::Ok))
//!                 .await?;
//!         }
//!         CatEvent::SessionEnded => println!("session over"),
//!         CatEvent::IccStatusChanged { card_present, .. } => {
//!             println!("card present: {card_present}");
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                             |
//! |------------------------|-----------------------------------------------------|
//! | `stklib-core`          | Vocabulary, command model, errors, [`RilTransport`] |
//! | `stklib-cat`           | Encoders, dispatch engine, service and builder      |
//! | `stklib-test-harness`  | `MockRil` for tests                                 |
//! | **`stklib`**           | This facade crate -- re-exports everything          |
//!
//! The decoder that parses raw proactive commands and the RIL that talks to
//! the modem are supplied by the caller.

pub use stklib_core::*;

/// The CAT engine: encoders, dispatch state machine, and service handle.
pub mod cat {
    pub use stklib_cat::*;
}

pub use stklib_cat::{CatHandle, CatService, CatServiceBuilder, EngineState};

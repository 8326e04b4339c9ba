//! stklib-test-harness: Test utilities for stklib.
//!
//! This crate provides [`MockRil`] for deterministic unit testing of the
//! CAT engine without a modem, plus [`RilLog`] for inspecting what the
//! engine sent after it has taken ownership of the mock.

pub mod mock_ril;

pub use mock_ril::{MockRil, RilLog, RilRequest};

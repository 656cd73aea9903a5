//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `wshub` crate.
//!
//! This module centralizes reusable components: the error taxonomy, logging
//! setup and shutdown-signal handling.

pub mod error;
pub mod logging;
pub mod signal;

pub use error::{ConnectionError, HubError};

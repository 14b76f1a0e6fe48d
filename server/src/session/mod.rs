//! Session management for connected clients
//!
//! This module handles:
//! - Decoding request frames from a client stream
//! - Running each request concurrently against the dispatcher
//! - Writing tagged responses back through a shared writer

mod connection;

pub use connection::{ClientSession, SessionHandle, DEFAULT_MAX_IN_FLIGHT};

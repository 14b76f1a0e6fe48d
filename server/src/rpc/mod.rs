//! Request dispatch for the five boundary operations
//!
//! This module handles:
//! - Validating raw request fields (enum ordinals, action parameters)
//! - Routing each call to the registry or the action tracker
//! - Converting domain failures into wire error codes

mod dispatcher;
mod error;

pub use dispatcher::RequestDispatcher;
pub use error::fleet_error_to_rpc;

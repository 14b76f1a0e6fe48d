//! Device fleet state-tracking service
//!
//! Keeps a registry of devices and their status, tracks long-running device
//! actions, and answers the five fleet operations over length-prefixed
//! protobuf frames.

pub mod config;
pub mod error;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod service;
pub mod session;
pub mod tracker;

pub use config::ServerConfig;
pub use error::{FleetError, FleetResult};
pub use rpc::RequestDispatcher;
pub use service::FleetService;

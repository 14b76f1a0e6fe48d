//! Fleet Client
//!
//! Async client for the device fleet management service. Devices are
//! registered and updated by id, and long-running actions such as software
//! updates are started and then polled by action id.
//!
//! ```no_run
//! use fleet_client::FleetClient;
//! use fleet_shared::{ActionType, DeviceStatus};
//!
//! # async fn demo() -> Result<(), fleet_client::ClientError> {
//! let mut client = FleetClient::connect("localhost:50051").await?;
//! client.register_device(1, DeviceStatus::Idle).await?;
//! let started = client
//!     .initiate_device_action(1, ActionType::SoftwareUpdate, "2.4.0")
//!     .await?;
//! let status = client.get_device_action(1, started.action_id).await?;
//! println!("action {} is {}", started.action_id, fleet_shared::action_status_name(status));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod transport;

pub use client::{ClientError, DeviceInfo, FleetClient, StartedAction};
pub use transport::{TcpConnector, TransportConnector, TransportStream};

use crate::error::FleetError;
use fleet_shared::RpcError;

/// Convert a domain error to its wire representation
pub fn fleet_error_to_rpc(error: FleetError) -> RpcError {
    RpcError::new(error.code(), error.to_string())
}

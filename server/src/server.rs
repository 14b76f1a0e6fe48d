//! TCP accept loop

use crate::rpc::RequestDispatcher;
use crate::session::ClientSession;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Accept clients until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<RequestDispatcher>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("Server listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting clients");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        if let Err(e) = socket.set_nodelay(true) {
                            debug!(peer = %addr, "Failed to set TCP_NODELAY: {}", e);
                        }
                        let session = ClientSession::new(socket, addr.to_string());
                        tokio::spawn(session.serve(dispatcher.clone()));
                    }
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning
                        warn!("Accept error: {}", e);
                        sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    }

    Ok(())
}

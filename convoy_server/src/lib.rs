//! TCP front end for the driver hub: newline-delimited JSON events, one
//! session task per connection.

pub mod codec;
pub mod config;
mod connection;

use std::{io, sync::Arc, time::Duration};

use anyhow::Result;
use driver_hub::HubHandle;
use tokio::net::TcpListener;

pub use codec::{CodecError, EventCodec};
pub use config::Config;

// EMFILE and ENFILE
const FD_EXHAUSTED: [i32; 2] = [24, 23];
const FD_BACKOFF: Duration = Duration::from_millis(100);

/// How long to pause before the next `accept` after it failed with `err`.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.raw_os_error() {
        Some(code) if FD_EXHAUSTED.contains(&code) => Some(FD_BACKOFF),
        _ => None,
    }
}

pub async fn serve(listener: TcpListener, config: Config) -> Result<()> {
    let config = Arc::new(config);
    let (hub, _hub_task) = HubHandle::spawn(config.client_buffer);
    log::info!("accepting drivers on {}", listener.local_addr()?);
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("failed to accept connection: {e}");
                if let Some(pause) = accept_backoff(&e) {
                    tokio::time::sleep(pause).await;
                }
                continue;
            }
        };
        if let Err(e) = socket.set_nodelay(true) {
            log::warn!("{addr}: could not set TCP_NODELAY: {e}");
        }
        let hub = hub.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = connection::handle_client(socket, addr, hub, config).await {
                log::warn!("{addr}: connection ended with error: {e:#}");
            }
        });
    }
}

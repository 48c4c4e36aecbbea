use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use driver_hub::{ConnectionId, ErrorReport, HubHandle, Outbound, ServerEvent};
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    select,
    sync::mpsc::Receiver,
    time::{self, Instant},
};
use tokio_util::codec::Framed;

use crate::{codec::EventCodec, config::Config};

/// Runs one client connection until it closes, then tells the hub it left.
pub async fn handle_client(stream: TcpStream, addr: SocketAddr, hub: HubHandle, config: Arc<Config>) -> Result<()> {
    let (id, outbound) = hub.connect().await?;
    log::info!("{addr}: connected as {id}");

    let framed = Framed::new(stream, EventCodec::with_max_length(config.max_frame_length));
    let result = session(framed, &id, addr, outbound, &hub, &config).await;

    hub.disconnect(id.clone()).await?;
    log::info!("{addr}: {id} disconnected");
    result
}

async fn session(
    mut framed: Framed<TcpStream, EventCodec>,
    id: &ConnectionId,
    addr: SocketAddr,
    mut outbound: Receiver<Outbound>,
    hub: &HubHandle,
    config: &Config,
) -> Result<()> {
    let idle_timeout = config.idle_timeout();
    let idle = time::sleep(idle_timeout.unwrap_or(time::Duration::MAX));
    tokio::pin!(idle);

    loop {
        select! {
            frame = framed.next() => {
                if let Some(timeout) = idle_timeout {
                    idle.as_mut().reset(Instant::now() + timeout);
                }
                match frame {
                    Some(Ok(Ok(event))) => {
                        hub.dispatch(id, event).await?;
                    }
                    Some(Ok(Err(e))) => {
                        log::warn!("{addr}: rejected frame from {id}: {e}");
                        framed.send(ServerEvent::Error(ErrorReport::from(&e))).await?;
                    }
                    Some(Err(e)) => {
                        log::warn!("{addr}: error reading from {id}: {e}");
                        return Err(e.into());
                    }
                    None => return Ok(()),
                }
            }
            event = outbound.recv() => match event {
                Some(event) => framed.send(event).await?,
                None => return Ok(()),
            },
            _ = &mut idle, if idle_timeout.is_some() => {
                log::warn!("{addr}: {id} idle for {}s, closing", config.idle_timeout_secs);
                return Ok(());
            }
        }
    }
}

//! The hub task.
//!
//! A single task owns the [`Hub`] and drains one command queue, so handlers
//! never overlap and the registry needs no lock. Commands from one connection
//! arrive in the order that connection issued them.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    driver::{ConnectionId, Driver},
    event::ClientEvent,
    hub::Hub,
    transport::{outbound_channel, ChannelTransport, Outbound},
};

const COMMAND_QUEUE: usize = 256;

#[derive(Debug)]
enum Command {
    Connect {
        id: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
    },
    Event {
        id: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        id: ConnectionId,
    },
    Drivers {
        reply: oneshot::Sender<Vec<Driver>>,
    },
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("driver hub has shut down")]
    Closed,
}

impl<T> From<mpsc::error::SendError<T>> for HubError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        HubError::Closed
    }
}

/// Cloneable entry point for connections.
#[derive(Clone, Debug)]
pub struct HubHandle {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    client_buffer: usize,
}

impl HubHandle {
    /// Starts the hub task. It stops once every handle has been dropped.
    pub fn spawn(client_buffer: usize) -> (HubHandle, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE);
        let task = tokio::spawn(run(Hub::new(ChannelTransport::new()), receiver));
        let handle = HubHandle {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            client_buffer: client_buffer.max(1),
        };
        (handle, task)
    }

    /// Registers a new connection with the transport. No driver exists until
    /// the connection sends `join`.
    pub async fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<Outbound>), HubError> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = ConnectionId::new(format!("driver-{n}"));
        let (outbound, receiver) = outbound_channel(self.client_buffer);
        self.commands
            .send(Command::Connect {
                id: id.clone(),
                outbound,
            })
            .await?;
        Ok((id, receiver))
    }

    pub async fn dispatch(&self, id: &ConnectionId, event: ClientEvent) -> Result<(), HubError> {
        self.commands
            .send(Command::Event {
                id: id.clone(),
                event,
            })
            .await?;
        Ok(())
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), HubError> {
        self.commands.send(Command::Disconnect { id }).await?;
        Ok(())
    }

    pub async fn drivers(&self) -> Result<Vec<Driver>, HubError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Drivers { reply }).await?;
        response.await.map_err(|_| HubError::Closed)
    }
}

async fn run(mut hub: Hub<ChannelTransport>, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Connect { id, outbound } => {
                if hub.transport_mut().register(id.clone(), outbound).is_some() {
                    log::warn!("{}: connection id reused, replacing outbound queue", id);
                }
                hub.on_connect(&id);
            }
            Command::Event { id, event } => {
                log::debug!("{}: {}", id, event.name());
                hub.handle(&id, event);
            }
            Command::Disconnect { id } => {
                hub.transport_mut().unregister(&id);
                hub.on_disconnect(&id);
            }
            Command::Drivers { reply } => {
                let _ = reply.send(hub.drivers());
            }
        }
    }
    log::info!("driver hub stopped ({} drivers dropped)", hub.state().len());
}

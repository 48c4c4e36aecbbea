use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc::{self, error::TrySendError, Sender};

use crate::{driver::ConnectionId, event::ServerEvent};

/// Shared by every recipient of a single broadcast.
pub type Outbound = Arc<ServerEvent>;

/// Per-recipient outcome of one send or broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fanout {
    pub sent: usize,
    pub dropped: usize,
}

impl Fanout {
    fn record(&mut self, delivered: bool) {
        if delivered {
            self.sent += 1;
        } else {
            self.dropped += 1;
        }
    }
}

/// Outbound delivery used by the hub.
///
/// Sends are fire-and-forget. A failure to reach one recipient must not stop
/// delivery to the rest.
pub trait Transport {
    fn send_to(&mut self, to: &ConnectionId, event: ServerEvent) -> Fanout;

    fn broadcast_except(&mut self, except: &ConnectionId, event: ServerEvent) -> Fanout;

    fn broadcast(&mut self, event: ServerEvent) -> Fanout;
}

/// Delivers events into one bounded queue per open connection.
///
/// Membership is transport-level: a connection is registered from connect to
/// disconnect whether or not it ever joins.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    clients: HashMap<ConnectionId, Sender<Outbound>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, sender: Sender<Outbound>) -> Option<Sender<Outbound>> {
        self.clients.insert(id, sender)
    }

    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn broadcast_filtered(&self, except: Option<&ConnectionId>, event: ServerEvent) -> Fanout {
        let event = Arc::new(event);
        let mut fanout = Fanout::default();
        for (id, sender) in &self.clients {
            if Some(id) == except {
                continue;
            }
            fanout.record(deliver(id, sender, &event));
        }
        log::trace!("broadcast: sent={} dropped={}", fanout.sent, fanout.dropped);
        fanout
    }
}

fn deliver(id: &ConnectionId, sender: &Sender<Outbound>, event: &Outbound) -> bool {
    match sender.try_send(Arc::clone(event)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::warn!("{}: outbound queue full, dropping event", id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            log::debug!("{}: outbound queue closed", id);
            false
        }
    }
}

impl Transport for ChannelTransport {
    fn send_to(&mut self, to: &ConnectionId, event: ServerEvent) -> Fanout {
        let mut fanout = Fanout::default();
        match self.clients.get(to) {
            Some(sender) => fanout.record(deliver(to, sender, &Arc::new(event))),
            None => {
                log::debug!("{}: not connected, dropping event", to);
                fanout.record(false);
            }
        }
        fanout
    }

    fn broadcast_except(&mut self, except: &ConnectionId, event: ServerEvent) -> Fanout {
        self.broadcast_filtered(Some(except), event)
    }

    fn broadcast(&mut self, event: ServerEvent) -> Fanout {
        self.broadcast_filtered(None, event)
    }
}

/// Creates the queue a connection reads its outbound events from.
pub fn outbound_channel(capacity: usize) -> (Sender<Outbound>, mpsc::Receiver<Outbound>) {
    mpsc::channel(capacity.max(1))
}

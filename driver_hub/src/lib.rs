//! Presence and position broadcast hub for a convoy of drivers.
//!
//! Connected clients `join` with arbitrary metadata, report positions with
//! `updatePosition`, and are announced to everyone else when they disconnect.
//! The registry lives in memory only.

pub mod driver;
pub mod event;
pub mod hub;
pub mod service;
pub mod state;
pub mod transport;

pub use driver::{ConnectionId, Driver, Metadata, PositionUpdate};
pub use event::{ClientEvent, ErrorKind, ErrorReport, EventError, ServerEvent};
pub use hub::Hub;
pub use service::{HubError, HubHandle};
pub use state::State;
pub use transport::{ChannelTransport, Fanout, Outbound, Transport};

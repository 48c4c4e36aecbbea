//! Events exchanged between the hub and its connections.
//!
//! Every frame is one JSON object of the form `{"event": <name>, "data": <payload>}`.
//! Inbound frames go through [`ClientEvent::parse`], which is the only place a
//! payload's shape is checked. Anything it rejects never reaches the hub.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::driver::{ConnectionId, Driver, Metadata, PositionUpdate};

const JOIN: &str = "join";
const UPDATE_POSITION: &str = "updatePosition";

/// An event sent by a connection to the hub.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join(Metadata),
    UpdatePosition(PositionUpdate),
}

/// An event sent by the hub to one or more connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    AllDrivers(Vec<Driver>),
    DriverMoved(Driver),
    DriverLeft(ConnectionId),
    Error(ErrorReport),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<ClientEvent, EventError> {
        Self::parse_slice(frame.as_bytes())
    }

    pub fn parse_slice(frame: &[u8]) -> Result<ClientEvent, EventError> {
        let Envelope { event, data } = serde_json::from_slice(frame)?;
        match event.as_str() {
            JOIN => {
                let metadata = match data {
                    Value::Null => Metadata::new(),
                    data => serde_json::from_value(data)
                        .map_err(|source| EventError::MalformedPayload { event: JOIN, source })?,
                };
                Ok(ClientEvent::Join(metadata))
            }
            UPDATE_POSITION => {
                let update = serde_json::from_value(data).map_err(|source| {
                    EventError::MalformedPayload {
                        event: UPDATE_POSITION,
                        source,
                    }
                })?;
                Ok(ClientEvent::UpdatePosition(update))
            }
            _ => Err(EventError::UnknownEvent(event)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => JOIN,
            ClientEvent::UpdatePosition(_) => UPDATE_POSITION,
        }
    }
}

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("malformed `{event}` payload: {source}")]
    MalformedPayload {
        event: &'static str,
        source: serde_json::Error,
    },
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::InvalidJson(_) => ErrorKind::InvalidJson,
            EventError::UnknownEvent(_) => ErrorKind::UnknownEvent,
            EventError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidJson,
    UnknownEvent,
    MalformedPayload,
}

/// What a connection is told when one of its frames is rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EventError> for ErrorReport {
    fn from(err: &EventError) -> Self {
        ErrorReport {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

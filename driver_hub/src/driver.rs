use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied join metadata, passed through untouched.
pub type Metadata = Map<String, Value>;

/// Fields owned by the hub. Metadata keys with these names are dropped at join.
const RESERVED_KEYS: [&str; 4] = ["id", "lat", "lon", "speed"];

/// Opaque identifier of one transport connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        ConnectionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        ConnectionId::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        ConnectionId(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position report as sent by a driver's GPS source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
}

/// One connected client sharing its position.
///
/// Serializes flat: `{"id": .., "lat": .., "lon": .., "speed": .., ..metadata}`,
/// with `speed` omitted until the first update arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: ConnectionId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Driver {
    pub fn new(id: ConnectionId, mut metadata: Metadata) -> Self {
        for key in RESERVED_KEYS {
            if metadata.remove(key).is_some() {
                log::debug!("{}: dropping reserved metadata key `{}`", id, key);
            }
        }
        Driver {
            id,
            lat: 0.0,
            lon: 0.0,
            speed: None,
            metadata,
        }
    }

    pub fn apply(&mut self, update: &PositionUpdate) {
        self.lat = update.lat;
        self.lon = update.lon;
        self.speed = Some(update.speed);
    }
}

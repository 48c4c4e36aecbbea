use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::codec::DEFAULT_MAX_FRAME_LENGTH;

/// Realtime convoy position server.
#[derive(Clone, Debug, Parser)]
#[command(name = "convoy_server", version)]
pub struct Config {
    /// Address to accept driver connections on.
    #[arg(long, env = "CONVOY_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Outbound events queued per connection before new ones are dropped.
    #[arg(long, env = "CONVOY_CLIENT_BUFFER", default_value_t = 32)]
    pub client_buffer: usize,

    /// Longest accepted inbound frame, in bytes.
    #[arg(long, env = "CONVOY_MAX_FRAME_LENGTH", default_value_t = DEFAULT_MAX_FRAME_LENGTH)]
    pub max_frame_length: usize,

    /// Close connections that send nothing for this many seconds. 0 disables.
    #[arg(long, env = "CONVOY_IDLE_TIMEOUT_SECS", default_value_t = 0)]
    pub idle_timeout_secs: u64,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "CONVOY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            client_buffer: 32,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            idle_timeout_secs: 0,
            log_level: "info".to_string(),
        }
    }
}

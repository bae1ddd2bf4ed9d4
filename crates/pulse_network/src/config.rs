//! Network configuration types and defaults.

use crate::error::NetworkError;
use std::net::SocketAddr;
use std::time::Duration;

/// Default tick rate of the network loop.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 20;

/// Configuration for the network core.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// The socket address to listen on
    pub bind_address: SocketAddr,

    /// How many times per second the network ticks
    pub ticks_per_second: u32,

    /// Maximum number of concurrent sessions
    pub max_connections: usize,

    /// Whether new sessions read without waiting for the tick
    pub auto_read: bool,

    /// Longest accepted inbound line, in bytes
    pub max_frame_length: usize,

    /// Per-channel queue capacity; `None` for unbounded queues
    pub queue_capacity: Option<usize>,

    /// Pending connection backlog passed to `listen`
    pub listen_backlog: i32,
}

impl NetworkConfig {
    /// Time between two ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.ticks_per_second.max(1)
    }

    /// Checks the configuration for values the network cannot run with.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.ticks_per_second == 0 || self.ticks_per_second > 1000 {
            return Err(NetworkError::Config(format!(
                "ticks_per_second must be between 1 and 1000, got {}",
                self.ticks_per_second
            )));
        }

        if self.max_connections == 0 {
            return Err(NetworkError::Config("max_connections must be greater than 0".to_string()));
        }

        if self.max_frame_length == 0 {
            return Err(NetworkError::Config("max_frame_length must be greater than 0".to_string()));
        }

        if self.queue_capacity == Some(0) {
            return Err(NetworkError::Config("queue_capacity must be greater than 0 when set".to_string()));
        }

        if self.listen_backlog <= 0 {
            return Err(NetworkError::Config("listen_backlog must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 25565)),
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            max_connections: 1000,
            auto_read: false,
            max_frame_length: 32 * 1024,
            queue_capacity: None,
            listen_backlog: 1024,
        }
    }
}

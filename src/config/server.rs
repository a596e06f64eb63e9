//! Listener configuration.

use serde::Deserialize;

/// Default port for the event-source listener.
pub const DEFAULT_EVENT_SOURCE_PORT: u16 = 9090;
/// Default port for the subscriber listener.
pub const DEFAULT_SUBSCRIBER_PORT: u16 = 9099;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind both listeners to.
    pub host: String,
    /// Port accepting the event-source connection. 0 picks an ephemeral port.
    pub event_source_port: u16,
    /// Port accepting subscriber connections. 0 picks an ephemeral port.
    pub subscriber_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            event_source_port: DEFAULT_EVENT_SOURCE_PORT,
            subscriber_port: DEFAULT_SUBSCRIBER_PORT,
        }
    }
}

impl ServerConfig {
    /// Loopback listeners on ephemeral ports.
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            event_source_port: 0,
            subscriber_port: 0,
        }
    }
}

//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8080`, `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections; upgrades beyond this are
    /// refused with 503.
    pub max_connections: usize,
    /// Inactivity deadline in seconds. A connection with no inbound frame or
    /// pong within this window is considered dead.
    pub idle_timeout_secs: u64,
    /// Liveness probe interval in milliseconds. Kept strictly shorter than
    /// the idle deadline (9/10 of it by default) so at least one ping goes
    /// out before the peer's deadline could lapse.
    pub probe_interval_millis: u64,
    /// Capacity of each connection's outbound frame queue. Frames beyond
    /// this are dropped, never buffered unboundedly.
    pub outbound_queue_capacity: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            max_connections: 256,
            idle_timeout_secs: 10,
            probe_interval_millis: 9_000,
            outbound_queue_capacity: 64,
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}

impl ServerConfig {
    /// Inactivity deadline as a `Duration`.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Liveness probe interval as a `Duration`.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_and_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn default_max_connections() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_connections, 256);
    }

    #[test]
    fn default_probe_interval_is_nine_tenths_of_deadline() {
        let cfg = ServerConfig::default();
        let deadline_millis = cfg.idle_timeout_secs * 1_000;
        assert_eq!(cfg.probe_interval_millis, deadline_millis * 9 / 10);
    }

    #[test]
    fn probe_interval_shorter_than_deadline() {
        let cfg = ServerConfig::default();
        assert!(cfg.probe_interval() < cfg.idle_timeout());
    }

    #[test]
    fn duration_accessors() {
        let cfg = ServerConfig {
            idle_timeout_secs: 4,
            probe_interval_millis: 3_600,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(4));
        assert_eq!(cfg.probe_interval(), Duration::from_millis(3_600));
    }

    #[test]
    fn default_queue_capacity() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.outbound_queue_capacity, 64);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.max_connections, cfg.max_connections);
        assert_eq!(back.idle_timeout_secs, cfg.idle_timeout_secs);
        assert_eq!(back.probe_interval_millis, cfg.probe_interval_millis);
        assert_eq!(back.outbound_queue_capacity, cfg.outbound_queue_capacity);
        assert_eq!(back.max_message_size, cfg.max_message_size);
    }

    #[test]
    fn deserialize_from_json_string() {
        let json = r#"{"host":"0.0.0.0","port":3000,"max_connections":5,"idle_timeout_secs":20,"probe_interval_millis":18000,"outbound_queue_capacity":8,"max_message_size":512}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.outbound_queue_capacity, 8);
    }
}

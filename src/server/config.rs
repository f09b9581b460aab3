//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Paths the server always routes itself
pub(crate) const RESERVED_PATHS: [&str; 4] = ["/", "/index.html", "/snapshot.jpg", "/stats"];

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent requests, open streams included (0 = unlimited)
    pub max_connections: usize,

    /// Path of the MJPEG stream
    pub stream_path: String,

    /// How long open responses get to finish once shutdown starts
    pub drain_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 0, // Unlimited
            stream_path: "/video_feed".to_string(),
            drain_timeout: Duration::from_secs(5),
            tcp_nodelay: true, // one part per write, no coalescing delay
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the port, keeping the host
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the stream path (a leading `/` is added if missing)
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.stream_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set the drain timeout
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Check the values the router depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = self.stream_path.as_str();
        if !path.starts_with('/') || path.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "server.stream_path {:?} must be an absolute path below /",
                path
            )));
        }
        // ':' and '*' would turn the route into a capture
        if path.contains([':', '*', '{', '}', '?', '#']) {
            return Err(ConfigError::Invalid(format!(
                "server.stream_path {:?} contains a reserved character",
                path
            )));
        }
        if RESERVED_PATHS.contains(&path) {
            return Err(ConfigError::Invalid(format!(
                "server.stream_path {:?} collides with a built-in route",
                path
            )));
        }
        if self.drain_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "server.drain_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

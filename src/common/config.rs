//! Configuration for bytekv servers

use serde::{Deserialize, Serialize};

/// Port a server binds when none is chosen explicitly
pub const DEFAULT_PORT: u16 = 8001;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network interface to listen on ("*" means all interfaces)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port selection
    #[serde(default)]
    pub port: Port,

    /// Bucket count parameter: the store creates `buckets + 1` buckets,
    /// named "0" through "buckets"
    #[serde(default = "default_buckets")]
    pub buckets: usize,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_buckets() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: Port::default(),
            buckets: default_buckets(),
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind, after normalizing `bind` and `port`.
    pub fn listen_addr(&self) -> String {
        let host = if self.bind == "*" {
            "0.0.0.0"
        } else {
            self.bind.as_str()
        };
        format!("{}:{}", host, self.port.number())
    }
}

/// How the listening port is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    /// Bind [`DEFAULT_PORT`]
    #[default]
    Default,
    /// Let the OS pick an ephemeral port
    Auto,
    /// Bind a specific port
    Fixed(u16),
}

impl Port {
    fn number(self) -> u16 {
        match self {
            Port::Default => DEFAULT_PORT,
            Port::Auto => 0,
            Port::Fixed(port) => port,
        }
    }
}

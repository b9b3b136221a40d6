use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP endpoint the command listener binds to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Host name or address to bind.
    pub host: String,
    /// TCP port; `0` requests an ephemeral port.
    pub port: u16,
}

impl ServiceEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback endpoint on an ephemeral port, mostly useful in tests.
    #[must_use]
    pub fn loopback_ephemeral() -> Self {
        Self::tcp("127.0.0.1", 0)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

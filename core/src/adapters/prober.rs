//! TCP bind based port prober.

use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

use crate::error::Result;
use crate::ports::PortProber;

/// Probes ports by briefly binding a listener to them.
///
/// A port counts as free only when it can be bound on both the wildcard
/// address and loopback, so servers listening on either are detected.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsPortProber;

impl OsPortProber {
    pub fn new() -> Self {
        Self
    }

    /// Check whether `port` can be bound right now.
    pub fn is_free(port: u16) -> bool {
        if port == 0 {
            return false;
        }
        [Ipv4Addr::UNSPECIFIED, Ipv4Addr::LOCALHOST]
            .into_iter()
            .all(|addr| TcpListener::bind((addr, port)).is_ok())
    }
}

impl PortProber for OsPortProber {
    fn nearest_free(&self, port: u16) -> Result<u16> {
        for candidate in port..=u16::MAX {
            if Self::is_free(candidate) {
                if candidate != port {
                    debug!(requested = port, suggested = candidate, "Port busy, suggesting next free");
                }
                return Ok(candidate);
            }
        }

        // Nothing above the request is free; let the OS pick an ephemeral port.
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        let ephemeral = listener.local_addr()?.port();
        debug!(requested = port, suggested = ephemeral, "Falling back to ephemeral port");
        Ok(ephemeral)
    }
}

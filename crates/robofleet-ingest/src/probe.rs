//! Pre-commit reachability check for a robot endpoint

use robofleet_config::FleetConfig;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// Opens and immediately closes a TCP connection with a bounded timeout.
///
/// Never returns an error: resolution and connect failures both map to
/// [`ProbeOutcome::Unreachable`] with the reason attached.
#[derive(Debug, Clone, Copy)]
pub struct ConnectivityProbe {
    timeout: Duration,
}

impl Default for ConnectivityProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl ConnectivityProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(Duration::from_millis(config.timeouts.probe_timeout_ms))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn probe(&self, address: &str, port: u16) -> ProbeOutcome {
        let endpoint = format!("{}:{}", address, port);
        debug!("[PROBE] checking {}", endpoint);

        let addrs = match (address, port).to_socket_addrs() {
            Ok(addrs) => addrs.collect::<Vec<_>>(),
            Err(e) => {
                return ProbeOutcome::Unreachable {
                    reason: format!("failed to resolve {}: {}", endpoint, e),
                }
            }
        };
        if addrs.is_empty() {
            return ProbeOutcome::Unreachable {
                reason: format!("no resolved addresses for {}", endpoint),
            };
        }

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_stream) => {
                    debug!("[PROBE] {} is reachable", endpoint);
                    return ProbeOutcome::Reachable;
                }
                Err(e) => last_error = Some(e),
            }
        }

        ProbeOutcome::Unreachable {
            reason: match last_error {
                Some(e) => format!("{} not reachable: {}", endpoint, e),
                None => format!("{} not reachable", endpoint),
            },
        }
    }
}

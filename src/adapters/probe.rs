//! TCP reachability probe.
//!
//! Implements [`ConnectivityPort`] by opening a TCP connection to a
//! well-known `host:port` (default `1.1.1.1:53`) with a bounded timeout.
//! A completed handshake means reachable.  A refusal or unreachable route
//! means not reachable.  A timeout is reported as an error, which the
//! runtime also treats as not reachable.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::app::ports::ConnectivityPort;
use crate::error::ProbeError;

pub struct TcpProbe {
    target: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            target: target.into(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn resolve(&self) -> Result<SocketAddr, ProbeError> {
        self.target
            .to_socket_addrs()
            .map_err(|_| ProbeError::BadTarget)?
            .next()
            .ok_or(ProbeError::BadTarget)
    }
}

impl ConnectivityPort for TcpProbe {
    fn probe_now(&mut self) -> Result<bool, ProbeError> {
        let addr = self.resolve()?;
        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(ProbeError::Timeout),
            Err(e) => {
                debug!("probe {addr}: {e}");
                Ok(false)
            }
        }
    }
}

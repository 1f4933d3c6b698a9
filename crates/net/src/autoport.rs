//! Auto-port LAN hosting
//!
//! Tries `base, base + 1, ..., base + max_attempts` in order and keeps the
//! first port that binds. Networking is torn down before every attempt so a
//! half-started transport never bleeds into the next one, and again after the
//! last failure so exhaustion leaves nothing running.

use std::fmt;

use tracing::{info, warn};

use crate::error::NetStartResult;
use crate::session::Session;
use crate::transport::Transport;

/// Result of binding one candidate port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostAttempt {
    pub port: u16,
    pub outcome: NetStartResult,
}

impl fmt::Display for HostAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}: {}", self.port, self.outcome)
    }
}

/// Ports to try, in order. Never goes past 65535.
pub fn candidate_ports(base: u16, max_attempts: u16) -> impl Iterator<Item = u16> {
    let first = u32::from(base);
    let last = (first + u32::from(max_attempts)).min(u32::from(u16::MAX));
    (first..=last).filter_map(|port| u16::try_from(port).ok())
}

/// Run `attempt` on each candidate port until one succeeds.
///
/// Returns the winning port, or `None` once every candidate has failed.
pub fn scan_ports<F>(base: u16, max_attempts: u16, mut attempt: F) -> Option<u16>
where
    F: FnMut(u16) -> NetStartResult,
{
    for port in candidate_ports(base, max_attempts) {
        let outcome = HostAttempt {
            port,
            outcome: attempt(port),
        };
        if outcome.outcome.is_success() {
            info!(attempt = %outcome, "Host port bound");
            return Some(port);
        }
        warn!(attempt = %outcome, "Host port unavailable");
    }
    None
}

/// Host `session` on the first free port starting at `base`
pub fn host_with_retry<T: Transport>(
    session: &mut Session<T>,
    base: u16,
    max_attempts: u16,
) -> (NetStartResult, Option<u16>) {
    if session.transport().is_none() {
        return (NetStartResult::NotInitialized, None);
    }

    let chosen = scan_ports(base, max_attempts, |port| {
        session.shutdown();
        session.host_lan(port)
    });

    match chosen {
        // Port 0 resolves to whatever the transport actually bound
        Some(port) => (NetStartResult::Success, session.bound_port().or(Some(port))),
        None => {
            session.shutdown();
            warn!(base = base, max_attempts = max_attempts, "No free host port");
            (NetStartResult::TransportError, None)
        }
    }
}

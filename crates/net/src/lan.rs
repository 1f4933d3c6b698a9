//! LAN address helpers

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

/// Routable address used to pick the outbound interface. Nothing is sent.
const PROBE_ADDR: &str = "8.8.8.8:80";

/// Best guess at this machine's LAN IPv4 address, for showing to players
/// who want to join. Falls back to loopback when there is no route.
pub fn local_ipv4() -> IpAddr {
    match probe_local_ipv4() {
        Ok(ip) => ip,
        Err(e) => {
            debug!(error = %e, "Local address probe failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn probe_local_ipv4() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
    socket.connect(PROBE_ADDR)?;
    match socket.local_addr()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Ok(IpAddr::V4(ip)),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no usable IPv4 address (got {})", other),
        )),
    }
}

/// `ip:port` string shown in the menu after a successful host
pub fn display_address(port: u16) -> String {
    format!("{}:{}", local_ipv4(), port)
}

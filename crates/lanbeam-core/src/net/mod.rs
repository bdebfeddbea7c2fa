//! Network addressing helpers.
//!
//! Devices are identified by the address they connect from. Behind a
//! reverse proxy that address arrives in `X-Real-IP` or `X-Forwarded-For`,
//! so those take precedence over the socket's peer address.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Header set by reverse proxies carrying the client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Header listing the client address followed by any proxies.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Path of the page phones open to connect.
pub const UPLOAD_PAGE_PATH: &str = "/static/upload.html";

/// Detect the address this host uses on the local network.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick the
/// outbound interface. Falls back to `127.0.0.1` without a usable route.
#[must_use]
pub fn local_ip() -> IpAddr {
    let detect = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("10.255.255.255:1")?;
        Ok(socket.local_addr()?.ip())
    };

    detect().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Derive a device's address from proxy headers and its peer address.
///
/// Order: `X-Real-IP`, then the first entry of `X-Forwarded-For`, then the
/// peer address. Empty header values are skipped.
#[must_use]
pub fn client_address(real_ip: Option<&str>, forwarded_for: Option<&str>, peer: IpAddr) -> String {
    real_ip
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            forwarded_for
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map_or_else(|| peer.to_string(), str::to_string)
}

/// URL of the upload page for a host reachable at `ip:port`.
#[must_use]
pub fn upload_page_url(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("http://{v4}:{port}{UPLOAD_PAGE_PATH}"),
        IpAddr::V6(v6) => format!("http://[{v6}]:{port}{UPLOAD_PAGE_PATH}"),
    }
}

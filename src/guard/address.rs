use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";
const IPV6_PREFIX_MASK: u128 = u128::MAX << 64;

/// Client address as used for the failed-login ledger key.
///
/// IPv6 clients are keyed by their /64 so rotating the interface identifier
/// does not buy a fresh counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientAddress(IpAddr);

impl ClientAddress {
    pub fn normalize(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => ClientAddress(ip),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => ClientAddress(IpAddr::V4(v4)),
                None => {
                    let prefix = u128::from(v6) & IPV6_PREFIX_MASK;
                    ClientAddress(IpAddr::V6(Ipv6Addr::from(prefix)))
                }
            },
        }
    }

    /// Picks the first `X-Forwarded-For` hop when trusted and parseable,
    /// otherwise the TCP peer.
    pub fn resolve(headers: &HeaderMap, peer: IpAddr, trust_forwarded_for: bool) -> Self {
        let forwarded = if trust_forwarded_for {
            forwarded_for(headers)
        } else {
            None
        };
        Self::normalize(forwarded.unwrap_or(peer))
    }

    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let raw = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    match first.parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            tracing::debug!(value = first, "ignoring unparseable X-Forwarded-For");
            None
        }
    }
}

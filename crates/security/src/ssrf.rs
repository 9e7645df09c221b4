//! SSRF guard — validates that an outbound connector URL cannot reach
//! loopback, link-local, or other internal address space.
//!
//! DNS rebinding (the gap between this check and the connection the HTTP
//! transport later makes) is a known, accepted limitation — see the design
//! notes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::Url;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SsrfError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("protocol not allowed: {0}")]
    ProtocolNotAllowed(String),
    #[error("target not allowed: {0}")]
    TargetNotAllowed(String),
    #[error("dns resolution failed for {host}: {reason}")]
    DnsResolutionFailed { host: String, reason: String },
}

/// Blocked IPv4 ranges, as (network, prefix_len).
const BLOCKED_V4: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
];

/// Blocked IPv6 ranges, as (network, prefix_len).
const BLOCKED_V6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::UNSPECIFIED, 128),
    (Ipv6Addr::LOCALHOST, 128),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
];

fn v4_in_network(addr: Ipv4Addr, network: Ipv4Addr, prefix_len: u8) -> bool {
    let mask = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };
    (u32::from(addr) & mask) == (u32::from(network) & mask)
}

fn v6_in_network(addr: Ipv6Addr, network: Ipv6Addr, prefix_len: u8) -> bool {
    let mask = if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len)
    };
    (u128::from(addr) & mask) == (u128::from(network) & mask)
}

/// Returns true if `addr` falls inside any blocked range for its family.
pub fn is_blocked_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => BLOCKED_V4
            .iter()
            .any(|&(net, len)| v4_in_network(v4, net, len)),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_blocked_address(IpAddr::V4(mapped));
            }
            BLOCKED_V6
                .iter()
                .any(|&(net, len)| v6_in_network(v6, net, len))
        }
    }
}

/// Parse `raw_url`, enforce scheme/hostname rules, and return the parsed URL
/// alongside its hostname for the caller to resolve.
///
/// Resolution itself lives in the caller since the blocking trait boundary
/// between DNS and async varies by call site; this function does the pure,
/// synchronous parts of the contract.
pub fn validate_syntax(raw_url: &str) -> Result<Url, SsrfError> {
    let url = Url::parse(raw_url).map_err(|e| SsrfError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(SsrfError::ProtocolNotAllowed(other.to_string())),
    }

    let host = url
        .host_str()
        .ok_or_else(|| SsrfError::InvalidUrl("missing host".into()))?;
    if host.is_empty() || host.eq_ignore_ascii_case("localhost") {
        return Err(SsrfError::TargetNotAllowed(host.to_string()));
    }

    Ok(url)
}

/// Check every resolved address of `url`; reject if any lies in a blocked
/// range. `resolved` is the set of addresses the caller already resolved
/// (literal IP hosts resolve to themselves; DNS names go through the
/// transport's resolver).
pub fn assert_addresses_safe(host: &str, resolved: &[IpAddr]) -> Result<(), SsrfError> {
    if resolved.is_empty() {
        return Err(SsrfError::DnsResolutionFailed {
            host: host.to_string(),
            reason: "no addresses resolved".into(),
        });
    }
    if let Some(blocked) = resolved.iter().find(|addr| is_blocked_address(**addr)) {
        return Err(SsrfError::TargetNotAllowed(format!(
            "{host} resolves to blocked address {blocked}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        let err = validate_syntax("ftp://example.com").unwrap_err();
        assert!(matches!(err, SsrfError::ProtocolNotAllowed(_)));
    }

    #[test]
    fn rejects_localhost() {
        let err = validate_syntax("http://localhost/ping").unwrap_err();
        assert!(matches!(err, SsrfError::TargetNotAllowed(_)));
    }

    #[test]
    fn accepts_ordinary_https_url() {
        assert!(validate_syntax("https://api.slack.com/v1/chat").is_ok());
    }

    #[test]
    fn blocks_loopback_v4() {
        assert!(is_blocked_address("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn blocks_link_local_v4() {
        assert!(is_blocked_address("169.254.169.254".parse().unwrap()));
    }

    #[test]
    fn blocks_private_ranges_v4() {
        assert!(is_blocked_address("10.1.2.3".parse().unwrap()));
        assert!(is_blocked_address("172.20.0.5".parse().unwrap()));
        assert!(is_blocked_address("192.168.1.1".parse().unwrap()));
        assert!(is_blocked_address("100.64.0.1".parse().unwrap()));
    }

    #[test]
    fn allows_public_v4() {
        assert!(!is_blocked_address("93.184.216.34".parse().unwrap()));
    }

    #[test]
    fn blocks_ipv6_loopback_and_link_local() {
        assert!(is_blocked_address("::1".parse().unwrap()));
        assert!(is_blocked_address("fe80::1".parse().unwrap()));
        assert!(is_blocked_address("fc00::1".parse().unwrap()));
    }

    #[test]
    fn blocks_ipv4_mapped_ipv6_private_address() {
        assert!(is_blocked_address("::ffff:127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn assert_addresses_safe_rejects_any_blocked_hit() {
        let addrs = vec!["8.8.8.8".parse().unwrap(), "127.0.0.1".parse().unwrap()];
        assert!(assert_addresses_safe("example.com", &addrs).is_err());
    }

    #[test]
    fn assert_addresses_safe_accepts_all_public() {
        let addrs = vec!["8.8.8.8".parse().unwrap(), "1.1.1.1".parse().unwrap()];
        assert!(assert_addresses_safe("example.com", &addrs).is_ok());
    }
}

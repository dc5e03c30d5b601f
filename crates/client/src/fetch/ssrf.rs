//! SSRF (Server-Side Request Forgery) protection.
//!
//! Validates that URLs and resolved IP addresses are not pointing to
//! private, internal, or reserved addresses.
use std::net::IpAddr;

use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Whether the URL names a private address or `localhost` without a DNS
/// lookup. Used where resolution is not possible, e.g. inside the redirect policy.
pub fn is_private_literal(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_private_or_reserved(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_or_reserved(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.');
            domain.eq_ignore_ascii_case("localhost") || domain.to_ascii_lowercase().ends_with(".localhost")
        }
        None => true,
    }
}

/// Resolve the URL's host and require every address to be public.
pub async fn ensure_public_host(url: &Url) -> Result<(), SsrfError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(443);
            let addrs = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| SsrfError::DnsError(format!("{domain}: {e}")))?;

            let mut resolved = false;
            for addr in addrs {
                validate_ip(addr.ip())?;
                resolved = true;
            }
            if resolved { Ok(()) } else { Err(SsrfError::DnsError(format!("{domain}: no addresses"))) }
        }
        None => Err(SsrfError::MissingHost),
    }
}

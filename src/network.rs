//! Host address discovery and domain validation

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Source of the host's primary IPv4 address
pub trait IpDetector {
    fn primary_ipv4(&self) -> Option<String>;
}

/// Asks the kernel which local address routes to a public resolver
///
/// Connecting a UDP socket sends no packets; it only selects the route.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIpDetector;

const PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

impl IpDetector for SystemIpDetector {
    fn primary_ipv4(&self) -> Option<String> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect(PROBE_ADDR).ok()?;
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(addr) if !addr.is_loopback() && !addr.is_unspecified() => {
                Some(addr.to_string())
            }
            _ => None,
        }
    }
}

/// Check a domain name: at most 253 characters, two or more labels of
/// 1-63 characters each, no label starting or ending with `-`
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty() && label.len() <= 63 && !label.starts_with('-') && !label.ends_with('-')
    })
}

/// Check that `value` is a dotted-quad IPv4 address
pub fn is_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_domains() {
        for domain in ["example.com", "a.b", "compass.example.org", "xn--80a.xn--p1ai", "1.2.3.4"] {
            assert!(is_valid_domain(domain), "{domain}");
        }
    }

    #[test]
    fn test_invalid_domains() {
        let long_label = format!("{}.com", "a".repeat(64));
        let too_long = format!("{}.com", ["a"; 127].join("."));
        for domain in [
            "",
            "localhost",
            "example..com",
            ".example.com",
            "example.com.",
            "-bad.com",
            "bad-.com",
            long_label.as_str(),
            too_long.as_str(),
        ] {
            assert!(!is_valid_domain(domain), "{domain}");
        }
    }

    #[test]
    fn test_max_label_length() {
        let domain = format!("{}.com", "a".repeat(63));
        assert!(is_valid_domain(&domain));
    }

    #[test]
    fn test_is_ipv4() {
        assert!(is_ipv4("10.0.0.5"));
        assert!(!is_ipv4("10.0.0"));
        assert!(!is_ipv4("::1"));
    }
}

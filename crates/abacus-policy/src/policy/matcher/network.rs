//! Client address matching.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

/// Check an address against one pattern.
///
/// Patterns are an exact address, a `*` glob such as `192.168.*`, or CIDR
/// notation. Malformed CIDR patterns and unparseable addresses never match
/// a CIDR.
#[must_use]
pub fn ip_matches(pattern: &str, address: &str) -> bool {
    let pattern = pattern.trim();
    let address = address.trim();

    if pattern == "*" || pattern == address {
        return true;
    }

    if pattern.contains('/') {
        return match (pattern.parse::<IpNetwork>(), address.parse::<IpAddr>()) {
            (Ok(network), Ok(ip)) => network.contains(ip),
            _ => false,
        };
    }

    if pattern.contains('*') {
        return glob_match(pattern, address);
    }

    false
}

/// Returns `true` if the address matches any pattern of the list.
#[must_use]
pub fn ip_in_list(patterns: &[String], address: &str) -> bool {
    patterns.iter().any(|p| ip_matches(p, address))
}

/// `*` matches any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

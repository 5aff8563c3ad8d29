//! C1 — address/subnet utilities: IPv4 parsing, CIDR math, longest-prefix
//! match, MAC classification and generation.

use std::net::Ipv4Addr;

pub const BROADCAST_MAC: &str = "FF:FF:FF:FF:FF:FF";
pub const STP_MULTICAST_MAC: &str = "01:80:C2:00:00:00";
pub const CDP_MULTICAST_MAC: &str = "01:00:0C:CC:CC:CC";
pub const PLACEHOLDER_MAC: &str = "00:00:00:00:00:00";

/// Parses `"A.B.C.D"` into an [`Ipv4Addr`].
pub fn parse_ip(s: &str) -> Option<Ipv4Addr> {
    s.parse().ok()
}

/// Parses a dotted-decimal mask into a prefix length (0..=32), rejecting
/// non-contiguous masks.
pub fn mask_to_prefix(mask: Ipv4Addr) -> Option<u32> {
    let bits = u32::from(mask);
    let leading = bits.leading_ones();
    let rebuilt = if leading == 0 { 0 } else { u32::MAX << (32 - leading) };
    if rebuilt == bits {
        Some(leading)
    } else {
        None
    }
}

pub fn prefix_to_mask(prefix: u32) -> Ipv4Addr {
    if prefix == 0 {
        Ipv4Addr::new(0, 0, 0, 0)
    } else {
        Ipv4Addr::from(u32::MAX << (32 - prefix))
    }
}

/// Parses `"A.B.C.D/n"` into (network address, mask).
pub fn parse_cidr(s: &str) -> Option<(Ipv4Addr, Ipv4Addr)> {
    let (ip_part, prefix_part) = s.split_once('/')?;
    let ip: Ipv4Addr = ip_part.parse().ok()?;
    let prefix: u32 = prefix_part.parse().ok()?;
    if prefix > 32 {
        return None;
    }
    let mask = prefix_to_mask(prefix);
    Some((network_of(ip, mask), mask))
}

/// The network address for `ip` under `mask`.
pub fn network_of(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & u32::from(mask))
}

/// True iff `ip` falls in the network described by `(network, mask)`.
pub fn in_subnet(ip: Ipv4Addr, network: Ipv4Addr, mask: Ipv4Addr) -> bool {
    network_of(ip, mask) == network
}

/// True iff `ip` matches a CIDR pattern `"A.B.C.D/n"`.
pub fn ip_in_cidr(ip: Ipv4Addr, cidr: &str) -> bool {
    match parse_cidr(cidr) {
        Some((network, mask)) => in_subnet(ip, network, mask),
        None => false,
    }
}

pub fn is_broadcast_mac(mac: &str) -> bool {
    mac.eq_ignore_ascii_case(BROADCAST_MAC)
}

pub fn is_multicast_mac(mac: &str) -> bool {
    // IEEE 802: the low bit of the first octet marks a multicast address.
    mac.split(':')
        .next()
        .and_then(|o| u8::from_str_radix(o, 16).ok())
        .map(|first| first & 0x01 != 0)
        .unwrap_or(false)
}

pub fn is_placeholder_mac(mac: &str) -> bool {
    mac.eq_ignore_ascii_case(PLACEHOLDER_MAC)
}

/// Deterministic MAC generator for freshly-created interfaces: locally
/// administered, unicast, seeded by a monotonic counter so two identically
/// sequenced builds of a topology produce identical addresses.
pub fn next_mac(counter: u64) -> String {
    let bytes = counter.to_be_bytes();
    format!(
        "02:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
    )
}

/// Longest-prefix-match lookup over `(network, mask)` pairs, returning the
/// index of the most specific match.
pub fn longest_prefix_match<'a, I>(dest: Ipv4Addr, routes: I) -> Option<usize>
where
    I: IntoIterator<Item = (&'a Ipv4Addr, &'a Ipv4Addr)>,
{
    let mut best: Option<(usize, u32)> = None;
    for (idx, (network, mask)) in routes.into_iter().enumerate() {
        if in_subnet(dest, *network, *mask) {
            let prefix = mask_to_prefix(*mask).unwrap_or(0);
            if best.map(|(_, best_prefix)| prefix > best_prefix).unwrap_or(true) {
                best = Some((idx, prefix));
            }
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_round_trip() {
        let (net, mask) = parse_cidr("192.168.1.10/24").unwrap();
        assert_eq!(net, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(mask, Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn rejects_bad_cidr() {
        assert!(parse_cidr("not-an-ip/24").is_none());
        assert!(parse_cidr("10.0.0.0/33").is_none());
    }

    #[test]
    fn classifies_broadcast_and_multicast() {
        assert!(is_broadcast_mac("ff:ff:ff:ff:ff:ff"));
        assert!(is_multicast_mac("01:80:C2:00:00:00"));
        assert!(!is_multicast_mac("02:00:00:00:00:01"));
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = [
            (Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 0, 0)),
            (Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0)),
        ];
        let idx = longest_prefix_match(
            Ipv4Addr::new(10, 0, 0, 5),
            routes.iter().map(|(n, m)| (n, m)),
        );
        assert_eq!(idx, Some(1));
    }
}

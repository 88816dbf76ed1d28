//! IPv4 generalization: collapse a logged address to its /24 block.
//!
//! EDGAR logs anonymize the last octet (`104.129.6.jic`), so only the first
//! three groups are trusted. The last segment may be any non-dot token.

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

static IPV4_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,3})\.([0-9]{1,3})\.([0-9]{1,3})\.[^.\s]+$").expect("static pattern"));

/// A raw address reduced to `a.b.c.0` and its big-endian integer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedIp {
    pub dotted: String,
    pub int: u32,
}

/// Generalize `raw` to its /24 network address.
///
/// Returns `None` when `raw` is not dotted-quad shaped or one of the kept
/// octets exceeds 255. Never fails otherwise.
pub fn normalize(raw: &str) -> Option<CleanedIp> {
    let caps = IPV4_SHAPE.captures(raw)?;
    let mut octets = [0u8; 3];
    for (i, slot) in octets.iter_mut().enumerate() {
        *slot = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    let addr = Ipv4Addr::new(octets[0], octets[1], octets[2], 0);
    Some(CleanedIp { dotted: addr.to_string(), int: u32::from(addr) })
}

/// Split form used when filling the nullable `cleaned_ip` / `cleaned_ip_int` columns.
pub fn normalize_columns(raw: &str) -> (Option<String>, Option<u32>) {
    match normalize(raw) {
        Some(c) => (Some(c.dotted), Some(c.int)),
        None => (None, None),
    }
}

/// Integer key of a fully dotted address (no generalization).
pub fn to_int(dotted: &str) -> Option<u32> {
    dotted.parse::<Ipv4Addr>().ok().map(u32::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroes_last_octet() {
        let c = normalize("192.168.1.55").unwrap();
        assert_eq!(c.dotted, "192.168.1.0");
        assert_eq!(c.int, 3232235776);
    }

    #[test]
    fn tolerates_obfuscated_last_segment() {
        let c = normalize("104.129.6.jic").unwrap();
        assert_eq!(c.dotted, "104.129.6.0");
        assert_eq!(normalize_columns("1.2.3.x-y"), (Some("1.2.3.0".into()), Some(0x01020300)));
    }

    #[test]
    fn malformed_is_none() {
        for raw in ["", "1.2.3", "1.2.3.4.5", "a.b.c.d", "1.2.3.", "1.2.3.4 ", " 1.2.3.4", "1234.1.1.1", "::1"] {
            assert_eq!(normalize_columns(raw), (None, None), "{raw:?}");
        }
    }

    #[test]
    fn octet_overflow_is_none() {
        assert!(normalize("300.1.1.1").is_none());
        assert!(normalize("1.1.256.7").is_none());
    }

    #[test]
    fn cleaned_always_ends_in_zero() {
        for raw in ["8.8.8.8", "10.0.0.255", "0.0.0.abc", "255.255.255.zzz"] {
            assert!(normalize(raw).unwrap().dotted.ends_with(".0"));
        }
    }

    #[test]
    fn plain_int_key() {
        assert_eq!(to_int("192.168.1.0"), Some(3232235776));
        assert_eq!(to_int("nope"), None);
    }
}

//! # validation.rs
//!
//! Field checks applied to dashboard input before anything is written.

use std::net::Ipv4Addr;


/// Returns the trimmed string when it has any content.
pub fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Dotted-quad IPv4 literal, four octets, each 0-255, no leading zeros.
pub fn is_valid_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Six hex octets separated by `:` or `-`, any case. Returns the canonical
/// upper-case, colon-separated form.
pub fn normalize_mac(s: &str) -> Option<String> {
    let octets: Vec<&str> = s.split([':', '-']).collect();
    if octets.len() != 6 {
        return None;
    }
    let well_formed = octets
        .iter()
        .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return None;
    }
    Some(octets.join(":").to_ascii_uppercase())
}

pub fn is_valid_mac(s: &str) -> bool {
    normalize_mac(s).is_some()
}

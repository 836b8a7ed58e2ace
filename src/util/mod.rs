pub mod cidr;

use std::time::{SystemTime, UNIX_EPOCH};

pub use cidr::Cidr;

pub fn get_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64
}

pub fn is_privileged() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Canonicalize a MAC address to lowercase colon-separated form
/// (`aa:bb:cc:11:22:33`). Returns `None` if `raw` doesn't contain six
/// hex octets once separators are stripped.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_lowercase();
    if hex.len() != 12 {
        return None;
    }
    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Some(octets.join(":"))
}

/// First three octets of a canonical MAC, upper-cased, as used by OUI tables.
pub fn mac_oui(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac)?;
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    Some(format!("{}{}{}", parts[0], parts[1], parts[2]).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_various_separators() {
        assert_eq!(
            normalize_mac("AA-BB-CC-11-22-33"),
            Some("aa:bb:cc:11:22:33".to_string())
        );
        assert_eq!(
            normalize_mac("aabbcc112233"),
            Some("aa:bb:cc:11:22:33".to_string())
        );
        assert_eq!(normalize_mac("not a mac"), None);
    }

    #[test]
    fn oui_extraction() {
        assert_eq!(
            mac_oui("aa:bb:cc:11:22:33"),
            Some("AABBCC".to_string())
        );
    }
}

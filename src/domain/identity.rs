//! Wireless identities tracked across time windows
//!
//! Two kinds of identity exist:
//! - `MacAddress` - a device hardware address, canonical form `AA:BB:CC:DD:EE:FF`
//! - `Ssid` - a network name announced in a probe request (0-32 bytes)
//!
//! Both are validated on construction, so any value of these types is safe to
//! compare, store in a band, or write to the event log.

use crate::domain::error::IdentityError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum SSID length in bytes (802.11)
pub const MAX_SSID_BYTES: usize = 32;

/// Characters rejected in SSIDs before they reach logs or filters
const DANGEROUS_CHARS: [char; 15] =
    ['<', '>', '"', '\'', '&', ';', '|', '`', '$', '(', ')', '{', '}', '[', ']'];

fn mac_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("static MAC pattern")
    })
}

/// A validated, normalized MAC address (uppercase, colon-delimited)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Validate and normalize a raw MAC string.
    ///
    /// Accepts colon or hyphen delimiters in any case; the stored form is
    /// uppercase with colons so `aa-bb-..` and `AA:BB:..` compare equal.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if !mac_pattern().is_match(trimmed) {
            return Err(IdentityError::InvalidMac(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase().replace('-', ":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MacAddress {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

/// A validated probed network name.
///
/// The empty SSID is representable (a device that is not currently probing)
/// but carries no signal; the ignore filter always drops it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ssid(String);

impl Ssid {
    /// Validate a raw SSID. Comparison is byte-exact, no case folding.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.len() > MAX_SSID_BYTES {
            return Err(IdentityError::InvalidSsid {
                ssid: raw.to_string(),
                reason: format!("longer than {MAX_SSID_BYTES} bytes"),
            });
        }
        if raw.chars().any(|c| c == '\0' || (c.is_control() && !matches!(c, '\t' | '\n' | '\r'))) {
            return Err(IdentityError::InvalidSsid {
                ssid: raw.escape_default().to_string(),
                reason: "contains control characters".to_string(),
            });
        }
        if raw.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
            return Err(IdentityError::InvalidSsid {
                ssid: raw.to_string(),
                reason: "contains dangerous characters".to_string(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Ssid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ssid {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ssid> for String {
    fn from(ssid: Ssid) -> Self {
        ssid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_normalized_to_uppercase_colons() {
        let mac = MacAddress::parse("aa-bb-cc-dd-ee-0f").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:0F");
        assert_eq!(mac, MacAddress::parse("AA:BB:CC:DD:EE:0F").unwrap());
    }

    #[test]
    fn test_mac_rejects_malformed() {
        for raw in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:FF:00", "GG:BB:CC:DD:EE:FF", "AABBCCDDEEFF"] {
            assert!(
                matches!(MacAddress::parse(raw), Err(IdentityError::InvalidMac(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_ssid_allows_empty_and_max_length() {
        assert!(Ssid::parse("").unwrap().is_empty());
        assert!(Ssid::parse(&"x".repeat(32)).is_ok());
        assert!(Ssid::parse(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_ssid_is_case_sensitive() {
        assert_ne!(Ssid::parse("CorpWiFi").unwrap(), Ssid::parse("corpwifi").unwrap());
    }

    #[test]
    fn test_ssid_rejects_control_and_dangerous_chars() {
        assert!(Ssid::parse("bad\u{0}name").is_err());
        assert!(Ssid::parse("bad\u{7}bell").is_err());
        assert!(Ssid::parse("<script>").is_err());
        assert!(Ssid::parse("cafe;drop").is_err());
        assert!(Ssid::parse("tab\tok").is_ok());
    }

    #[test]
    fn test_serde_validates_on_decode() {
        let mac: MacAddress = serde_json::from_str("\"11-22-33-44-55-66\"").unwrap();
        assert_eq!(mac.as_str(), "11:22:33:44:55:66");
        assert!(serde_json::from_str::<MacAddress>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"11:22:33:44:55:66\"");
    }
}

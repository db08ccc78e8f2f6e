//! Identifier normalization
//!
//! Signaling hands us caller and destination identifiers in whatever shape
//! the far end produced: full SIP URIs with display names, bare user parts,
//! national numbers with a trunk prefix or fully qualified numbers. Every
//! lookup key used by the engine (routing table, identity cache, identity
//! service) is the canonical digits-only form produced here.
//!
//! ```text
//! "Alice" <sip:05551234567@pbx.example;user=phone>  ->  905551234567
//! sip:905551234567@domain.com;tag=1                  ->  905551234567
//! 5551234567                                         ->  905551234567
//! 1001                                               ->  1001
//! anonymous                                          ->  anonymous
//! ```

/// Identity sentinel for callers that withheld their number
pub const ANONYMOUS: &str = "anonymous";

/// Default country code used for canonical numbers
pub const DEFAULT_COUNTRY_CODE: &str = "90";

/// Default national trunk prefix
pub const DEFAULT_TRUNK_PREFIX: &str = "0";

/// Length of a national subscriber number without trunk or country prefix
const SUBSCRIBER_DIGITS: usize = 10;

/// Canonicalizes phone identifiers for a single country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNormalizer {
    country_code: String,
    trunk_prefix: String,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY_CODE, DEFAULT_TRUNK_PREFIX)
    }
}

impl PhoneNormalizer {
    pub fn new(country_code: impl Into<String>, trunk_prefix: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            trunk_prefix: trunk_prefix.into(),
        }
    }

    /// Normalize a raw identifier.
    ///
    /// Returns the input unchanged when it is the anonymous sentinel or when
    /// it contains no digits at all; use [`is_dialable`] to tell a canonical
    /// number apart from such pass-through values.
    pub fn normalize(&self, raw: &str) -> String {
        if raw == ANONYMOUS {
            return raw.to_string();
        }

        let digits: String = user_part(raw).chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return raw.to_string();
        }

        self.canonicalize(digits)
    }

    fn canonicalize(&self, digits: String) -> String {
        let cc = self.country_code.as_str();
        let trunk = self.trunk_prefix.as_str();

        if digits.len() == cc.len() + SUBSCRIBER_DIGITS && digits.starts_with(cc) {
            return digits;
        }
        if !trunk.is_empty()
            && digits.len() == trunk.len() + SUBSCRIBER_DIGITS
            && digits.starts_with(trunk)
        {
            return format!("{}{}", cc, &digits[trunk.len()..]);
        }
        if digits.len() == SUBSCRIBER_DIGITS {
            return format!("{}{}", cc, digits);
        }
        // Extensions, short codes and foreign numbers stay as dialed
        digits
    }
}

/// Normalize with the default country settings
pub fn normalize(raw: &str) -> String {
    PhoneNormalizer::default().normalize(raw)
}

/// True when a normalized value can be used as a lookup key
pub fn is_dialable(normalized: &str) -> bool {
    !normalized.is_empty() && normalized.bytes().all(|b| b.is_ascii_digit())
}

/// Extract the user part of a SIP URI / name-addr. Plain numbers pass
/// through untouched.
fn user_part(raw: &str) -> &str {
    let mut s = raw;

    if let Some(start) = s.find('<') {
        s = &s[start + 1..];
        if let Some(end) = s.find('>') {
            s = &s[..end];
        }
    }

    s = s.trim();
    if let Some(rest) = strip_prefix_ignore_case(s, "sips:") {
        s = rest;
    } else if let Some(rest) = strip_prefix_ignore_case(s, "sip:") {
        s = rest;
    }

    if let Some(at) = s.find('@') {
        s = &s[..at];
    } else if let Some(semi) = s.find(';') {
        s = &s[..semi];
    }
    s
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_forms_converge() {
        let expected = "905551234567";
        assert_eq!(normalize("5551234567"), expected);
        assert_eq!(normalize("05551234567"), expected);
        assert_eq!(normalize("905551234567"), expected);
        assert_eq!(normalize("+90 (555) 123-45-67"), expected);
    }

    #[test]
    fn test_sip_uri_forms() {
        assert_eq!(normalize("sip:905551234567@domain.com;tag=1"), normalize("905551234567"));
        assert_eq!(normalize("sips:05551234567@domain.com"), "905551234567");
        assert_eq!(normalize("\"Alice\" <sip:5551234567@pbx.example;user=phone>;tag=abc"), "905551234567");
        assert_eq!(normalize("SIP:5551234567@pbx.example"), "905551234567");
        assert_eq!(normalize("sip:5551234567;user=phone"), "905551234567");
    }

    #[test]
    fn test_host_digits_are_ignored() {
        assert_eq!(normalize("sip:1001@10.0.0.1:5060"), "1001");
    }

    #[test]
    fn test_anonymous_passes_through() {
        assert_eq!(normalize("anonymous"), "anonymous");
        assert!(!is_dialable(&normalize("anonymous")));
    }

    #[test]
    fn test_short_numbers_unchanged() {
        assert_eq!(normalize("1001"), "1001");
        assert_eq!(normalize("sip:1001@pbx"), "1001");
        assert_eq!(normalize("123456789012345"), "123456789012345");
        // 11 digits without trunk prefix are not national numbers
        assert_eq!(normalize("15551234567"), "15551234567");
    }

    #[test]
    fn test_no_digits_returns_input() {
        assert_eq!(normalize("sip:alice@example.com"), "sip:alice@example.com");
        assert_eq!(normalize(""), "");
        assert!(!is_dialable(&normalize("sip:alice@example.com")));
        assert!(!is_dialable(""));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "5551234567",
            "05551234567",
            "905551234567",
            "sip:905551234567@domain.com;tag=1",
            "<sips:05551234567@x>",
            "anonymous",
            "1001",
            "15551234567",
            "sip:alice@example.com",
            "",
            "+44 20 7946 0958",
            "phone: 0 (555) 123 45 67",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_other_country() {
        let n = PhoneNormalizer::new("44", "0");
        assert_eq!(n.normalize("02079460958"), "442079460958");
        assert_eq!(n.normalize("2079460958"), "442079460958");
        assert_eq!(n.normalize("442079460958"), "442079460958");
    }
}

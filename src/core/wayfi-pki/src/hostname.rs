//! Hostname syntax validation (RFC 1123).

/// Maximum length of a hostname in octets.
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single label in octets.
pub const MAX_LABEL_LEN: usize = 63;

/// Returns true if `name` is a syntactically valid DNS hostname.
///
/// Labels are 1–63 octets of ASCII letters, digits and hyphens, and do not
/// start or end with a hyphen. A single trailing dot is not accepted.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

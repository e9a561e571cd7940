//! Domain name helpers shared by the encoders.

/// Returns the longest dot-delimited suffix shared by every host.
///
/// Labels are compared case-insensitively; the result keeps the spelling of
/// the first host. A single host is returned unchanged. Returns an empty
/// string for an empty input or when the hosts share no label.
///
/// `radius.example.com` and `vpn.example.com` share `example.com`.
pub fn longest_common_domain_suffix<S: AsRef<str>>(hosts: &[S]) -> String {
    let (first, rest) = match hosts {
        [] => return String::new(),
        [only] => return only.as_ref().to_string(),
        [first, rest @ ..] => (first.as_ref().trim_end_matches('.'), rest),
    };

    let mut suffix: Vec<&str> = first.rsplit('.').collect();
    for host in rest {
        let shared = suffix
            .iter()
            .zip(host.as_ref().trim_end_matches('.').rsplit('.'))
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        suffix.truncate(shared);
    }

    if suffix.iter().all(|label| label.is_empty()) {
        return String::new();
    }
    suffix.reverse();
    suffix.join(".")
}

/// Reverses the labels of a domain: `staff.example.com` becomes
/// `com.example.staff`.
pub fn reverse_dns(domain: &str) -> String {
    domain.rsplit('.').collect::<Vec<_>>().join(".")
}

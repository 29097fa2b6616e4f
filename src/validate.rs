use once_cell::sync::Lazy;
use regex::Regex;

// RFC 1035 label rules: 1-63 chars, alphanumeric plus hyphen, no
// leading/trailing hyphen, applied to every dot-separated label.
static DNS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .unwrap()
});

/// Lowercase a candidate name and strip a single leading `*.` wildcard.
pub fn normalize_candidate(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    stripped.to_lowercase()
}

/// Accept `name` only if it is syntactically a DNS name and sits under
/// `apex` (or equals it). Wildcards are stripped before checking; anything
/// carrying credentials, ports, paths, or invalid labels is rejected.
pub fn is_valid_subdomain(name: &str, apex: &str) -> bool {
    let name = normalize_candidate(name);
    let apex = apex.trim().to_lowercase();
    if name.is_empty() || apex.is_empty() {
        return false;
    }
    if name != apex && !name.ends_with(&format!(".{apex}")) {
        return false;
    }
    DNS_NAME.is_match(&name)
}

/// Accept only a registrable apex: exactly `label.suffix` where the suffix
/// may be a multi-label public suffix (`example.com`, `example.co.uk`).
/// URLs, credentials, ports, paths, wildcards, and bare IPs are rejected.
pub fn is_valid_apex(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.contains('@')
        || raw.contains('/')
        || raw.contains(':')
        || raw.contains('*')
        || raw.contains(char::is_whitespace)
    {
        return false;
    }
    let lower = raw.to_lowercase();
    if !DNS_NAME.is_match(&lower) {
        return false;
    }
    // bare IPv4 slips through the label regex; every-label-numeric is not a name
    if lower.split('.').all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    // the input must be exactly the registrable domain: no subdomain labels left over
    matches!(psl::domain_str(&lower), Some(d) if d == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_accepts_names_under_apex() {
        assert!(is_valid_subdomain("a.example.com", "example.com"));
        assert!(is_valid_subdomain("deep.a.example.com", "example.com"));
        assert!(is_valid_subdomain("example.com", "example.com"));
    }

    #[test]
    fn subdomain_strips_wildcard_and_case() {
        assert!(is_valid_subdomain("*.a.example.com", "example.com"));
        assert!(is_valid_subdomain("A.EXAMPLE.COM", "example.com"));
        assert_eq!(normalize_candidate("*.Mail.Example.com"), "mail.example.com");
    }

    #[test]
    fn subdomain_rejects_foreign_and_malformed() {
        assert!(!is_valid_subdomain("a.example.org", "example.com"));
        assert!(!is_valid_subdomain("notexample.com", "example.com"));
        assert!(!is_valid_subdomain("-a.example.com", "example.com"));
        assert!(!is_valid_subdomain("a_b.example.com", "example.com"));
        assert!(!is_valid_subdomain("a..example.com", "example.com"));
        assert!(!is_valid_subdomain("a.example.com/path", "example.com"));
        assert!(!is_valid_subdomain("user:pass@a.example.com", "example.com"));
        assert!(!is_valid_subdomain("", "example.com"));
    }

    #[test]
    fn subdomain_rejects_overlong_label() {
        let label = "a".repeat(64);
        assert!(!is_valid_subdomain(&format!("{label}.example.com"), "example.com"));
        let max = "a".repeat(63);
        assert!(is_valid_subdomain(&format!("{max}.example.com"), "example.com"));
    }

    #[test]
    fn apex_accepts_registrable_forms() {
        assert!(is_valid_apex("example.com"));
        assert!(is_valid_apex("example.co.uk"));
        assert!(is_valid_apex("example.com.ar"));
        assert!(is_valid_apex("  Example.COM  "));
    }

    #[test]
    fn apex_rejects_subdomains_and_junk() {
        assert!(!is_valid_apex("www.example.com"));
        assert!(!is_valid_apex("not a domain"));
        assert!(!is_valid_apex("1.2.3.4"));
        assert!(!is_valid_apex("example.com:8080"));
        assert!(!is_valid_apex("https://example.com"));
        assert!(!is_valid_apex("user@example.com"));
        assert!(!is_valid_apex("*.example.com"));
        assert!(!is_valid_apex(""));
        assert!(!is_valid_apex("com"));
    }
}

use subsentry::validate::{is_valid_apex, is_valid_subdomain, normalize_candidate};

#[test]
fn validator_accepts_only_names_under_the_apex() {
    assert!(is_valid_subdomain("api.example.com", "example.com"));
    assert!(is_valid_subdomain("example.com", "example.com"));
    assert!(!is_valid_subdomain("api.example.org", "example.com"));
    assert!(!is_valid_subdomain("evilexample.com", "example.com"));
}

#[test]
fn validator_strips_wildcards_before_checking() {
    assert!(is_valid_subdomain("*.api.example.com", "example.com"));
    assert_eq!(normalize_candidate("*.API.Example.com"), "api.example.com");
}

#[test]
fn validator_rejects_urls_credentials_and_ips() {
    assert!(!is_valid_subdomain("https://api.example.com", "example.com"));
    assert!(!is_valid_subdomain("user:pass@api.example.com", "example.com"));
    assert!(!is_valid_subdomain("api.example.com:8443", "example.com"));
    assert!(!is_valid_apex("1.2.3.4"));
}

#[test]
fn apex_requires_registrable_form() {
    assert!(is_valid_apex("example.com"));
    assert!(is_valid_apex("example.co.uk"));
    assert!(!is_valid_apex("www.example.com"));
    assert!(!is_valid_apex("not a domain"));
}

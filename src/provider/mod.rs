pub mod dnspod;
pub mod signer;
pub mod zones;

/// Record name prefix used by the dns-01 challenge
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// TTL of the validation records, in seconds
pub const TXT_RECORD_TTL: u32 = 600;

/// Full validation record name for `domain`.
///
/// `*.example.com` and `example.com` share `_acme-challenge.example.com`.
pub fn validation_name(domain: &str) -> String {
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    format!("{}.{}", ACME_CHALLENGE_RECORD, zones::normalize(domain))
}

/// Recover the challenged domain from a validation record name.
pub fn domain_from_validation_name(fqdn: &str) -> Option<String> {
    let fqdn = zones::normalize(fqdn);
    fqdn.strip_prefix(ACME_CHALLENGE_RECORD)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_name() {
        assert_eq!(validation_name("example.com"), "_acme-challenge.example.com");
        assert_eq!(validation_name("*.example.com"), "_acme-challenge.example.com");
        assert_eq!(validation_name("Sub.Example.com."), "_acme-challenge.sub.example.com");
    }

    #[test]
    fn test_domain_from_validation_name() {
        assert_eq!(
            domain_from_validation_name("_acme-challenge.example.com."),
            Some("example.com".to_string())
        );
        assert_eq!(domain_from_validation_name("_acme-challenge."), None);
        assert_eq!(domain_from_validation_name("www.example.com"), None);
    }
}

//! Namespace derivation from URL-like identifiers.

use url::{Host, Url};

/// Namespace for an identifier such as `https://blog.example.com/posts/1`.
///
/// With path segments after the host the namespace is the full host.
/// Without them it is the parent domain, unless the host has two labels
/// or fewer. IP hosts are used as they are. Returns `None` when `id` has no host.
pub fn derive_namespace(id: &str) -> Option<String> {
    let url = Url::parse(id).ok()?;
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => return Some(addr.to_string()),
        Host::Ipv6(addr) => return Some(addr.to_string()),
    };

    let has_path = url
        .path_segments()
        .is_some_and(|mut segments| segments.any(|segment| !segment.is_empty()));
    if has_path {
        return Some(host);
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        Some(host)
    } else {
        Some(labels[1..].join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_keeps_full_host() {
        assert_eq!(
            derive_namespace("https://blog.example.com/posts/1").as_deref(),
            Some("blog.example.com")
        );
    }

    #[test]
    fn test_bare_subdomain_uses_parent() {
        assert_eq!(
            derive_namespace("https://blog.example.com").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            derive_namespace("https://a.b.example.com/").as_deref(),
            Some("b.example.com")
        );
    }

    #[test]
    fn test_two_labels_unchanged() {
        assert_eq!(
            derive_namespace("https://example.com").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn test_ip_host_unchanged() {
        assert_eq!(
            derive_namespace("http://127.0.0.1:8123").as_deref(),
            Some("127.0.0.1")
        );
    }

    #[test]
    fn test_not_a_url() {
        assert_eq!(derive_namespace("posts/1"), None);
    }
}

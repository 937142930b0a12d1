//! URL canonicalization used as the dedup key across sources.

use crate::error::DiscoveryError;
use url::Url;

/// Query parameters that only carry campaign/click attribution.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "dclid", "gbraid", "wbraid", "fbclid", "msclkid", "yclid", "igshid", "mc_cid",
    "mc_eid", "_ga", "_gl", "_hsenc", "_hsmi", "mkt_tok", "oly_anon_id", "oly_enc_id", "vero_id",
    "wickedid", "twclid", "ttclid", "srsltid",
];

/// Whether a query key is an attribution parameter.
pub fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonical form of an absolute http(s) URL.
///
/// Lower-cases scheme and host, drops default ports and the fragment, strips
/// tracking parameters (keeping every other parameter in its original order
/// and encoding) and removes trailing slashes from non-root paths.
/// Canonicalizing a canonical URL returns it unchanged.
pub fn canonicalize_url(input: &str) -> Result<String, DiscoveryError> {
    let trimmed = input.trim();
    let mut url = Url::parse(trimmed).map_err(|e| DiscoveryError::invalid(input, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DiscoveryError::invalid(
            input,
            format!("unsupported scheme {:?}", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(DiscoveryError::invalid(input, "missing host"));
    }

    url.set_fragment(None);

    let kept_query = url.query().map(|q| {
        q.split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| !is_tracking_param(pair.split('=').next().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("&")
    });
    match kept_query {
        Some(q) if !q.is_empty() => url.set_query(Some(&q)),
        _ => url.set_query(None),
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.to_string())
}

/// Case-insensitive identity of a canonical URL.
pub fn dedup_key(canonical: &str) -> String {
    canonical.to_lowercase()
}

/// Host of an absolute URL or bare domain, lower-cased, without `www.`.
pub fn site_domain(target: &str) -> Option<String> {
    let target = target.trim();
    let with_scheme = if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{target}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(u: &str) -> String {
        canonicalize_url(u).unwrap()
    }

    #[test]
    fn test_trailing_slash_and_case() {
        assert_eq!(
            canon("HTTPS://Example.COM/Blog/Post-One/"),
            "https://example.com/Blog/Post-One"
        );
        assert_eq!(canon("https://example.com"), "https://example.com/");
        assert_eq!(canon("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_default_port_and_fragment() {
        assert_eq!(
            canon("http://example.com:80/a#section"),
            "http://example.com/a"
        );
        assert_eq!(canon("https://example.com:443/a"), "https://example.com/a");
        assert_eq!(
            canon("https://example.com:8443/a"),
            "https://example.com:8443/a"
        );
    }

    #[test]
    fn test_tracking_params_stripped() {
        assert_eq!(
            canon("https://example.com/post/?utm_source=x&utm_medium=y&fbclid=z"),
            "https://example.com/post"
        );
        assert_eq!(
            canon("https://example.com/?p=123&utm_campaign=spring&page_id=7"),
            "https://example.com/?p=123&page_id=7"
        );
    }

    #[test]
    fn test_equivalent_urls_share_key() {
        let a = canon("https://example.com/best-headphones/");
        let b = canon("https://example.com/best-headphones?utm_source=newsletter");
        let c = canon("https://EXAMPLE.com/best-headphones#top");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_idempotent() {
        for u in [
            "https://Example.com/a/b/?utm_x=1&q=rust%20lang&gclid=2",
            "http://example.com:80/",
            "https://example.com/path/with//double/",
        ] {
            let once = canon(u);
            assert_eq!(canon(&once), once);
        }
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            canonicalize_url("not-a-url"),
            Err(DiscoveryError::InvalidInput { .. })
        ));
        assert!(canonicalize_url("ftp://example.com/file").is_err());
        assert!(canonicalize_url("mailto:someone@example.com").is_err());
        assert!(canonicalize_url("").is_err());
    }

    #[test]
    fn test_dedup_key_is_case_insensitive() {
        assert_eq!(
            dedup_key(&canon("https://example.com/Guide")),
            dedup_key(&canon("https://example.com/guide"))
        );
    }

    #[test]
    fn test_site_domain() {
        assert_eq!(site_domain("example.com").as_deref(), Some("example.com"));
        assert_eq!(
            site_domain("https://www.Example.com/sitemap.xml").as_deref(),
            Some("example.com")
        );
        assert_eq!(site_domain("").as_deref(), None);
    }
}

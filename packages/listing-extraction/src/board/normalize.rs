//! URL normalization.
//!
//! Strips tracking parameters and cosmetic differences so the same posting
//! always maps to the same cache key. Resource-defining parameters
//! (`gh_jid`, `jk`, `currentJobId`, ...) are kept. Board-specific canonical
//! forms are applied on top of this by [`super::detect_board`].

use url::Url;

use crate::error::{FetchError, FetchResult};

/// Exact query keys that only carry attribution.
const TRACKING_KEYS: &[&str] = &[
    "gclid",
    "fbclid",
    "msclkid",
    "dclid",
    "yclid",
    "gbraid",
    "wbraid",
    "mc_cid",
    "mc_eid",
    "_hsenc",
    "_hsmi",
    "igshid",
    "ref",
    "ref_src",
    "referrer",
    "source",
    "src",
    "gh_src",
    "lever-source",
    "lever-origin",
    "trk",
    "trackingid",
    "refid",
];

/// Whether a query key is attribution-only.
pub fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_KEYS.contains(&key.as_str())
}

/// Parse a user-supplied URL, assuming https when no scheme is given.
pub fn parse_url(raw: &str) -> FetchResult<Url> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| FetchError::InvalidUrl {
        url: raw.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(FetchError::InvalidUrl {
                url: raw.to_string(),
            })
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl {
            url: raw.to_string(),
        });
    }

    Ok(url)
}

/// Board-agnostic normalization.
///
/// - scheme upgraded to https, host lowercased, default port and fragment dropped
/// - tracking parameters removed, remaining parameters sorted by key
/// - trailing slashes removed from non-root paths
pub fn normalize_generic(raw: &str) -> FetchResult<Url> {
    let mut url = parse_url(raw)?;

    if url.scheme() == "http" {
        // http -> https is always a valid scheme change for special schemes
        let _ = url.set_scheme("https");
    }
    let _ = url.set_port(None);
    url.set_fragment(None);
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.is_empty() && !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    Ok(url)
}

/// Value of a query parameter, if present and non-empty.
pub fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tracking_keeps_resource_params() {
        let url = normalize_generic(
            "https://careers.acme.com/openings?utm_source=li&gh_jid=4012345&gclid=abc&team=eng#apply",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://careers.acme.com/openings?gh_jid=4012345&team=eng"
        );
    }

    #[test]
    fn test_scheme_host_and_trailing_slash() {
        let url = normalize_generic("HTTP://Careers.Acme.COM:80/jobs/").unwrap();
        assert_eq!(url.as_str(), "https://careers.acme.com/jobs");
    }

    #[test]
    fn test_missing_scheme_assumes_https() {
        let url = normalize_generic("careers.acme.com/jobs/42").unwrap();
        assert_eq!(url.as_str(), "https://careers.acme.com/jobs/42");
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(normalize_generic("ftp://acme.com/file").is_err());
        assert!(normalize_generic("not a url at all ::").is_err());
    }

    #[test]
    fn test_is_tracking_param() {
        assert!(is_tracking_param("utm_campaign"));
        assert!(is_tracking_param("UTM_Medium"));
        assert!(is_tracking_param("fbclid"));
        assert!(!is_tracking_param("gh_jid"));
        assert!(!is_tracking_param("jk"));
    }
}

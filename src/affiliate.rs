//! Affiliate-link policy and the Amazon link converter.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::LinkViolation;

/// Which links count as affiliate links and what tracking they must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliatePolicy {
    pub tracking_id: String,
    pub domains: Vec<String>,
    pub tracking_params: Vec<String>,
}

impl AffiliatePolicy {
    pub fn new(tracking_id: impl Into<String>) -> Self {
        let defaults = crate::config::PipelineConfig::default();
        Self {
            tracking_id: tracking_id.into(),
            domains: defaults.affiliate_domains,
            tracking_params: defaults.tracking_params,
        }
    }

    pub fn allows_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }

    fn is_tracking_param(&self, key: &str) -> bool {
        self.tracking_params.iter().any(|p| p == key)
    }

    /// A link passes iff its host is allow-listed and it carries exactly one
    /// tracking parameter whose value is the configured tracking ID.
    pub fn check(&self, link: &str) -> Result<(), LinkViolation> {
        let url = parse(link)?;
        let host = url.host_str().unwrap_or_default();
        if !self.allows_host(host) {
            return Err(LinkViolation::InvalidDomain {
                host: host.to_string(),
            });
        }

        let found: Vec<String> = url
            .query_pairs()
            .filter(|(key, _)| self.is_tracking_param(key))
            .map(|(_, value)| value.into_owned())
            .collect();
        match found.as_slice() {
            [] => Err(LinkViolation::MissingTracking),
            [only] if *only == self.tracking_id => Ok(()),
            [only] => Err(LinkViolation::WrongTrackingId {
                found: only.clone(),
                expected: self.tracking_id.clone(),
            }),
            _ => Err(LinkViolation::DuplicateTracking { found }),
        }
    }

    /// Whether `link` points at an allow-listed host at all.
    pub fn is_affiliate_link(&self, link: &str) -> bool {
        Url::parse(link)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.allows_host(h)))
            .unwrap_or(false)
    }

    /// Rewrites `link` so it carries exactly one `tag=<tracking id>`,
    /// dropping any tracking parameters it already had.
    pub fn normalize(&self, link: &str) -> Result<String, LinkViolation> {
        let mut url = parse(link)?;
        let host = url.host_str().unwrap_or_default().to_string();
        if !self.allows_host(&host) {
            return Err(LinkViolation::InvalidDomain { host });
        }
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("tag", &self.tracking_id);
        Ok(url.to_string())
    }
}

fn parse(link: &str) -> Result<Url, LinkViolation> {
    let url = Url::parse(link.trim()).map_err(|_| LinkViolation::InvalidUrl {
        url: link.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LinkViolation::InvalidUrl {
            url: link.to_string(),
        });
    }
    Ok(url)
}

static ASIN_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})(?:[/?]|$)").expect("valid ASIN pattern")
});
static ASIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid ASIN pattern"));

/// Product id (ASIN) from `/dp/<ASIN>`, `/gp/product/<ASIN>` or an `ASIN=` query.
pub fn extract_asin(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if let Some(caps) = ASIN_PATH.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(k, v)| k == "ASIN" && ASIN.is_match(v))
        .map(|(_, v)| v.into_owned())
}

pub fn clean_affiliate_url(asin: &str, domain: &str, tracking_id: &str) -> Option<String> {
    ASIN.is_match(asin)
        .then(|| format!("https://www.{domain}/dp/{asin}?tag={tracking_id}"))
}

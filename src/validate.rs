//! Field-level content checks and the deploy gate.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::affiliate::AffiliatePolicy;
use crate::error::Result;
use crate::golden::{DriftReport, Manifest};
use crate::model::{LIST_LEN, PriceTier, ProductRecord, ProductStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// How hard to treat affiliate-link violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Link violations are warnings.
    Exploratory,
    /// Link violations block deployment.
    Deploy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Product id, or `page` for page-level findings.
    pub subject: String,
    pub message: String,
}

impl Finding {
    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

pub fn error_count(findings: &[Finding]) -> usize {
    findings.iter().filter(|f| f.is_error()).count()
}

static USER_RATINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d,]+\+?$").expect("valid user ratings pattern"));

/// Runs every content check over the store.
pub fn check_store(store: &ProductStore, policy: &AffiliatePolicy, mode: Mode) -> Vec<Finding> {
    let mut findings = check_page(store);
    for record in &store.products {
        findings.extend(check_record(record, policy, mode));
    }
    findings
}

fn check_page(store: &ProductStore) -> Vec<Finding> {
    let mut findings = Vec::new();
    if store.page.title.trim().is_empty() {
        findings.push(Finding::error("page", "title is empty"));
    }
    for (symbol, legend) in &store.page.price_guide {
        match PriceTier::from_symbol(symbol) {
            None => findings.push(Finding::error(
                "page",
                format!("price guide lists unknown tier '{symbol}'"),
            )),
            Some(tier) if legend.range != tier.range() || legend.color != tier.color() => {
                findings.push(Finding::warning(
                    "page",
                    format!(
                        "price guide for {symbol} says {} / {}, expected {} / {}",
                        legend.range,
                        legend.color,
                        tier.range(),
                        tier.color()
                    ),
                ))
            }
            Some(_) => {}
        }
    }
    findings
}

pub fn check_record(record: &ProductRecord, policy: &AffiliatePolicy, mode: Mode) -> Vec<Finding> {
    let id = record.id.as_str();
    let mut findings = Vec::new();

    for (field, value) in [
        ("name", &record.name),
        ("badge", &record.badge),
        ("tagline", &record.tagline),
        ("userRatings", &record.user_ratings),
        ("imageRef", &record.image_ref),
    ] {
        if value.trim().is_empty() {
            findings.push(Finding::error(id, format!("'{field}' is empty")));
        }
    }

    if !(0.0..=5.0).contains(&record.rating) {
        findings.push(Finding::error(id, format!("rating {} out of range (0-5)", record.rating)));
    } else if (record.rating * 2.0).fract() != 0.0 {
        findings.push(Finding::error(
            id,
            format!("rating {} is not a multiple of 0.5", record.rating),
        ));
    }

    if record.tier().is_none() {
        findings.push(Finding::error(
            id,
            format!("price tier '{}' is not one of $, $$, $$$, $$$$", record.price_tier),
        ));
    }

    if !record.user_ratings.is_empty() && !USER_RATINGS.is_match(&record.user_ratings) {
        findings.push(Finding::warning(
            id,
            format!("unusual userRatings format '{}'", record.user_ratings),
        ));
    }

    let lists = [
        ("whatWeLike", &record.what_we_like),
        ("keyFeatures", &record.key_features),
    ];
    for (field, list) in lists {
        if list.len() < LIST_LEN {
            findings.push(Finding::error(
                id,
                format!("'{field}' has {} entries, expected {LIST_LEN}", list.len()),
            ));
        } else if list.len() > LIST_LEN {
            findings.push(Finding::warning(
                id,
                format!(
                    "'{field}' has {} entries; only the first {LIST_LEN} are shown",
                    list.len()
                ),
            ));
        }
        if list.iter().any(|item| item.trim().is_empty()) {
            findings.push(Finding::error(id, format!("'{field}' contains an empty entry")));
        }
    }

    if let Err(violation) = policy.check(&record.affiliate_link) {
        let message = format!("affiliate link {}: {violation}", record.affiliate_link);
        findings.push(match mode {
            Mode::Deploy => Finding::error(id, message),
            Mode::Exploratory => Finding::warning(id, message),
        });
    }

    if record.has_external_image() {
        findings.push(Finding::warning(
            id,
            format!("imageRef is still external: {}", record.image_ref),
        ));
    }

    findings
}

/// Combined verdict of drift detection and content checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
    pub can_deploy: bool,
    pub drift: DriftReport,
    pub findings: Vec<Finding>,
}

/// A store is deployable only when golden data matches and no content check
/// reports an error (affiliate violations count as errors here).
pub fn deploy_gate(
    store: &ProductStore,
    manifest: &Manifest,
    policy: &AffiliatePolicy,
) -> Result<GateReport> {
    let drift = crate::golden::validate(store, manifest)?;
    let findings = check_store(store, policy, Mode::Deploy);
    let can_deploy = drift.passed && error_count(&findings) == 0;
    if can_deploy {
        tracing::info!("deploy gate passed");
    } else {
        tracing::warn!(
            drift = drift.mismatches.len(),
            errors = error_count(&findings),
            "deploy gate blocked"
        );
    }
    Ok(GateReport {
        can_deploy,
        drift,
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageMetadata;

    fn policy() -> AffiliatePolicy {
        AffiliatePolicy::new("mystore-20")
    }

    fn good() -> ProductRecord {
        let mut r = ProductRecord::named("dolphin-e10", "Dolphin E10");
        r.position = 1;
        r.badge = "Best Overall".into();
        r.tagline = "Set it and forget it".into();
        r.rating = 4.5;
        r.user_ratings = "1,000+".into();
        r.price_tier = "$$".into();
        r.affiliate_link = "https://www.amazon.com/dp/B0DMN819RB?tag=mystore-20".into();
        r.image_ref = "/assets/images/products/dolphin-e10.jpg".into();
        r.what_we_like = (1..=5).map(|i| format!("like {i}")).collect();
        r.key_features = (1..=5).map(|i| format!("feature {i}")).collect();
        r
    }

    fn store_of(records: Vec<ProductRecord>) -> ProductStore {
        let mut store = ProductStore::new(
            PageMetadata {
                title: "Best Robotic Pool Cleaners".into(),
                ..PageMetadata::default()
            },
            records,
        );
        store.sync_price_guide();
        store
    }

    #[test]
    fn clean_record_has_no_findings() {
        assert_eq!(check_record(&good(), &policy(), Mode::Deploy), vec![]);
    }

    #[test]
    fn rating_rules() {
        let mut r = good();
        r.rating = 5.5;
        assert_eq!(error_count(&check_record(&r, &policy(), Mode::Deploy)), 1);
        r.rating = 4.3;
        let findings = check_record(&r, &policy(), Mode::Deploy);
        assert!(findings[0].message.contains("multiple of 0.5"));
    }

    #[test]
    fn short_lists_are_errors_long_lists_warnings() {
        let mut r = good();
        r.what_we_like.pop();
        r.key_features.push("feature 6".into());
        let findings = check_record(&r, &policy(), Mode::Deploy);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().any(|f| f.is_error() && f.message.contains("whatWeLike")));
        assert!(findings.iter().any(|f| !f.is_error() && f.message.contains("keyFeatures")));
    }

    #[test]
    fn unknown_tier_is_an_error() {
        let mut r = good();
        r.price_tier = "$$$$$".into();
        assert_eq!(error_count(&check_record(&r, &policy(), Mode::Exploratory)), 1);
    }

    #[test]
    fn link_violations_depend_on_mode() {
        let mut r = good();
        r.affiliate_link = "https://www.amazon.com/dp/ABC123?tag=foo&tag=bar".into();
        let deploy = check_record(&r, &policy(), Mode::Deploy);
        assert_eq!(error_count(&deploy), 1);
        assert!(deploy[0].message.contains("multiple tracking parameters"));
        let explore = check_record(&r, &policy(), Mode::Exploratory);
        assert_eq!(error_count(&explore), 0);
        assert_eq!(explore.len(), 1);
    }

    #[test]
    fn external_image_and_odd_user_ratings_warn() {
        let mut r = good();
        r.image_ref = "https://m.media-amazon.com/images/I/x.jpg".into();
        r.user_ratings = "about 1k".into();
        let findings = check_record(&r, &policy(), Mode::Deploy);
        assert_eq!(findings.len(), 2);
        assert_eq!(error_count(&findings), 0);
    }

    #[test]
    fn price_guide_drift_is_flagged() {
        let mut store = store_of(vec![good()]);
        assert!(check_store(&store, &policy(), Mode::Deploy).is_empty());
        store.page.price_guide.get_mut("$$").unwrap().color = "blue".into();
        let findings = check_store(&store, &policy(), Mode::Deploy);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subject, "page");
    }

    #[test]
    fn gate_needs_both_checks() {
        let store = store_of(vec![good()]);
        let manifest = crate::golden::build_manifest(&store, 5, "t").unwrap();
        assert!(deploy_gate(&store, &manifest, &policy()).unwrap().can_deploy);

        let mut drifted = store.clone();
        drifted.products[0].tagline = "Changed".into();
        let report = deploy_gate(&drifted, &manifest, &policy()).unwrap();
        assert!(!report.can_deploy);
        assert!(report.findings.is_empty());

        let mut bad_link = store.clone();
        bad_link.products[0].affiliate_link = "https://www.amazon.com/dp/B0DMN819RB".into();
        let manifest = crate::golden::build_manifest(&bad_link, 5, "t").unwrap();
        let report = deploy_gate(&bad_link, &manifest, &policy()).unwrap();
        assert!(report.drift.passed);
        assert!(!report.can_deploy);
    }
}

//! Pre-deploy audit of a finished page.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::affiliate::AffiliatePolicy;
use crate::model::ProductStore;
use crate::validate::{Finding, error_count};

static PLACEHOLDERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("lorem ipsum", r"(?i)lorem\s+ipsum"),
        ("test product", r"(?i)\btest\s+product\b"),
        ("example data", r"(?i)\bexample\s+data\b"),
        ("placeholder", r"(?i)\bplaceholder\b"),
        ("[insert ...]", r"(?i)\[insert[^\]]*\]"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("valid placeholder pattern")))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub passed: bool,
    pub products_checked: usize,
    pub anchors_checked: usize,
    pub findings: Vec<Finding>,
}

fn squash(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Checks that `html` shows every product with its exact affiliate link, that
/// every affiliate anchor passes `policy`, and that no placeholder copy remains.
pub fn audit_page(html: &str, store: &ProductStore, policy: &AffiliatePolicy) -> AuditReport {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("valid anchor selector");
    let page_text = squash(&document.root_element().text().collect::<Vec<_>>().join(" "));
    let href_set: BTreeSet<&str> = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .collect();

    let mut findings = Vec::new();

    for record in &store.products {
        if !page_text.contains(&squash(&record.name)) {
            findings.push(Finding::error(
                &record.id,
                format!("product name '{}' not found on page", record.name),
            ));
        }
        if !href_set.contains(record.affiliate_link.as_str()) {
            findings.push(Finding::error(
                &record.id,
                format!("affiliate link {} not linked from page", record.affiliate_link),
            ));
        }
    }

    let mut anchors_checked = 0;
    for href in href_set.iter().copied().filter(|h| policy.is_affiliate_link(h)) {
        anchors_checked += 1;
        if let Err(violation) = policy.check(href) {
            findings.push(Finding::error("page", format!("anchor {href}: {violation}")));
        }
    }

    for (label, pattern) in PLACEHOLDERS.iter() {
        if let Some(hit) = pattern.find(&page_text) {
            findings.push(Finding::error(
                "page",
                format!("placeholder text ({label}): '{}'", hit.as_str()),
            ));
        }
    }

    let passed = error_count(&findings) == 0;
    if passed {
        tracing::info!(anchors = anchors_checked, "page audit passed");
    } else {
        tracing::warn!(errors = error_count(&findings), "page audit failed");
    }
    AuditReport {
        passed,
        products_checked: store.products.len(),
        anchors_checked,
        findings,
    }
}

//! Merges scraped or hand-entered candidates into the product store.
//!
//! Names are compared after normalization (lowercase, punctuation stripped,
//! whitespace collapsed). Two names match when the normalized forms are equal
//! or one contains the other, so "Dolphin E10 (2025 Model)" lands on
//! "Dolphin E10". The substring rule is permissive on purpose and is the main
//! source of false merges; ambiguity is always reported, never resolved by
//! picking the first hit.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::model::{ProductRecord, ProductStore};

/// Record keys a candidate may carry but never writes. Anything else outside
/// the declared fields lands in the record's `extra` map.
const STORE_OWNED_FIELDS: &[&str] = &["position"];

/// A record from an external source. Only `name` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_we_like: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_link: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CandidateRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copies every field the candidate carries onto `record`, returning the
    /// names of the fields whose value changed. `id` and `position` are never
    /// touched.
    fn apply_to(&self, record: &mut ProductRecord) -> Vec<String> {
        let mut changed = Vec::new();
        overwrite(&mut record.name, Some(&self.name), "name", &mut changed);
        overwrite(&mut record.badge, self.badge.as_ref(), "badge", &mut changed);
        overwrite(
            &mut record.tagline,
            self.tagline.as_ref(),
            "tagline",
            &mut changed,
        );
        overwrite(&mut record.rating, self.rating.as_ref(), "rating", &mut changed);
        overwrite(
            &mut record.user_ratings,
            self.user_ratings.as_ref(),
            "userRatings",
            &mut changed,
        );
        overwrite(
            &mut record.price_tier,
            self.price_tier.as_ref(),
            "priceTier",
            &mut changed,
        );
        overwrite(
            &mut record.affiliate_link,
            self.affiliate_link.as_ref(),
            "affiliateLink",
            &mut changed,
        );
        overwrite(
            &mut record.image_ref,
            self.image_ref.as_ref(),
            "imageRef",
            &mut changed,
        );
        overwrite(
            &mut record.what_we_like,
            self.what_we_like.as_ref(),
            "whatWeLike",
            &mut changed,
        );
        overwrite(
            &mut record.key_features,
            self.key_features.as_ref(),
            "keyFeatures",
            &mut changed,
        );
        if self.official_link.is_some() && record.official_link != self.official_link {
            record.official_link = self.official_link.clone();
            changed.push("officialLink".to_string());
        }
        for (key, value) in &self.extra {
            if STORE_OWNED_FIELDS.contains(&key.as_str()) {
                tracing::warn!(
                    product = %record.name,
                    field = %key,
                    "candidate field is owned by the store, ignored"
                );
                continue;
            }
            if record.extra.get(key) != Some(value) {
                record.extra.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        changed
    }
}

fn overwrite<T: Clone + PartialEq>(
    slot: &mut T,
    value: Option<&T>,
    field: &str,
    changed: &mut Vec<String>,
) {
    if let Some(value) = value {
        if slot != value {
            *slot = value.clone();
            changed.push(field.to_string());
        }
    }
}

/// Accepts either a bare array or `{ "products": [...] }`.
pub fn parse_candidates(text: &str) -> Result<Vec<CandidateRecord>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        List(Vec<CandidateRecord>),
        Wrapped { products: Vec<CandidateRecord> },
    }
    Ok(match serde_json::from_str::<Input>(text)? {
        Input::List(list) | Input::Wrapped { products: list } => list,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChanges {
    pub id: String,
    pub name: String,
    pub fields: Vec<String>,
}

/// Result of one reconciliation pass. Nothing is removed from `updated`;
/// unmatched existing records are listed in `removed_candidates` for the
/// caller to decide on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    #[serde(skip)]
    pub updated: ProductStore,
    pub added: Vec<String>,
    pub changed: Vec<FieldChanges>,
    pub removed_candidates: Vec<String>,
    pub conflicts: Vec<Conflict>,
}

impl ReconcileOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}\s]").expect("valid name pattern"));

/// Lowercase, strip everything but letters, digits and whitespace, collapse
/// whitespace runs.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_name(a), normalize_name(b));
    normalized_match(&a, &b)
}

fn normalized_match(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(b) || b.contains(a))
}

/// Indices of store records whose name matches `name`.
pub fn find_matches(store: &ProductStore, name: &str) -> Vec<usize> {
    let wanted = normalize_name(name);
    store
        .products
        .iter()
        .enumerate()
        .filter(|(_, p)| normalized_match(&wanted, &normalize_name(&p.name)))
        .map(|(i, _)| i)
        .collect()
}

/// Merges `candidates` into a copy of `store`.
///
/// A candidate matching exactly one record overwrites that record field by
/// field. A candidate matching none is appended and the store renumbered. A
/// candidate matching several records, or a record some earlier candidate
/// already claimed, becomes a conflict.
pub fn reconcile(store: &ProductStore, candidates: &[CandidateRecord]) -> ReconcileOutcome {
    let mut updated = store.clone();
    let original_len = updated.products.len();
    // store index -> name of the candidate that claimed it
    let mut claimed: HashMap<usize, String> = HashMap::new();
    let mut added = Vec::new();
    let mut changed = Vec::new();
    let mut conflicts = Vec::new();

    for candidate in candidates {
        if normalize_name(&candidate.name).is_empty() {
            tracing::warn!(candidate = %candidate.name, "candidate name normalizes to empty");
            conflicts.push(Conflict {
                name: candidate.name.clone(),
                reason: "name is empty after normalization".to_string(),
            });
            continue;
        }

        let matches = find_matches(&updated, &candidate.name);
        match matches.as_slice() {
            [] => {
                let id = match &candidate.id {
                    Some(id) if updated.contains_id(id) => {
                        conflicts.push(Conflict {
                            name: candidate.name.clone(),
                            reason: format!("id '{id}' already belongs to another record"),
                        });
                        continue;
                    }
                    Some(id) if !crate::model::is_kebab(id) => {
                        conflicts.push(Conflict {
                            name: candidate.name.clone(),
                            reason: format!("id '{id}' is not lowercase-kebab"),
                        });
                        continue;
                    }
                    Some(id) => id.clone(),
                    None => updated.unique_id_for(&candidate.name),
                };
                let mut record = ProductRecord::named(id, candidate.name.clone());
                candidate.apply_to(&mut record);
                tracing::info!(product = %record.name, id = %record.id, "adding new record");
                updated.products.push(record);
                updated.renumber_positions();
                claimed.insert(updated.products.len() - 1, candidate.name.clone());
                added.push(candidate.name.clone());
            }
            [index] => {
                let index = *index;
                if let Some(previous) = claimed.get(&index) {
                    conflicts.push(Conflict {
                        name: candidate.name.clone(),
                        reason: format!(
                            "'{}' was already matched by candidate '{previous}'",
                            updated.products[index].name
                        ),
                    });
                    continue;
                }
                let record = &mut updated.products[index];
                if let Some(id) = candidate.id.as_deref().filter(|id| *id != record.id) {
                    conflicts.push(Conflict {
                        name: candidate.name.clone(),
                        reason: format!(
                            "matched '{}' but carries id '{id}' instead of '{}'",
                            record.name, record.id
                        ),
                    });
                    continue;
                }
                // The store keeps its own display name; the source name is
                // only a lookup key.
                let mut incoming = candidate.clone();
                incoming.name = record.name.clone();
                let fields = incoming.apply_to(record);
                if !fields.is_empty() {
                    tracing::info!(product = %record.name, fields = ?fields, "updated record");
                    changed.push(FieldChanges {
                        id: record.id.clone(),
                        name: record.name.clone(),
                        fields,
                    });
                }
                claimed.insert(index, candidate.name.clone());
            }
            many => {
                let err = PipelineError::MatchAmbiguity {
                    name: candidate.name.clone(),
                    matches: many.iter().map(|&i| updated.products[i].name.clone()).collect(),
                };
                tracing::warn!(candidate = %candidate.name, "{err}");
                conflicts.push(Conflict {
                    name: candidate.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let removed_candidates: Vec<String> = updated.products[..original_len]
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed.contains_key(i))
        .map(|(_, p)| p.name.clone())
        .collect();
    for name in &removed_candidates {
        tracing::warn!(product = %name, "record has no matching candidate; left in place");
    }

    ReconcileOutcome {
        updated,
        added,
        changed,
        removed_candidates,
        conflicts,
    }
}

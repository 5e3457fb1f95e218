//! Load and save the canonical product document.
//!
//! Every other stage reads and writes the store through this module only.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::affiliate::AffiliatePolicy;
use crate::error::{LinkViolation, PipelineError, Result};
use crate::model::{ProductStore, is_kebab};

/// Keys every product object must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "position",
    "name",
    "badge",
    "tagline",
    "rating",
    "userRatings",
    "priceTier",
    "affiliateLink",
    "imageRef",
    "whatWeLike",
    "keyFeatures",
];

/// Reads the store at `path`, checks the schema and orders records by position.
pub fn load(path: &Path) -> Result<ProductStore> {
    let text = fs::read_to_string(path)?;
    let store = parse(&text)?;
    tracing::debug!(
        path = %path.display(),
        products = store.products.len(),
        "loaded product store"
    );
    Ok(store)
}

pub fn parse(text: &str) -> Result<ProductStore> {
    let raw: Value = serde_json::from_str(text)?;
    check_required_fields(&raw)?;
    let mut store: ProductStore = serde_json::from_value(raw)
        .map_err(|err| PipelineError::Schema(format!("malformed store: {err}")))?;
    check_schema(&store)?;
    store.products.sort_by_key(|p| p.position);
    Ok(store)
}

/// Writes pretty-printed JSON through a temp file in the same directory,
/// then renames it over `path`.
pub fn save(store: &ProductStore, path: &Path) -> Result<()> {
    check_schema(store)?;
    write_json_atomic(store, path)?;
    tracing::info!(path = %path.display(), products = store.products.len(), "saved product store");
    Ok(())
}

/// A record whose affiliate link fails the policy when the store is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkWarning {
    pub id: String,
    pub link: String,
    pub message: String,
    #[serde(skip)]
    pub violation: LinkViolation,
}

/// Runs the affiliate policy over every record's link.
pub fn link_warnings(store: &ProductStore, policy: &AffiliatePolicy) -> Vec<LinkWarning> {
    store
        .products
        .iter()
        .filter_map(|record| {
            let violation = policy.check(&record.affiliate_link).err()?;
            Some(LinkWarning {
                id: record.id.clone(),
                link: record.affiliate_link.clone(),
                message: violation.to_string(),
                violation,
            })
        })
        .collect()
}

/// Like [`save`], but also runs the link policy. Violations do not block the
/// write; they are logged and returned for the caller's report.
pub fn save_checked(
    store: &ProductStore,
    path: &Path,
    policy: &AffiliatePolicy,
) -> Result<Vec<LinkWarning>> {
    save(store, path)?;
    let warnings = link_warnings(store, policy);
    for warning in &warnings {
        tracing::warn!(product = %warning.id, link = %warning.link, "{}", warning.message);
    }
    Ok(warnings)
}

pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut encoded = serde_json::to_string_pretty(value)?;
    encoded.push('\n');
    write_atomic(encoded.as_bytes(), path)
}

/// Replaces `path` with `contents` so readers never see a partial file.
pub fn write_atomic(contents: &[u8], path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| PipelineError::Io(err.error))?;
    Ok(())
}

/// Structural checks: unique kebab ids and positions forming exactly 1..N.
pub fn check_schema(store: &ProductStore) -> Result<()> {
    let mut ids = HashSet::new();
    for product in &store.products {
        if !is_kebab(&product.id) {
            return Err(PipelineError::Schema(format!(
                "product '{}' has id '{}' which is not lowercase-kebab",
                product.name, product.id
            )));
        }
        if !ids.insert(product.id.as_str()) {
            return Err(PipelineError::Schema(format!("duplicate id '{}'", product.id)));
        }
    }

    let mut positions: Vec<usize> = store.products.iter().map(|p| p.position).collect();
    positions.sort_unstable();
    let expected = 1..=positions.len();
    if !positions.iter().copied().eq(expected) {
        return Err(PipelineError::Schema(format!(
            "positions must be 1..{} with no gaps or repeats, found {:?}",
            store.products.len(),
            positions
        )));
    }
    Ok(())
}

fn check_required_fields(raw: &Value) -> Result<()> {
    let page = raw
        .get("page")
        .ok_or_else(|| PipelineError::Schema("missing 'page' object".into()))?;
    if page.get("title").is_none() {
        return Err(PipelineError::Schema("page is missing required field 'title'".into()));
    }
    let products = raw
        .get("products")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::Schema("missing 'products' array".into()))?;

    let mut missing = Vec::new();
    for (index, product) in products.iter().enumerate() {
        let label = product
            .get("name")
            .and_then(Value::as_str)
            .map(|n| format!("'{n}'"))
            .unwrap_or_else(|| format!("#{}", index + 1));
        for field in REQUIRED_FIELDS {
            if product.get(field).is_none_or(Value::is_null) {
                missing.push(format!("product {label} is missing '{field}'"));
            }
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema(missing.join("; ")))
    }
}

/// Deletes the named records and renumbers. Every id must exist.
pub fn remove_records(store: &mut ProductStore, ids: &[String]) -> Result<Vec<String>> {
    if let Some(unknown) = ids.iter().find(|id| !store.contains_id(id)) {
        return Err(PipelineError::Schema(format!("cannot remove unknown id '{unknown}'")));
    }
    let mut removed = Vec::new();
    store.products.retain(|p| {
        if ids.contains(&p.id) {
            removed.push(p.name.clone());
            false
        } else {
            true
        }
    });
    store.renumber_positions();
    for name in &removed {
        tracing::info!(product = %name, "removed record");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageMetadata, ProductRecord};

    fn sample() -> ProductStore {
        let mut a = ProductRecord::named("dolphin-e10", "Dolphin E10");
        a.rating = 4.5;
        a.what_we_like = vec!["a".into(); 5];
        let b = ProductRecord::named("betta-se-solar", "Betta SE Solar");
        ProductStore::new(
            PageMetadata {
                title: "Best Robotic Pool Cleaners".into(),
                ..PageMetadata::default()
            },
            vec![a, b],
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("products.json");
        let store = sample();
        save(&store, &path).unwrap();
        assert_eq!(load(&path).unwrap(), store);
        // no temp files left behind
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn load_reports_missing_fields() {
        let text = r#"{
            "page": { "title": "t" },
            "products": [ { "id": "x", "position": 1, "name": "X" } ]
        }"#;
        match parse(text) {
            Err(PipelineError::Schema(msg)) => {
                assert!(msg.contains("product 'X' is missing 'badge'"), "{msg}");
                assert!(msg.contains("'keyFeatures'"), "{msg}");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn positions_with_gap_are_rejected() {
        let mut store = sample();
        store.products[1].position = 3;
        assert!(matches!(check_schema(&store), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn duplicate_positions_are_rejected() {
        let mut store = sample();
        store.products[1].position = 1;
        assert!(check_schema(&store).is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = sample();
        store.products[1].id = "dolphin-e10".into();
        assert!(check_schema(&store).is_err());
    }

    #[test]
    fn save_refuses_invalid_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut store = sample();
        store.products[0].position = 7;
        assert!(save(&store, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn load_orders_by_position() {
        let mut store = sample();
        store.products.swap(0, 1);
        store.products[0].position = 2;
        store.products[1].position = 1;
        let text = serde_json::to_string(&store).unwrap();
        let loaded = parse(&text).unwrap();
        assert_eq!(loaded.products[0].id, "dolphin-e10");
        assert_eq!(loaded.products[1].id, "betta-se-solar");
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let mut store = sample();
        store.products[0]
            .extra
            .insert("cleaningFocus".into(), serde_json::json!("Floor, Walls"));
        let text = serde_json::to_string_pretty(&store).unwrap();
        let loaded = parse(&text).unwrap();
        assert_eq!(loaded.products[0].extra["cleaningFocus"], "Floor, Walls");
    }

    #[test]
    fn checked_save_reports_duplicate_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut store = sample();
        store.products[0].affiliate_link =
            "https://www.amazon.com/dp/B0DMN819RB?tag=factbench-r-20".into();
        store.products[1].affiliate_link = "https://www.amazon.com/dp/B0D1?tag=foo&tag=bar".into();

        let policy = AffiliatePolicy::new("factbench-r-20");
        let warnings = save_checked(&store, &path, &policy).unwrap();
        assert!(path.exists());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, "betta-se-solar");
        assert_eq!(
            warnings[0].violation,
            LinkViolation::DuplicateTracking {
                found: vec!["foo".into(), "bar".into()]
            }
        );
        assert!(warnings[0].message.contains("multiple tracking parameters"));
    }

    #[test]
    fn checked_save_still_refuses_invalid_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut store = sample();
        store.products[1].position = 5;
        assert!(save_checked(&store, &path, &AffiliatePolicy::new("factbench-r-20")).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn remove_records_is_explicit() {
        let mut store = sample();
        let removed = remove_records(&mut store, &["dolphin-e10".to_string()]).unwrap();
        assert_eq!(removed, vec!["Dolphin E10"]);
        assert_eq!(store.products.len(), 1);
        assert_eq!(store.products[0].position, 1);

        assert!(remove_records(&mut store, &["ghost".to_string()]).is_err());
        assert_eq!(store.products.len(), 1);
    }
}

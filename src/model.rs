//! Product catalog data model.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of entries expected in `whatWeLike` and `keyFeatures`.
pub const LIST_LEN: usize = 5;

/// Price bucket shown as `$`..`$$$$`.
///
/// The display range and color of each tier are fixed here and nowhere else,
/// so every fragment renders the same tier the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceTier {
    Budget,
    Mid,
    Premium,
    Luxury,
}

impl PriceTier {
    pub const ALL: [PriceTier; 4] = [Self::Budget, Self::Mid, Self::Premium, Self::Luxury];

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "$" => Some(Self::Budget),
            "$$" => Some(Self::Mid),
            "$$$" => Some(Self::Premium),
            "$$$$" => Some(Self::Luxury),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Budget => "$",
            Self::Mid => "$$",
            Self::Premium => "$$$",
            Self::Luxury => "$$$$",
        }
    }

    pub fn range(self) -> &'static str {
        match self {
            Self::Budget => "Under $500",
            Self::Mid => "$500 - $999",
            Self::Premium => "$1000 - $1999",
            Self::Luxury => "$2000+",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Budget => "green",
            Self::Mid => "yellow",
            Self::Premium => "orange",
            Self::Luxury => "red",
        }
    }

    /// Tailwind text class for the tier color.
    pub fn text_class(self) -> &'static str {
        match self {
            Self::Budget => "text-green-500",
            Self::Mid => "text-yellow-500",
            Self::Premium => "text-orange-500",
            Self::Luxury => "text-red-500",
        }
    }

    pub fn legend() -> BTreeMap<String, TierLegend> {
        Self::ALL
            .iter()
            .map(|tier| {
                (
                    tier.symbol().to_string(),
                    TierLegend {
                        range: tier.range().to_string(),
                        color: tier.color().to_string(),
                    },
                )
            })
            .collect()
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLegend {
    pub range: String,
    pub color: String,
}

/// One product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub position: usize,
    pub name: String,
    pub badge: String,
    pub tagline: String,
    pub rating: f64,
    /// Display string such as "1,000+", kept verbatim.
    pub user_ratings: String,
    /// Tier symbol as written in the store; see [`ProductRecord::tier`].
    pub price_tier: String,
    pub affiliate_link: String,
    pub image_ref: String,
    pub what_we_like: Vec<String>,
    pub key_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_link: Option<String>,
    /// Source fields the pipeline carries but does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProductRecord {
    /// A record with only a name; every other field is empty.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: 0,
            name: name.into(),
            badge: String::new(),
            tagline: String::new(),
            rating: 0.0,
            user_ratings: String::new(),
            price_tier: String::new(),
            affiliate_link: String::new(),
            image_ref: String::new(),
            what_we_like: Vec::new(),
            key_features: Vec::new(),
            official_link: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn tier(&self) -> Option<PriceTier> {
        PriceTier::from_symbol(&self.price_tier)
    }

    pub fn has_external_image(&self) -> bool {
        is_external(&self.image_ref)
    }
}

pub fn is_external(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub id: String,
    pub heading: String,
    #[serde(default)]
    pub description: String,
}

/// Page-level copy stored alongside the products.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub price_guide: BTreeMap<String, TierLegend>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The canonical document: page metadata plus the ordered product list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStore {
    pub page: PageMetadata,
    pub products: Vec<ProductRecord>,
}

impl ProductStore {
    pub fn new(page: PageMetadata, products: Vec<ProductRecord>) -> Self {
        let mut store = Self { page, products };
        store.renumber_positions();
        store
    }

    /// Reassigns `position` 1..N from the current list order.
    pub fn renumber_positions(&mut self) {
        for (index, product) in self.products.iter_mut().enumerate() {
            product.position = index + 1;
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProductRecord> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Slug for `name` that no record in the store uses yet.
    pub fn unique_id_for(&self, name: &str) -> String {
        let base = match slugify(name) {
            s if s.is_empty() => "product".to_string(),
            s => s,
        };
        if !self.contains_id(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.contains_id(candidate))
            .unwrap_or(base)
    }

    /// Replaces the page price legend with the process-wide tier constants.
    pub fn sync_price_guide(&mut self) -> bool {
        let legend = PriceTier::legend();
        if self.page.price_guide == legend {
            return false;
        }
        self.page.price_guide = legend;
        true
    }

    pub fn touch(&mut self, date: &str) {
        self.page.last_updated = date.to_string();
    }
}

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));
static KEBAB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid kebab pattern"));

/// Lowercase-kebab slug: "Dolphin E10 (2025)" -> "dolphin-e10-2025".
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    NON_SLUG.replace_all(&lower, "-").trim_matches('-').to_string()
}

pub fn is_kebab(id: &str) -> bool {
    KEBAB.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Dolphin E10 (2025 Model)"), "dolphin-e10-2025-model");
        assert_eq!(slugify("  Polaris PCX 868 iQ "), "polaris-pcx-868-iq");
        assert_eq!(slugify("Beatbot AquaSense 2 Pro™"), "beatbot-aquasense-2-pro");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn kebab_ids() {
        assert!(is_kebab("dolphin-e10"));
        assert!(!is_kebab("Dolphin-E10"));
        assert!(!is_kebab("dolphin--e10"));
        assert!(!is_kebab("-dolphin"));
        assert!(!is_kebab(""));
    }

    #[test]
    fn tier_mapping_is_fixed() {
        assert_eq!(PriceTier::from_symbol("$$"), Some(PriceTier::Mid));
        assert_eq!(PriceTier::from_symbol("$$$$$"), None);
        assert_eq!(PriceTier::Budget.color(), "green");
        assert_eq!(PriceTier::Mid.color(), "yellow");
        assert_eq!(PriceTier::Premium.color(), "orange");
        assert_eq!(PriceTier::Luxury.color(), "red");
        assert_eq!(PriceTier::Luxury.range(), "$2000+");
        assert!(PriceTier::Budget < PriceTier::Luxury);
    }

    #[test]
    fn unique_id_appends_counter() {
        let store = ProductStore::new(
            PageMetadata::default(),
            vec![
                ProductRecord::named("dolphin-e10", "Dolphin E10"),
                ProductRecord::named("dolphin-e10-2", "Dolphin E10"),
            ],
        );
        assert_eq!(store.unique_id_for("Dolphin E10"), "dolphin-e10-3");
        assert_eq!(store.unique_id_for("Aiper Seagull"), "aiper-seagull");
        assert_eq!(store.unique_id_for("???"), "product");
    }

    #[test]
    fn sync_price_guide_reports_change_once() {
        let mut store = ProductStore::default();
        assert!(store.sync_price_guide());
        assert!(!store.sync_price_guide());
        assert_eq!(store.page.price_guide["$$$"].color, "orange");
    }

    #[test]
    fn external_image_detection() {
        let mut record = ProductRecord::named("a", "A");
        record.image_ref = "https://m.media-amazon.com/images/I/x.jpg".into();
        assert!(record.has_external_image());
        record.image_ref = "/assets/images/products/a.jpg".into();
        assert!(!record.has_external_image());
    }
}

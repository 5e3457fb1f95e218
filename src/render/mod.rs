//! Pure HTML fragment rendering from product records.
//!
//! No I/O happens here. The same records and variant always produce the same
//! bytes, which is what lets the splicer detect a no-op update.

mod grid;
mod review;
pub mod stars;
mod table;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::model::{PriceTier, ProductRecord};

pub use stars::{StarCounts, render_stars};

/// Key features shown on a product card.
pub const CARD_FEATURES: usize = 3;
/// Entries shown from any five-item list.
pub const TOP_N: usize = crate::model::LIST_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Grid,
    Table,
    Review,
    PriceGuide,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Self::Grid, Self::Table, Self::Review, Self::PriceGuide];

    pub fn name(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Table => "table",
            Self::Review => "review",
            Self::PriceGuide => "price-guide",
        }
    }

    fn marker_label(self) -> &'static str {
        match self {
            Self::Grid => "PRODUCT_GRID",
            Self::Table => "COMPARISON_TABLE",
            Self::Review => "REVIEWS",
            Self::PriceGuide => "PRICE_GUIDE",
        }
    }

    pub fn start_marker(self) -> String {
        format!("<!-- BEGIN GENERATED:{} -->", self.marker_label())
    }

    pub fn end_marker(self) -> String {
        format!("<!-- END GENERATED:{} -->", self.marker_label())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|v| v.name()).collect();
                format!("unknown variant '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Renders `records` (already filtered and ordered by the caller).
pub fn generate(records: &[ProductRecord], variant: Variant) -> String {
    match variant {
        Variant::Grid => grid::render(records),
        Variant::Table => table::render(records),
        Variant::Review => review::render(records),
        Variant::PriceGuide => render_price_guide(),
    }
}

/// `<p>` legend listing every tier with its range, each symbol in its color.
pub fn render_price_guide() -> String {
    let entries: Vec<String> = PriceTier::ALL
        .iter()
        .map(|tier| {
            format!(
                r#"<span class="font-semibold {}">{}</span> = {}"#,
                tier.text_class(),
                text(tier.symbol()),
                text(tier.range())
            )
        })
        .collect();
    format!(
        "<p class=\"text-center text-gray-400 mb-4\"><strong>Price Guide:</strong> {}</p>\n",
        entries.join(" | ")
    )
}

/// Tier symbol in its fixed color; unknown tiers render neutral.
pub(crate) fn price_badge(record: &ProductRecord, size_class: &str) -> String {
    let (class, symbol, range) = match record.tier() {
        Some(tier) => (tier.text_class(), tier.symbol(), tier.range()),
        None => ("text-gray-500", record.price_tier.as_str(), ""),
    };
    format!(
        r#"<span class="{size_class} font-bold {class}" title="{}">{}</span>"#,
        attr(range),
        text(symbol)
    )
}

pub(crate) fn top_n(items: &[String], n: usize) -> &[String] {
    &items[..items.len().min(n)]
}

pub(crate) fn text(s: &str) -> Cow<'_, str> {
    html_escape::encode_text(s)
}

pub(crate) fn attr(s: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(s)
}

pub(crate) fn review_href(record: &ProductRecord) -> String {
    format!("/reviews/{}/", record.id)
}

/// Outbound affiliate button.
pub(crate) fn cta(record: &ProductRecord, class: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank" rel="nofollow sponsored noopener noreferrer" class="{class}">Check Price</a>"#,
        attr(&record.affiliate_link)
    )
}

pub(crate) fn rating_label(rating: f64) -> String {
    format!("{rating:.1}/5.0")
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn record(position: usize, name: &str, tier: &str, rating: f64) -> ProductRecord {
        let mut r = ProductRecord::named(crate::model::slugify(name), name);
        r.position = position;
        r.badge = "Best Overall".into();
        r.tagline = "Cleans floors & walls".into();
        r.rating = rating;
        r.user_ratings = "1,000+".into();
        r.price_tier = tier.into();
        r.affiliate_link = format!("https://www.amazon.com/dp/B0DMN819R{position}?tag=mystore-20");
        r.image_ref = format!("/assets/images/products/{}.jpg", r.id);
        r.what_we_like = (1..=6).map(|i| format!("like {i}")).collect();
        r.key_features = (1..=5).map(|i| format!("feature {i}")).collect();
        r
    }

    fn sample() -> Vec<ProductRecord> {
        vec![
            record(1, "Dolphin E10", "$$", 4.5),
            record(2, "Polaris PCX 868 iQ", "$$$", 4.0),
            record(3, "Betta SE Solar", "$", 3.5),
        ]
    }

    #[test]
    fn every_variant_is_deterministic() {
        let records = sample();
        for variant in Variant::ALL {
            assert_eq!(generate(&records, variant), generate(&records, variant), "{variant}");
        }
    }

    #[test]
    fn rating_label_keeps_one_decimal() {
        assert_eq!(rating_label(4.0), "4.0/5.0");
        assert_eq!(rating_label(4.5), "4.5/5.0");
        assert_eq!(rating_label(5.0), "5.0/5.0");
    }

    #[test]
    fn variant_names_round_trip() {
        for variant in Variant::ALL {
            assert_eq!(variant.name().parse::<Variant>().unwrap(), variant);
        }
        assert!("carousel".parse::<Variant>().is_err());
    }

    #[test]
    fn tier_color_is_the_same_in_every_variant() {
        let records = vec![record(1, "Dolphin E10", "$$$", 4.5)];
        for variant in [Variant::Grid, Variant::Table, Variant::Review] {
            let html = generate(&records, variant);
            assert!(html.contains("text-orange-500"), "{variant} lost the tier color");
            for other in ["text-green-500", "text-yellow-500", "text-red-500"] {
                assert!(!html.contains(other), "{variant} used {other}");
            }
        }
    }

    #[test]
    fn price_guide_lists_all_tiers_in_order() {
        let html = render_price_guide();
        let budget = html.find("Under $500").unwrap();
        let luxury = html.find("$2000+").unwrap();
        assert!(budget < luxury);
        assert_eq!(html.matches(" | ").count(), 3);
    }

    #[test]
    fn text_is_escaped() {
        let mut r = record(1, "Dolphin <E10>", "$", 4.0);
        r.affiliate_link = "https://www.amazon.com/dp/X?tag=a&th=\"1\"".into();
        let html = generate(&[r], Variant::Grid);
        assert!(html.contains("Dolphin &lt;E10&gt;"));
        assert!(html.contains("&quot;1&quot;"));
    }

    #[test]
    fn unknown_tier_renders_neutral() {
        let html = generate(&[record(1, "Mystery", "$$$$$", 4.0)], Variant::Table);
        assert!(html.contains("text-gray-500"));
    }

    #[test]
    fn markers_are_distinct_per_variant() {
        assert_eq!(Variant::Grid.start_marker(), "<!-- BEGIN GENERATED:PRODUCT_GRID -->");
        assert_eq!(Variant::Grid.end_marker(), "<!-- END GENERATED:PRODUCT_GRID -->");
        assert_ne!(Variant::Table.start_marker(), Variant::Review.start_marker());
    }
}

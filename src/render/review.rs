use super::{
    TOP_N, attr, cta, price_badge, rating_label, render_stars, review_href, text, top_n,
};
use crate::model::ProductRecord;

const MAX_RELATED: usize = 3;

fn badge_class(badge: &str) -> &'static str {
    let plain = badge.trim_start_matches(|c: char| !c.is_alphanumeric()).trim();
    match plain.to_ascii_lowercase().as_str() {
        "best of the best" => "badge-gold-gradient animate-shimmer",
        "best overall" | "best for large pools" => "badge-primary",
        "best cordless" | "best ai navigation" => "badge-accent",
        "budget pick" | "proven cleaning powerhouse" => "badge-success",
        "best for above-ground pools" | "best surface skimmer" => "badge-info",
        "top smart features" | "best filtration versatility" => "badge-warning",
        "best premium cordless" => "badge-gold",
        _ => "badge-primary",
    }
}

/// Up to three other records in the same tier or within two ranks.
fn related<'a>(current: &ProductRecord, all: &'a [ProductRecord]) -> Vec<&'a ProductRecord> {
    all.iter()
        .filter(|p| p.id != current.id)
        .filter(|p| {
            (p.tier().is_some() && p.tier() == current.tier())
                || p.position.abs_diff(current.position) <= 2
        })
        .take(MAX_RELATED)
        .collect()
}

pub(super) fn render(records: &[ProductRecord]) -> String {
    records.iter().map(|p| article(p, records)).collect::<Vec<_>>().join("\n")
}

fn article(p: &ProductRecord, all: &[ProductRecord]) -> String {
    let mut out = format!(
        "<article class=\"review max-w-4xl mx-auto\" id=\"review-{}\">\n",
        attr(&p.id)
    );
    out.push_str("  <header class=\"mb-8\">\n");
    if !p.badge.is_empty() {
        out.push_str(&format!(
            "    <span class=\"badge {}\">{}</span>\n",
            badge_class(&p.badge),
            text(&p.badge)
        ));
    }
    out.push_str(&format!(
        "    <h1 class=\"text-4xl font-display font-bold mt-4\">{} Review</h1>\n",
        text(&p.name)
    ));
    if !p.tagline.is_empty() {
        out.push_str(&format!(
            "    <p class=\"text-lg text-gray-400 italic\">{}</p>\n",
            text(&p.tagline)
        ));
    }
    out.push_str(&format!(
        "    <div class=\"flex items-center gap-4 mt-4\"><div class=\"flex\">{}</div><span>{}</span><span class=\"text-gray-400\">{} ratings</span>{}</div>\n",
        render_stars(p.rating),
        rating_label(p.rating),
        text(&p.user_ratings),
        price_badge(p, "text-xl")
    ));
    out.push_str("  </header>\n");
    out.push_str(&format!(
        "  <img src=\"{}\" alt=\"{}\" class=\"w-full rounded-lg mb-8\" loading=\"lazy\">\n",
        attr(&p.image_ref),
        attr(&p.name)
    ));

    out.push_str(&list_section(
        "What We Like",
        "text-green-400",
        "&#10003;",
        top_n(&p.what_we_like, TOP_N),
    ));
    out.push_str(&list_section(
        "Key Features",
        "text-blue-400",
        "&bull;",
        top_n(&p.key_features, TOP_N),
    ));

    out.push_str(&format!(
        "  <div class=\"my-8 text-center\">{}</div>\n",
        cta(p, "btn-primary btn-lg")
    ));

    let related = related(p, all);
    if !related.is_empty() {
        out.push_str("  <aside class=\"related-products mt-12\">\n    <h2 class=\"text-2xl font-bold mb-4\">Related Products</h2>\n    <ul class=\"grid grid-cols-1 md:grid-cols-3 gap-4\">\n");
        for other in related {
            out.push_str(&format!(
                "      <li><a href=\"{}\" class=\"block card\"><span class=\"font-semibold\">{}</span> <span class=\"text-sm text-gray-400\">{}</span> {}</a></li>\n",
                attr(&review_href(other)),
                text(&other.name),
                rating_label(other.rating),
                price_badge(other, "text-sm")
            ));
        }
        out.push_str("    </ul>\n  </aside>\n");
    }
    out.push_str("</article>\n");
    out
}

fn list_section(heading: &str, mark_class: &str, mark: &str, items: &[String]) -> String {
    let mut out = format!(
        "  <section class=\"mb-8\">\n    <h2 class=\"text-2xl font-bold mb-4\">{heading}</h2>\n    <ul class=\"space-y-2\">\n"
    );
    for item in items {
        out.push_str(&format!(
            "      <li class=\"flex items-start\"><span class=\"{mark_class} mr-2\">{mark}</span><span>{}</span></li>\n",
            text(item)
        ));
    }
    out.push_str("    </ul>\n  </section>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::record;
    use super::*;

    #[test]
    fn badge_glyph_prefix_is_ignored() {
        assert_eq!(badge_class("🏆 Best Overall"), "badge-primary");
        assert_eq!(badge_class("Budget Pick"), "badge-success");
        assert_eq!(badge_class("Best OF THE BEST"), "badge-gold-gradient animate-shimmer");
        assert_eq!(badge_class("Something New"), "badge-primary");
    }

    #[test]
    fn related_prefers_same_tier_or_neighbours() {
        let all = vec![
            record(1, "Dolphin E10", "$$", 4.5),
            record(2, "Polaris PCX 868 iQ", "$$$", 4.0),
            record(3, "Betta SE Solar", "$", 3.5),
            record(4, "Aiper Seagull", "$$$$", 4.0),
            record(5, "Zodiac MX8", "$$", 4.0),
        ];
        let names: Vec<_> = related(&all[0], &all).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Polaris PCX 868 iQ", "Betta SE Solar", "Zodiac MX8"]);
        assert!(related(&all[0], &all[..1]).is_empty());
    }

    #[test]
    fn one_article_per_record_with_all_five_likes() {
        let html = render(&[
            record(1, "Dolphin E10", "$$", 4.5),
            record(2, "Polaris PCX 868 iQ", "$$$", 4.0),
        ]);
        assert_eq!(html.matches("<article").count(), 2);
        assert!(html.contains("like 5"));
        assert!(!html.contains("like 6"));
        assert!(html.contains("feature 5"));
        assert!(html.contains("href=\"/reviews/polaris-pcx-868-iq/\""));
    }
}

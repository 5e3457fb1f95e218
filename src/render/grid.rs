use super::{
    CARD_FEATURES, TOP_N, attr, cta, price_badge, rating_label, render_stars, review_href, text,
    top_n,
};
use crate::model::ProductRecord;

/// Award ribbon gradient by rank.
fn badge_gradient(position: usize) -> &'static str {
    match position {
        1 => "from-yellow-400 to-yellow-600",
        2 => "from-blue-400 to-blue-600",
        3 => "from-green-400 to-green-600",
        _ => "from-gray-600 to-gray-700",
    }
}

pub(super) fn render(records: &[ProductRecord]) -> String {
    let cards: Vec<String> = records.iter().map(card).collect();
    format!(
        "<div class=\"grid grid-cols-1 md:grid-cols-2 lg:grid-cols-3 xl:grid-cols-4 gap-6\">\n{}</div>\n",
        cards.concat()
    )
}

fn card(p: &ProductRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<!-- Product {}: {} -->\n",
        p.position,
        text(&p.name.replace("--", "-"))
    ));
    out.push_str(&format!(
        "<div class=\"card glow-hover group relative overflow-hidden\" id=\"product-{}\">\n",
        p.position
    ));
    out.push_str(&format!(
        "  <div class=\"absolute top-4 right-4 text-3xl font-bold text-amber-500/80 z-10\">#{}</div>\n",
        p.position
    ));
    if !p.badge.is_empty() {
        out.push_str(&format!(
            "  <span class=\"badge inline-block px-4 py-2 rounded-full text-sm font-bold text-white bg-gradient-to-r {}\">{}</span>\n",
            badge_gradient(p.position),
            text(&p.badge)
        ));
    }
    out.push_str(&format!(
        "  <div class=\"relative h-48 -mx-6 -mt-2 mb-4 overflow-hidden\"><img src=\"{}\" alt=\"{}\" class=\"w-full h-full object-cover\" loading=\"lazy\"></div>\n",
        attr(&p.image_ref),
        attr(&p.name)
    ));
    out.push_str(&format!("  <h3 class=\"text-xl font-bold mb-2\">{}</h3>\n", text(&p.name)));
    if !p.tagline.is_empty() {
        out.push_str(&format!(
            "  <p class=\"text-sm text-gray-400 mb-4 italic\">\"{}\"</p>\n",
            text(&p.tagline)
        ));
    }
    out.push_str("  <div class=\"flex items-center justify-between mb-4\">\n");
    out.push_str(&format!(
        "    <div class=\"flex items-center space-x-2\"><div class=\"flex\">{}</div><span class=\"text-sm text-gray-400\">{}</span></div>\n",
        render_stars(p.rating),
        rating_label(p.rating)
    ));
    out.push_str(&format!(
        "    <div class=\"text-right\">{}<div class=\"text-xs text-gray-500\">User Ratings: {}</div></div>\n",
        price_badge(p, "text-2xl"),
        text(&p.user_ratings)
    ));
    out.push_str("  </div>\n");

    out.push_str("  <h4 class=\"text-sm font-semibold text-gray-400 uppercase tracking-wider\">Key Features:</h4>\n  <ul class=\"space-y-2 mb-4\">\n");
    for feature in top_n(&p.key_features, CARD_FEATURES) {
        out.push_str(&format!(
            "    <li class=\"text-sm text-gray-300\"><span class=\"text-accent mr-2\">&#10003;</span>{}</li>\n",
            text(feature)
        ));
    }
    out.push_str("  </ul>\n");

    out.push_str("  <h4 class=\"text-sm font-semibold text-gray-400 uppercase tracking-wider\">What We Like:</h4>\n  <ul class=\"space-y-1 mb-4\">\n");
    for item in top_n(&p.what_we_like, TOP_N) {
        out.push_str(&format!(
            "    <li class=\"text-sm text-gray-300\"><span class=\"text-success mr-2\">+</span>{}</li>\n",
            text(item)
        ));
    }
    out.push_str("  </ul>\n");

    out.push_str("  <div class=\"mt-6 space-y-3\">\n");
    out.push_str(&format!(
        "    <a href=\"{}\" class=\"block w-full bg-base-300 text-white py-3 px-4 rounded-lg text-center\">Read Full Review &rarr;</a>\n",
        attr(&review_href(p))
    ));
    out.push_str(&format!("    {}\n", cta(p, "block w-full btn-primary text-center")));
    if let Some(official) = &p.official_link {
        out.push_str(&format!(
            "    <a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"block w-full bg-gray-700 text-white py-3 px-4 rounded-lg text-center\">Official Site</a>\n",
            attr(official)
        ));
    }
    out.push_str("  </div>\n</div>\n");
    out
}

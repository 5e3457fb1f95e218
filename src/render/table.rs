use super::{attr, cta, price_badge, rating_label, render_stars, text};
use crate::model::ProductRecord;

pub(super) fn render(records: &[ProductRecord]) -> String {
    let mut out = String::from(
        "<div class=\"overflow-x-auto\">\n<table class=\"w-full comparison-table\">\n  <thead>\n    <tr class=\"bg-base-300 border-b border-base-200\">\n      <th class=\"px-6 py-4 text-left\">Product</th>\n      <th class=\"px-6 py-4 text-center\">Our Rating</th>\n      <th class=\"px-6 py-4 text-center\">Price</th>\n      <th class=\"px-6 py-4 text-center\">Key Standout</th>\n      <th class=\"px-6 py-4 text-center\"></th>\n    </tr>\n  </thead>\n  <tbody>\n",
    );
    for (index, p) in records.iter().enumerate() {
        out.push_str(&row(p, index));
    }
    out.push_str("  </tbody>\n</table>\n</div>\n");
    out
}

fn row(p: &ProductRecord, index: usize) -> String {
    let stripe = if index % 2 == 0 { "bg-base-200" } else { "bg-base-100" };
    let badge = if p.badge.is_empty() {
        String::new()
    } else {
        format!(
            "<span class=\"badge badge-sm {}\">{}</span>",
            if p.position == 1 { "badge-best" } else { "badge-value" },
            text(&p.badge)
        )
    };
    let standout = p.key_features.first().map(String::as_str).unwrap_or_default();

    let mut out = format!("    <tr class=\"{stripe}\" id=\"compare-{}\">\n", attr(&p.id));
    out.push_str(&format!(
        "      <td class=\"px-6 py-4\"><span class=\"text-2xl font-bold text-amber-500\">#{}</span> <span class=\"font-semibold\">{}</span> {badge}</td>\n",
        p.position,
        text(&p.name)
    ));
    out.push_str(&format!(
        "      <td class=\"px-6 py-4 text-center\"><div class=\"flex justify-center space-x-1\">{}</div><span class=\"text-sm text-gray-400\">({}) &middot; {} reviews</span></td>\n",
        render_stars(p.rating),
        rating_label(p.rating),
        text(&p.user_ratings)
    ));
    out.push_str(&format!(
        "      <td class=\"px-6 py-4 text-center\">{}</td>\n",
        price_badge(p, "text-lg")
    ));
    out.push_str(&format!(
        "      <td class=\"px-6 py-4 text-center text-sm font-semibold\">{}</td>\n",
        text(standout)
    ));
    out.push_str(&format!(
        "      <td class=\"px-6 py-4 text-center\">{}</td>\n",
        cta(p, "btn-primary-sm")
    ));
    out.push_str("    </tr>\n");
    out
}

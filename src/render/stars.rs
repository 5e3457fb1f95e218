/// Star icons for a rating out of five.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarCounts {
    pub full: usize,
    pub half: usize,
    pub empty: usize,
}

impl StarCounts {
    /// `floor(rating)` full stars, one half star when the rating has any
    /// fractional part, the rest empty.
    pub fn for_rating(rating: f64) -> Self {
        let rating = if rating.is_finite() { rating.clamp(0.0, 5.0) } else { 0.0 };
        let full = rating.floor() as usize;
        let half = usize::from(rating % 1.0 != 0.0);
        Self {
            full,
            half,
            empty: 5 - full - half,
        }
    }
}

const FULL: &str = r#"<i class="fas fa-star text-yellow-400"></i>"#;
const HALF: &str = r#"<i class="fas fa-star-half-alt text-yellow-400"></i>"#;
const EMPTY: &str = r#"<i class="far fa-star text-gray-600"></i>"#;

pub fn render_stars(rating: f64) -> String {
    let counts = StarCounts::for_rating(rating);
    let mut out = String::with_capacity(48 * 5);
    for _ in 0..counts.full {
        out.push_str(FULL);
    }
    for _ in 0..counts.half {
        out.push_str(HALF);
    }
    for _ in 0..counts.empty {
        out.push_str(EMPTY);
    }
    out
}

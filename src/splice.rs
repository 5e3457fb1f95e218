//! Replaces one generated region of a larger static page.
//!
//! A region is either a pair of marker strings or an element id. Anything
//! outside the region is copied through byte for byte. There is no fallback
//! insertion point: a missing anchor is an error.

use regex::Regex;

use crate::error::{PipelineError, Result};

/// Where the fragment goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    Markers { start: String, end: String },
    /// Inner content of the element carrying this `id`.
    Element { id: String },
}

impl Region {
    pub fn markers(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::Markers {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn element(id: impl Into<String>) -> Self {
        Self::Element { id: id.into() }
    }

    pub fn for_variant(variant: crate::render::Variant) -> Self {
        Self::markers(variant.start_marker(), variant.end_marker())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceOutcome {
    pub document: String,
    pub changed: bool,
}

pub fn splice(document: &str, region: &Region, fragment: &str) -> Result<SpliceOutcome> {
    let spliced = match region {
        Region::Markers { start, end } => splice_markers(document, start, end, fragment)?,
        Region::Element { id } => splice_element(document, id, fragment)?,
    };
    let changed = spliced != document;
    Ok(SpliceOutcome {
        document: spliced,
        changed,
    })
}

/// Everything between `start` and `end` becomes `fragment`; both markers stay.
pub fn splice_markers(document: &str, start: &str, end: &str, fragment: &str) -> Result<String> {
    if start.is_empty() || end.is_empty() {
        return Err(PipelineError::InvalidFragment("markers must not be empty".into()));
    }
    if fragment.contains(start) || fragment.contains(end) {
        return Err(PipelineError::InvalidFragment(
            "fragment contains its own region marker".into(),
        ));
    }
    let start_at = find_once(document, start)?;
    let content_from = start_at + start.len();
    let end_at = match document[content_from..].find(end) {
        Some(offset) => content_from + offset,
        None => {
            return Err(PipelineError::MarkerNotFound {
                marker: end.to_string(),
            });
        }
    };
    // An end marker that only appears before the start is not an end marker.
    find_once(document, end)?;

    Ok(replace_span(document, content_from, end_at, fragment))
}

fn find_once(document: &str, marker: &str) -> Result<usize> {
    let count = document.matches(marker).count();
    match count {
        0 => Err(PipelineError::MarkerNotFound {
            marker: marker.to_string(),
        }),
        1 => Ok(document.find(marker).unwrap_or_default()),
        _ => Err(PipelineError::DuplicateMarker {
            marker: marker.to_string(),
            count,
        }),
    }
}

fn replace_span(document: &str, from: usize, to: usize, fragment: &str) -> String {
    let body = fragment.trim_matches('\n');
    let mut out = String::with_capacity(document.len() + fragment.len());
    out.push_str(&document[..from]);
    out.push('\n');
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    out.push_str(&document[to..]);
    out
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Replaces the inner content of the single element whose `id` is `id`.
pub fn splice_element(document: &str, id: &str, fragment: &str) -> Result<String> {
    let marker = format!("id=\"{id}\"");
    let opening = Regex::new(&format!(
        r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*\sid\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(id)
    ))
    .map_err(|err| PipelineError::InvalidFragment(err.to_string()))?;

    let found: Vec<_> = opening.captures_iter(document).collect();
    let caps = match found.as_slice() {
        [] => return Err(PipelineError::MarkerNotFound { marker }),
        [one] => one,
        many => {
            return Err(PipelineError::DuplicateMarker {
                marker,
                count: many.len(),
            });
        }
    };
    let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
        return Err(PipelineError::MarkerNotFound { marker });
    };
    let tag = tag.as_str().to_ascii_lowercase();
    if VOID_ELEMENTS.contains(&tag.as_str()) || whole.as_str().ends_with("/>") {
        return Err(PipelineError::InvalidFragment(format!(
            "element #{id} is a <{tag}> and has no content to replace"
        )));
    }
    if opening.is_match(fragment) {
        return Err(PipelineError::InvalidFragment(format!(
            "fragment contains another element with id '{id}'"
        )));
    }

    let inner_from = whole.end();
    let inner_to = matching_close(document, inner_from, &tag).ok_or_else(|| {
        PipelineError::MarkerNotFound {
            marker: format!("</{tag}> closing #{id}"),
        }
    })?;
    Ok(replace_span(document, inner_from, inner_to, fragment))
}

/// Byte offset of the `</tag>` that closes an element whose content starts at
/// `from`, skipping nested elements with the same name.
fn matching_close(document: &str, from: usize, tag: &str) -> Option<usize> {
    let pattern = Regex::new(&format!(r"(?i)<(/?){}\b[^>]*?(/?)>", regex::escape(tag))).ok()?;
    let mut depth = 1usize;
    for caps in pattern.captures_iter(&document[from..]) {
        let whole = caps.get(0)?;
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some(from + whole.start());
            }
        } else if !self_closing {
            depth += 1;
        }
    }
    None
}

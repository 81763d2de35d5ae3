use regex::Regex;
use std::sync::OnceLock;

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Strips HTML tags from a directions step's instructions, collapsing
/// whitespace left behind by the removed markup.
pub fn strip_html(input: &str) -> String {
    let pattern = TAG_PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    let stripped = pattern.replace_all(input, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

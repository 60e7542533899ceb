//! Markdown rendering for CMS bodies.

use comrak::{Options, markdown_to_html};

/// Average reading speed used for reading-time estimates.
const WORDS_PER_MINUTE: usize = 200;

/// Render Markdown to HTML with GitHub Flavored Markdown extensions.
///
/// Raw HTML in the source is not rendered; editors get tables,
/// strikethrough and autolinks instead.
#[must_use]
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());

    markdown_to_html(source, &options)
}

/// Estimated reading time in whole minutes, never less than one.
#[must_use]
pub fn reading_time_minutes(source: &str) -> u32 {
    let words = source.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Plain-text excerpt from a Markdown body: the first paragraph, cut at a
/// word boundary once it exceeds `max_chars`.
#[must_use]
pub fn excerpt_from_markdown(source: &str, max_chars: usize) -> String {
    let paragraph = source
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#') && !p.starts_with('!'))
        .unwrap_or_default();

    let plain: String = paragraph
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '[' | ']'))
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    if plain.chars().count() <= max_chars {
        return plain;
    }

    let mut out = String::new();
    for word in plain.split_whitespace() {
        if out.chars().count() + word.chars().count() + 1 > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        // A single word longer than the limit is cut mid-word.
        out = plain.trim_start().chars().take(max_chars).collect();
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_gfm() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
    }

    #[test]
    fn test_render_markdown_drops_raw_html() {
        let html = render_markdown("<script>alert(1)</script>\n\nHello");
        assert!(!html.contains("<script>"));
        assert!(html.contains("Hello"));
    }

    #[test]
    fn test_reading_time_rounds_up_with_minimum() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes("word"), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(201)), 2);
    }

    #[test]
    fn test_excerpt_skips_headings_and_truncates() {
        let body = "# Title\n\nVitamin D supports **bone health** in winter months.\n\nMore.";
        assert_eq!(
            excerpt_from_markdown(body, 200),
            "Vitamin D supports bone health in winter months."
        );
        assert_eq!(excerpt_from_markdown(body, 20), "Vitamin D supports…");
    }

    #[test]
    fn test_excerpt_cuts_an_overlong_first_word() {
        let body = "Pneumonoultramicroscopicsilicovolcanoconiosis is rare.";
        assert_eq!(excerpt_from_markdown(body, 10), "Pneumonoul…");
        assert_eq!(excerpt_from_markdown("Ärztliche-Empfehlung", 3), "Ärz…");
    }
}

//! Markdown rendering
//!
//! Post content and service descriptions are stored as Markdown and rendered
//! to HTML on every write with pulldown-cmark.
//!
//! # Example
//!
//! ```
//! use sitecraft::services::markdown::render_markdown;
//!
//! let html = render_markdown("# Hello World\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Average adult reading speed used for `reading_time_minutes`
pub const WORDS_PER_MINUTE: usize = 200;

/// Default excerpt length in characters
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Render Markdown to HTML.
///
/// Tables, strikethrough and task lists are enabled. Fenced code blocks keep
/// their language as a `language-*` class for client-side highlighting.
pub fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    let events = rewrite_code_blocks(parser);

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events.into_iter());
    html_output
}

fn rewrite_code_blocks<'a>(parser: Parser<'a>) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                        lang.split_whitespace().next().map(str::to_string)
                    }
                    _ => None,
                };
                code = Some((lang, String::new()));
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, buf)) = code.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, buf)) = code.take() {
                    events.push(Event::Html(code_block_html(&buf, lang.as_deref()).into()));
                }
            }
            other => events.push(other),
        }
    }

    events
}

fn code_block_html(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(code)),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Visible text of a Markdown document with whitespace collapsed
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::new();
    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Text(t) | Event::Code(t) => {
                text.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::BlockQuote
                | TagEnd::CodeBlock
                | TagEnd::TableCell,
            ) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Estimated reading time: words / 200, rounded up, at least one minute
pub fn reading_time_minutes(markdown: &str) -> i32 {
    let words = plain_text(markdown).split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Plain-text excerpt of at most `max_chars` characters.
///
/// Cuts at the last word boundary that fits and appends `…` when shortened.
pub fn plain_excerpt(markdown: &str, max_chars: usize) -> String {
    let text = plain_text(markdown);
    if text.chars().count() <= max_chars {
        return text;
    }

    let budget = max_chars.saturating_sub(1);
    let mut excerpt = String::new();
    for word in text.split(' ') {
        let needed = if excerpt.is_empty() { 0 } else { 1 } + word.chars().count();
        if excerpt.chars().count() + needed > budget {
            break;
        }
        if !excerpt.is_empty() {
            excerpt.push(' ');
        }
        excerpt.push_str(word);
    }

    // a single word longer than the budget
    if excerpt.is_empty() {
        excerpt = text.chars().take(budget).collect();
    }

    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_render_basic_elements() {
        let html = render_markdown("# Title\n\nSome *em* and **strong** text.\n\n- one\n- two");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>em</em>"));
        assert!(html.contains("<strong>strong</strong>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn test_render_tables_and_strikethrough() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_render_code_blocks() {
        let html = render_markdown("```rust\nfn main() { let a = 1 < 2; }\n```");
        assert!(html.contains("<code class=\"language-rust\">"));
        assert!(html.contains("1 &lt; 2"));

        let html = render_markdown("    indented <b>");
        assert!(html.contains("<pre><code>indented &lt;b&gt;"));
    }

    #[test]
    fn test_render_escapes_text() {
        let html = render_markdown("a < b & c");
        assert!(html.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_plain_text_strips_markup() {
        let text = plain_text("## Heading\n\nA [link](https://x.io) and `code`.\n\n> quoted");
        assert_eq!(text, "Heading A link and code. quoted");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes("just a few words"), 1);
        let words = vec!["word"; 201].join(" ");
        assert_eq!(reading_time_minutes(&words), 2);
        let words = vec!["word"; 1000].join(" ");
        assert_eq!(reading_time_minutes(&words), 5);
    }

    #[test]
    fn test_plain_excerpt() {
        assert_eq!(plain_excerpt("Short **text**", 50), "Short text");
        assert_eq!(
            plain_excerpt("The quick brown fox jumps over the lazy dog", 20),
            "The quick brown fox…"
        );
        assert_eq!(plain_excerpt("Supercalifragilistic", 6), "Super…");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn property_excerpt_fits(input in "[a-zA-Z *#\n]{0,400}", max in 5usize..120) {
            let excerpt = plain_excerpt(&input, max);
            prop_assert!(excerpt.chars().count() <= max);
        }

        #[test]
        fn property_reading_time_positive(input in "\\PC{0,300}") {
            prop_assert!(reading_time_minutes(&input) >= 1);
        }
    }
}

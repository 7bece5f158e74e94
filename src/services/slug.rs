//! URL slug generation

/// Turn a title or name into a URL slug.
///
/// Lowercases, keeps ASCII alphanumerics and non-ASCII letters, turns every
/// other character into a separator, collapses separator runs into one `-`
/// and trims `-` from both ends. May return an empty string.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let keep = c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric());
        if keep {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Slug from an explicit value when given, else from `fallback`
pub fn slug_or_generate(explicit: Option<&str>, fallback: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => generate_slug(slug),
        None => generate_slug(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Web  Design & SEO!  "), "web-design-seo");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("snake_case_name"), "snake-case-name");
    }

    #[test]
    fn test_non_ascii_letters_kept() {
        assert_eq!(generate_slug("Café Crème"), "café-crème");
        assert_eq!(generate_slug("网站 设计"), "网站-设计");
        assert_eq!(generate_slug("a — b"), "a-b");
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(generate_slug(""), "");
        assert_eq!(generate_slug("!!! ---"), "");
    }

    #[test]
    fn test_slug_or_generate() {
        assert_eq!(slug_or_generate(Some("Custom Slug"), "Title"), "custom-slug");
        assert_eq!(slug_or_generate(Some("  "), "The Title"), "the-title");
        assert_eq!(slug_or_generate(None, "The Title"), "the-title");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn property_slug_shape(input in "\\PC{0,60}") {
            let slug = generate_slug(&input);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.chars().any(|c| c.is_ascii_uppercase() || c.is_whitespace()));
            prop_assert_eq!(generate_slug(&slug), slug.clone());
        }
    }
}

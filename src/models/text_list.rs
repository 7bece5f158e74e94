//! List-of-strings column type
//!
//! Post tags and service features are stored in a single text column with each
//! item wrapped in newlines (`"\nrust\nweb\n"`), so a single `LIKE '%\nitem\n%'`
//! matches one whole item on every backend.

use serde::{Deserialize, Serialize};

const DELIMITER: char = '\n';

/// Ordered, de-duplicated list of non-empty single-line strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TextList(Vec<String>);

impl TextList {
    /// Normalize items: trim, collapse inner line breaks, drop blanks and duplicates
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for item in items {
            let item = item
                .as_ref()
                .split(|c: char| c == '\n' || c == '\r')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if !item.is_empty() && !list.iter().any(|existing| existing == &item) {
                list.push(item);
            }
        }
        Self(list)
    }

    /// Encode for storage
    pub fn to_db(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let mut out = String::from(DELIMITER);
        for item in &self.0 {
            out.push_str(item);
            out.push(DELIMITER);
        }
        out
    }

    /// `LIKE` pattern matching rows whose list contains `item`
    pub fn like_pattern(item: &str) -> String {
        format!("%{}{}{}%", DELIMITER, item.trim(), DELIMITER)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only the first `max` items
    pub fn truncate(&mut self, max: usize) {
        self.0.truncate(max);
    }
}

impl From<Vec<String>> for TextList {
    fn from(items: Vec<String>) -> Self {
        Self::new(items)
    }
}

impl From<TextList> for Vec<String> {
    fn from(list: TextList) -> Self {
        list.0
    }
}

/// Decode the stored form
impl From<String> for TextList {
    fn from(raw: String) -> Self {
        Self::new(raw.split(DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_items() {
        let list = TextList::new(["  rust ", "", "web", "rust", "multi\nline"]);
        assert_eq!(list.as_slice(), &["rust", "web", "multi line"]);
    }

    #[test]
    fn test_db_encoding() {
        let list = TextList::new(["a", "b c"]);
        assert_eq!(list.to_db(), "\na\nb c\n");
        assert_eq!(TextList::from(list.to_db()), list);
        assert_eq!(TextList::default().to_db(), "");
        assert!(TextList::from(String::new()).is_empty());
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(TextList::like_pattern(" seo "), "%\nseo\n%");
    }

    #[test]
    fn test_serde_as_array() {
        let list: TextList = serde_json::from_str(r#"["x", "y", "x"]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["x","y"]"#);
    }
}

//! Query types shared by list endpoints

use serde::Deserialize;

use crate::models::{ListParams, DEFAULT_LIMIT};

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// `?page=&limit=`, clamped into a valid `ListParams`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.limit)
    }
}

/// Blank query values mean "no filter"
pub fn filter_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_clamps() {
        let q: PageQuery = serde_json::from_str(r#"{"page": 0, "limit": 500}"#).unwrap();
        assert_eq!(q.params(), ListParams::new(1, 100));
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.params(), ListParams::default());
    }

    #[test]
    fn test_filter_text() {
        assert_eq!(filter_text(Some("  ".into())), None);
        assert_eq!(filter_text(Some(" seo ".into())), Some("seo".to_string()));
        assert_eq!(filter_text(None), None);
    }
}

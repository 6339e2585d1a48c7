use serde::{Deserialize, Serialize};

/// Query parameters shared by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Clamped page/limit; limit is capped at 100.
    pub fn clamped(&self) -> (i64, i64) {
        let page = self.page.max(1);
        let limit = self.limit.clamp(1, 100);
        (page, limit)
    }

    pub fn offset(&self) -> i64 {
        let (page, limit) = self.clamped();
        (page - 1) * limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: i64, limit: i64, total: i64) -> Self {
        Self {
            data,
            pagination: PageMeta::new(page, limit, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(PageMeta::new(1, 10, 0).total_pages, 0);
        assert_eq!(PageMeta::new(1, 10, 1).total_pages, 1);
        assert_eq!(PageMeta::new(1, 10, 10).total_pages, 1);
        assert_eq!(PageMeta::new(1, 10, 11).total_pages, 2);
        assert_eq!(PageMeta::new(1, 3, 7).total_pages, 3);
    }

    #[test]
    fn clamps_out_of_range_params() {
        let p = Pagination {
            page: 0,
            limit: 1000,
            search: None,
        };
        assert_eq!(p.clamped(), (1, 100));
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn offset_from_page() {
        let p = Pagination {
            page: 3,
            limit: 20,
            search: None,
        };
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn defaults_apply_when_params_missing() {
        let p: Pagination = serde_json::from_str("{}").expect("parse empty params");
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert!(p.search.is_none());
    }
}

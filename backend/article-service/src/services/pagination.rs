//! Page-number pagination over an assembled sequence

use serde::Serialize;

use crate::config::PaginationConfig;
use crate::error::{AppError, Result};

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: PageNumber,
    size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageNumber {
    Number(usize),
    Last,
}

impl PageRequest {
    /// Parse raw `page` / `size` query values.
    ///
    /// `size` falls back to the default when missing, unparsable or not
    /// positive, and is clamped to the maximum. `page` defaults to 1 and
    /// also accepts `last`; anything else that is not a positive integer
    /// is an `InvalidPage`.
    pub fn from_query(
        page: Option<&str>,
        size: Option<&str>,
        config: &PaginationConfig,
    ) -> Result<Self> {
        let size = size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|s| *s > 0)
            .map(|s| (s as u64).min(config.max_page_size as u64) as usize)
            .unwrap_or(config.page_size);

        let page = match page.map(str::trim) {
            None | Some("") => PageNumber::Number(1),
            Some("last") => PageNumber::Last,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => PageNumber::Number(n),
                _ => return Err(AppError::InvalidPage(format!("'{}' is not a page", raw))),
            },
        };

        Ok(Self { page, size })
    }

    pub fn first(size: usize) -> Self {
        Self {
            page: PageNumber::Number(1),
            size: size.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// One page of a sequence plus the numbers a client needs to navigate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
            num_pages: self.num_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Slice `items` to the requested page. An empty sequence still has a
/// valid (empty) page 1; any page past the last one is an error.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Result<Page<T>> {
    let total_count = items.len();
    let size = request.size.max(1);
    let num_pages = total_count.div_ceil(size).max(1);

    let page = match request.page {
        PageNumber::Last => num_pages,
        PageNumber::Number(n) if n <= num_pages => n,
        PageNumber::Number(n) => {
            return Err(AppError::InvalidPage(format!(
                "page {} is beyond the last page ({})",
                n, num_pages
            )))
        }
    };

    let items = items
        .into_iter()
        .skip((page - 1) * size)
        .take(size)
        .collect();

    Ok(Page {
        items,
        page,
        page_size: size,
        total_count,
        num_pages,
        has_next: page < num_pages,
        has_previous: page > 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig::default()
    }

    fn request(page: Option<&str>, size: Option<&str>) -> PageRequest {
        PageRequest::from_query(page, size, &config()).unwrap()
    }

    #[test]
    fn test_forty_five_items_in_pages_of_twenty() {
        let items: Vec<u32> = (0..45).collect();

        let first = paginate(items.clone(), request(Some("1"), Some("20"))).unwrap();
        assert_eq!(first.items.len(), 20);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.total_count, 45);

        let third = paginate(items.clone(), request(Some("3"), Some("20"))).unwrap();
        assert_eq!(third.items, vec![40, 41, 42, 43, 44]);
        assert!(!third.has_next);
        assert!(third.has_previous);

        let fourth = paginate(items, request(Some("4"), Some("20")));
        assert!(matches!(fourth, Err(AppError::InvalidPage(_))));
    }

    #[test]
    fn test_empty_sequence_has_page_one() {
        let page = paginate(Vec::<u32>::new(), request(None, None)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next);

        assert!(paginate(Vec::<u32>::new(), request(Some("2"), None)).is_err());
    }

    #[test]
    fn test_size_defaults_and_clamping() {
        assert_eq!(request(None, None).size(), 20);
        assert_eq!(request(None, Some("abc")).size(), 20);
        assert_eq!(request(None, Some("0")).size(), 20);
        assert_eq!(request(None, Some("-5")).size(), 20);
        assert_eq!(request(None, Some("1000")).size(), 200);
        assert_eq!(request(None, Some("7")).size(), 7);
    }

    #[test]
    fn test_bad_page_values() {
        for raw in ["0", "-1", "abc", "1.5"] {
            assert!(matches!(
                PageRequest::from_query(Some(raw), None, &config()),
                Err(AppError::InvalidPage(_))
            ));
        }
    }

    #[test]
    fn test_last_page() {
        let items: Vec<u32> = (0..45).collect();
        let last = paginate(items, request(Some("last"), None)).unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.items.len(), 5);
    }
}

use serde::{Deserialize, Serialize};

use super::{error::TypeError, form::Form};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// `page`/`limit` pair taken from the query string. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn from_form(form: &Form) -> Result<Self, TypeError> {
        let page = form.get_number::<i64>("page")?.unwrap_or(1);
        let limit = form
            .get_number::<i64>("limit")?
            .unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(TypeError::new("`page` must be 1 or greater"));
        }
        // Keeps `page * limit` addressable
        if page > i64::MAX / MAX_PAGE_SIZE {
            return Err(TypeError::new("`page` is out of range"));
        }
        if limit < 1 {
            return Err(TypeError::new("`limit` must be 1 or greater"));
        }

        Ok(Self {
            page,
            limit: limit.min(MAX_PAGE_SIZE),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// `base` is the path the page links point back to.
    pub fn from_rows(rows: Vec<T>, total_rows: i64, request: &PageRequest, base: &str) -> Self {
        let link = |page: i64| format!("{base}?page={page}&limit={}", request.limit);

        let next = (request.page * request.limit < total_rows).then(|| link(request.page + 1));
        let previous = (request.page > 1).then(|| link(request.page - 1));

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_links_forward_only() {
        let request = PageRequest { page: 1, limit: 2 };
        let page = Page::from_rows(vec![1, 2], 5, &request, "/api/recipes/");

        assert_eq!(page.count, 5);
        assert_eq!(page.next.as_deref(), Some("/api/recipes/?page=2&limit=2"));
        assert_eq!(page.previous, None);
    }

    #[test]
    fn last_page_links_backward_only() {
        let request = PageRequest { page: 3, limit: 2 };
        let page = Page::from_rows(vec![5], 5, &request, "/api/recipes/");

        assert_eq!(page.next, None);
        assert_eq!(page.previous.as_deref(), Some("/api/recipes/?page=2&limit=2"));
    }

    #[test]
    fn request_defaults_and_bounds() {
        let form = Form::from_query("").unwrap();
        assert_eq!(PageRequest::from_form(&form).unwrap(), PageRequest::default());

        let form = Form::from_query("page=3&limit=1000").unwrap();
        let request = PageRequest::from_form(&form).unwrap();
        assert_eq!(request.limit, MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 2 * MAX_PAGE_SIZE);

        let form = Form::from_query("page=0").unwrap();
        assert!(PageRequest::from_form(&form).is_err());
    }

    #[test]
    fn huge_pages_are_rejected() {
        let form = Form::from_query("page=9223372036854775807").unwrap();
        let error = PageRequest::from_form(&form).unwrap_err();
        assert_eq!(error.info(), "`page` is out of range");

        let last = i64::MAX / MAX_PAGE_SIZE;
        let form = Form::from_query(&format!("page={last}&limit=1000")).unwrap();
        let request = PageRequest::from_form(&form).unwrap();
        let page = Page::<i32>::from_rows(vec![], 7, &request, "/api/recipes/");
        assert!(request.offset() > 0);
        assert_eq!(page.next, None);
    }

    #[test]
    fn pages_past_the_end_keep_the_count() {
        let request = PageRequest { page: 99, limit: 6 };
        let page = Page::<i32>::from_rows(vec![], 7, &request, "/api/recipes/");

        assert_eq!(page.count, 7);
        assert_eq!(page.next, None);
        assert_eq!(page.previous.as_deref(), Some("/api/recipes/?page=98&limit=6"));
    }

    #[test]
    fn map_keeps_links() {
        let request = PageRequest { page: 1, limit: 1 };
        let page = Page::from_rows(vec![1, 2], 2, &request, "/x/").map(|n| n * 10);

        assert_eq!(page.results, vec![10, 20]);
        assert!(page.next.is_some());
    }
}

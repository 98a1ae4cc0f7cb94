//! Slicing a full result set into board pages.

use serde::Serialize;

/// One page of results plus the navigation numbers the board template needs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
}

/// Slices `items` for the 1-based `page`. An exact multiple of `per_page`
/// yields exactly `len / per_page` pages; an empty set still has one page.
/// Pages past the end come back empty with no `next_page`.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);

    let start = (page - 1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    let items = items.into_iter().skip(start).take(end - start).collect();

    Page {
        items,
        page,
        per_page,
        total_pages,
        prev_page: (page > 1).then(|| page - 1),
        next_page: (page < total_pages).then(|| page + 1),
    }
}

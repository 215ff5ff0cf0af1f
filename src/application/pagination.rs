//! Page-number pagination over ordered listings.
//!
//! The listing surfaces are forgiving by design: any requested page value
//! that does not name a real page is silently corrected rather than
//! rejected, because listing URLs are edited by hand (`?page=999`).

use std::num::NonZeroUsize;

use serde::Serialize;

/// A requested page number, already normalized to be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(usize);

impl PageNumber {
    pub fn first() -> Self {
        Self(1)
    }

    /// Lenient parse of a raw query value.
    ///
    /// Absent, empty, non-numeric, zero, and negative values all fall back
    /// to page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        let number = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value >= 1)
            .unwrap_or(1);
        Self(number)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::first()
    }
}

/// One slice of an ordered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Slice `items` into the requested page.
///
/// Pages partition the input into contiguous, non-overlapping runs of
/// exactly `page_size` items except possibly the last. A request beyond the
/// last page clamps to the last page; `total_pages` is at least 1 even for
/// an empty input. Pure and deterministic over its inputs.
pub fn paginate<T>(items: Vec<T>, page_size: NonZeroUsize, requested: PageNumber) -> Page<T> {
    let total_items = items.len();
    let size = page_size.get();
    let total_pages = total_items.div_ceil(size).max(1);
    let number = requested.get().min(total_pages);

    let items = items
        .into_iter()
        .skip((number - 1) * size)
        .take(size)
        .collect();

    Page {
        items,
        number,
        total_pages,
        total_items,
    }
}

//! Display-index arithmetic for two-page spreads.
//!
//! Display indices are what the reader sees; document indices address decoded pages.
//! The optional blank page after the first page is inserted here and nowhere else.

/// What occupies one display position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageContent {
    /// White page: outside the book or the inserted pad page.
    Blank,
    /// Document page index.
    Page(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BookLayout {
    pub page_count: usize,
    pub pad_after_first: bool,
}

impl BookLayout {
    pub fn new(page_count: usize, pad_after_first: bool) -> Self {
        Self {
            page_count,
            pad_after_first,
        }
    }

    /// Number of display positions, including the pad page.
    pub fn display_count(&self) -> i32 {
        self.page_count as i32 + i32::from(self.pad_after_first && self.page_count > 0)
    }

    pub fn resolve(&self, display: i32) -> PageContent {
        if display < 0 || display >= self.display_count() {
            return PageContent::Blank;
        }
        match (self.pad_after_first, display) {
            (true, 1) => PageContent::Blank,
            (true, d) if d > 1 => PageContent::Page(d as usize - 1),
            (_, d) => PageContent::Page(d as usize),
        }
    }

    /// Largest allowed leading index; keeps leading indices odd so spreads stay paired.
    pub fn max_leading(&self) -> i32 {
        let n = self.display_count();
        n - i32::from(n % 2 == 0)
    }

    pub fn clamp_leading(&self, leading: i32) -> i32 {
        leading.clamp(-1, self.max_leading().max(-1))
    }

    /// Leading index of the spread that shows 1-based display page `number`.
    pub fn leading_for_page_number(&self, number: i32) -> i32 {
        let idx = number.clamp(1, self.display_count().max(1)) - 1;
        if idx % 2 == 0 {
            idx - 1
        } else {
            idx
        }
    }

    pub fn is_first_spread(&self, leading: i32) -> bool {
        leading <= -1
    }

    pub fn is_last_spread(&self, leading: i32) -> bool {
        leading >= self.display_count() - 1
    }
}

//! Navigation controls for page mode and jump mode.

use serde::Serialize;

/// Pages shown either side of the current page.
pub const DEFAULT_RADIUS: u64 = 5;

/// A window of page links around the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub current: u64,
    pub total_pages: u64,
    pub start: u64,
    pub end: u64,
}

impl PageWindow {
    pub fn around(current: u64, total_pages: u64, radius: u64) -> Self {
        let total_pages = total_pages.max(1);
        let current = current.clamp(1, total_pages);
        Self {
            current,
            total_pages,
            start: current.saturating_sub(radius).max(1),
            end: current.saturating_add(radius).min(total_pages),
        }
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    pub fn leading_ellipsis(&self) -> bool {
        self.start > 1
    }

    pub fn trailing_ellipsis(&self) -> bool {
        self.end < self.total_pages
    }

    pub fn pages(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

/// First / previous / next / last targets around a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JumpNav {
    pub current: u64,
    pub total: u64,
    pub first: u64,
    pub prev: u64,
    pub next: u64,
    pub last: u64,
}

impl JumpNav {
    pub fn around(id: u64, total: u64) -> Self {
        Self {
            current: id,
            total,
            first: 1,
            prev: if id > 1 { id - 1 } else { 1 },
            next: if id < total { id + 1 } else { total },
            last: total,
        }
    }

    /// `false` on the last record, which disables the "Next" control.
    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_in_the_middle() {
        let w = PageWindow::around(50, 380, DEFAULT_RADIUS);
        assert_eq!((w.start, w.end), (45, 55));
        assert!(w.has_prev() && w.has_next());
        assert!(w.leading_ellipsis() && w.trailing_ellipsis());
        assert_eq!(w.pages().count(), 11);
    }

    #[test]
    fn test_window_at_edges() {
        let first = PageWindow::around(1, 380, DEFAULT_RADIUS);
        assert_eq!((first.start, first.end), (1, 6));
        assert!(!first.has_prev());
        assert!(!first.leading_ellipsis());

        let last = PageWindow::around(380, 380, DEFAULT_RADIUS);
        assert_eq!((last.start, last.end), (375, 380));
        assert!(!last.has_next());
        assert!(!last.trailing_ellipsis());
    }

    #[test]
    fn test_window_clamps_current() {
        let w = PageWindow::around(999, 3, DEFAULT_RADIUS);
        assert_eq!(w.current, 3);
        assert_eq!((w.start, w.end), (1, 3));
    }

    #[test]
    fn test_jump_nav_last_record_disables_next() {
        let nav = JumpNav::around(37943, 37943);
        assert!(!nav.has_next());
        assert_eq!(nav.next, 37943);
        assert_eq!(nav.prev, 37942);
    }

    #[test]
    fn test_jump_nav_first_record() {
        let nav = JumpNav::around(1, 37943);
        assert!(!nav.has_prev());
        assert_eq!(nav.prev, 1);
        assert_eq!(nav.next, 2);
        assert_eq!(nav.last, 37943);
    }
}

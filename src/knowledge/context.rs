//! Recency-ordered working set of retrieved knowledge, rendered under a
//! fixed character budget.
//!
//! Each merge sorts the pooled items newest first and walks them, joining
//! with [`SEPARATOR`] (which counts toward the budget).  The first item that
//! does not fit is cut to exactly the remaining budget and everything after
//! it is dropped from the working set, so merging again without new items
//! yields the same text.
//!
//! # Example
//! ```rust
//! use tokio::time::{Duration, Instant};
//! use voice_call_agent::knowledge::{ContextWindow, RetrievedItem};
//!
//! let now = Instant::now();
//! let mut window = ContextWindow::new(20);
//! let text = window.merge([
//!     RetrievedItem::new(now, "an older, longer fact"),
//!     RetrievedItem::new(now + Duration::from_secs(5), "newest fact"),
//! ]);
//! assert_eq!(text, "newest fact\n\n---\n\nan");
//! assert_eq!(text.chars().count(), 20);
//! ```

use super::RetrievedItem;

/// Joins rendered items.
pub const SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct ContextWindow {
    items: Vec<RetrievedItem>,
    budget: usize,
}

impl ContextWindow {
    /// `budget` is measured in characters.
    pub fn new(budget: usize) -> Self {
        Self {
            items: Vec::new(),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Surviving items, newest first.
    pub fn items(&self) -> &[RetrievedItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Pool `new` into the working set, apply the budget and return the
    /// rendered text (empty when nothing survives).
    pub fn merge(&mut self, new: impl IntoIterator<Item = RetrievedItem>) -> String {
        self.items.extend(new);
        self.items.retain(|item| !item.text.is_empty());
        // Stable: ties keep their previous relative order.
        self.items
            .sort_by(|a, b| b.retrieved_at.cmp(&a.retrieved_at));

        let separator_len = SEPARATOR.chars().count();
        let mut rendered = String::new();
        let mut used = 0usize;
        let mut kept = 0usize;

        for item in self.items.iter_mut() {
            if kept > 0 {
                if used + separator_len >= self.budget {
                    break;
                }
                rendered.push_str(SEPARATOR);
                used += separator_len;
            }

            let remaining = self.budget - used;
            if remaining == 0 {
                break;
            }
            let len = item.text.chars().count();
            if len <= remaining {
                rendered.push_str(&item.text);
                used += len;
                kept += 1;
            } else {
                item.text = item.text.chars().take(remaining).collect();
                rendered.push_str(&item.text);
                kept += 1;
                break;
            }
        }

        self.items.truncate(kept);
        rendered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, Instant};

    fn at(base: Instant, secs_ago: u64, text: &str) -> RetrievedItem {
        RetrievedItem::new(base - Duration::from_secs(secs_ago), text)
    }

    fn chars(c: char, n: usize) -> String {
        std::iter::repeat(c).take(n).collect()
    }

    #[test]
    fn worked_example_from_budget_rules() {
        let now = Instant::now() + Duration::from_secs(60);
        let mut window = ContextWindow::new(4_000);
        let text = window.merge([
            at(now, 20, &chars('c', 1_000)),
            at(now, 0, &chars('a', 3_000)),
            at(now, 10, &chars('b', 3_000)),
        ]);

        assert_eq!(text.chars().count(), 4_000);
        let expected = format!("{}{}{}", chars('a', 3_000), SEPARATOR, chars('b', 993));
        assert_eq!(text, expected);

        assert_eq!(window.items().len(), 2);
        assert_eq!(window.items()[1].text.len(), 993);

        // Idempotent.
        assert_eq!(window.merge([]), expected);
        assert_eq!(window.items().len(), 2);
    }

    #[test]
    fn newer_items_push_out_older_ones() {
        let now = Instant::now() + Duration::from_secs(60);
        let mut window = ContextWindow::new(30);
        window.merge([at(now, 30, "old old old old old")]);
        let text = window.merge([at(now, 0, "fresh news")]);

        assert_eq!(text, "fresh news\n\n---\n\nold old old o");
        assert!(text.chars().count() <= 30);
    }

    #[test]
    fn everything_fits_under_budget() {
        let now = Instant::now() + Duration::from_secs(60);
        let mut window = ContextWindow::new(100);
        let text = window.merge([at(now, 1, "second"), at(now, 0, "first")]);
        assert_eq!(text, "first\n\n---\n\nsecond");
        assert_eq!(window.items().len(), 2);
    }

    #[test]
    fn no_room_after_separator_drops_the_rest() {
        let now = Instant::now() + Duration::from_secs(60);
        let mut window = ContextWindow::new(8);
        let text = window.merge([at(now, 0, "12345678"), at(now, 1, "x")]);
        assert_eq!(text, "12345678");
        assert_eq!(window.items().len(), 1);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let now = Instant::now();
        let mut window = ContextWindow::new(3);
        let text = window.merge([RetrievedItem::new(now, "héllo")]);
        assert_eq!(text, "hél");
    }

    #[test]
    fn empty_window_renders_empty() {
        let mut window = ContextWindow::new(100);
        assert_eq!(window.merge([]), "");
        assert!(window.is_empty());
    }

    #[test]
    fn empty_texts_are_ignored() {
        let now = Instant::now();
        let mut window = ContextWindow::new(100);
        let text = window.merge([RetrievedItem::new(now, ""), RetrievedItem::new(now, "kept")]);
        assert_eq!(text, "kept");
        assert_eq!(window.items().len(), 1);
    }
}

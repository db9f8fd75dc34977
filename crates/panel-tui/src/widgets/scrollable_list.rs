//! Scrollable, filterable list cursor. Holds indices into the caller's items.

pub struct ScrollableList<T> {
    items: Vec<T>,
    visible: Vec<usize>,
    selected: usize,
    scroll_offset: usize,
    filter: String,
    matches: fn(&T, &str) -> bool,
}

impl<T> ScrollableList<T> {
    pub fn new(matches: fn(&T, &str) -> bool) -> Self {
        Self {
            items: Vec::new(),
            visible: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            filter: String::new(),
            matches,
        }
    }

    /// Replace the items and move the cursor to the first one for which
    /// `keep` holds, if it survives the filter.
    pub fn set_items(&mut self, items: Vec<T>, keep: impl Fn(&T) -> bool) {
        self.items = items;
        self.rebuild();
        self.select_where(keep);
    }

    pub fn set_filter(&mut self, query: &str) {
        let prev = self.visible.get(self.selected).copied();
        self.filter = query.to_string();
        self.rebuild();
        self.selected = prev
            .and_then(|p| self.visible.iter().position(|&i| i == p))
            .unwrap_or(0);
        self.scroll_offset = 0;
    }

    #[cfg(test)]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    fn rebuild(&mut self) {
        let query = self.filter.trim();
        self.visible = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| query.is_empty() || (self.matches)(item, query))
            .map(|(i, _)| i)
            .collect();
        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
    }

    /// Move the cursor to the first visible item matching `pred`.
    pub fn select_where(&mut self, pred: impl Fn(&T) -> bool) -> bool {
        match self.visible.iter().position(|&i| pred(&self.items[i])) {
            Some(pos) => {
                self.selected = pos;
                true
            }
            None => false,
        }
    }

    pub fn select_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn select_down(&mut self, n: usize) {
        self.selected = (self.selected + n).min(self.visible.len().saturating_sub(1));
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.visible.len().saturating_sub(1);
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.items.get(*self.visible.get(self.selected)?)
    }

    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected + 1 - height;
        }
    }

    /// `(is_selected, item)` for the rows that fit in `height`.
    pub fn window(&self, height: usize) -> impl Iterator<Item = (bool, &T)> + '_ {
        self.visible
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(height)
            .map(move |(pos, &i)| (pos == self.selected, &self.items[i]))
    }

    /// Put the cursor on the clicked row. Returns false past the end.
    pub fn click(&mut self, row: usize) -> bool {
        let target = self.scroll_offset + row;
        if target < self.visible.len() {
            self.selected = target;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn total_len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&'static str]) -> ScrollableList<&'static str> {
        let mut l = ScrollableList::new(|s: &&str, q: &str| s.contains(q));
        l.set_items(items.to_vec(), |_| false);
        l
    }

    #[test]
    fn test_filter_keeps_cursor_item() {
        let mut l = list(&["br 01", "br 18", "v 200"]);
        l.select_down(1);
        l.set_filter("br");
        assert_eq!(l.selected_item(), Some(&"br 18"));
        l.set_filter("v");
        assert_eq!(l.selected_item(), Some(&"v 200"));
        assert_eq!(l.len(), 1);
        assert_eq!(l.total_len(), 3);
    }

    #[test]
    fn test_set_items_follows_key() {
        let mut l = list(&["a", "b", "c"]);
        l.select_last();
        l.set_items(vec!["c", "a"], |s| *s == "c");
        assert_eq!(l.selected_item(), Some(&"c"));
    }

    #[test]
    fn test_scroll_window_and_click() {
        let mut l = list(&["a", "b", "c", "d", "e"]);
        l.select_last();
        l.ensure_visible(2);
        let rows: Vec<_> = l.window(2).collect();
        assert_eq!(rows, vec![(false, &"d"), (true, &"e")]);
        assert!(l.click(0));
        assert_eq!(l.selected_item(), Some(&"d"));
        assert!(!l.click(5));
    }
}

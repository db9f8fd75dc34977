//! Paged switch matrix: address ↔ page/group geometry and pair state.
//!
//! Switches are shown `group_size` at a time.  Each group is a pair of
//! buttons, "straight" (red) and "diverging" (green), and exactly one side of
//! a pair is lit at any moment. A pair whose value has not been confirmed by
//! the server since its page came into view is marked unconfirmed.

use panel_proto::config::KeyboardConfig;
use panel_proto::protocol::SwitchStates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Red button, switch value 0.
    Straight,
    /// Green button, switch value 1.
    Diverging,
}

impl Side {
    pub fn value(self) -> u8 {
        match self {
            Self::Straight => 0,
            Self::Diverging => 1,
        }
    }

    /// Any nonzero value is the diverging side.
    pub fn from_value(value: u8) -> Self {
        if value == 0 {
            Self::Straight
        } else {
            Self::Diverging
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Straight => Self::Diverging,
            Self::Diverging => Self::Straight,
        }
    }
}

/// Rendered state of one button pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairState {
    pub active: Side,
    /// False until a snapshot or push has reported this address for the
    /// current page.
    pub confirmed: bool,
}

impl PairState {
    pub fn is_active(&self, side: Side) -> bool {
        self.active == side
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchMatrix {
    group_size: usize,
    total: usize,
    columns: usize,
}

impl SwitchMatrix {
    /// Geometry must already be validated (nonzero, `total % group_size == 0`).
    pub fn new(group_size: usize, total: usize, columns: usize) -> Self {
        Self {
            group_size: group_size.max(1),
            total,
            columns: columns.max(1),
        }
    }

    pub fn from_config(cfg: &KeyboardConfig) -> Self {
        Self::new(cfg.group_size, cfg.total_switches, cfg.columns)
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.group_size.div_ceil(self.columns)
    }

    pub fn page_count(&self) -> usize {
        self.total / self.group_size
    }

    pub fn contains(&self, address: usize) -> bool {
        address < self.total
    }

    pub fn page_of(&self, address: usize) -> usize {
        address / self.group_size
    }

    pub fn group_of(&self, address: usize) -> usize {
        address % self.group_size
    }

    pub fn address(&self, page: usize, group: usize) -> usize {
        page * self.group_size + group
    }

    pub fn page_addresses(&self, page: usize) -> std::ops::Range<usize> {
        let start = page * self.group_size;
        start..(start + self.group_size).min(self.total)
    }

    /// (row, column) of a group inside the page grid.
    pub fn cell(&self, group: usize) -> (usize, usize) {
        (group / self.columns, group % self.columns)
    }

    /// Two pages share a number when groups hold 8: `1a 1b 2a 2b ...`.
    pub fn page_label(&self, page: usize) -> String {
        if self.group_size == 8 {
            let half = if page % 2 == 0 { 'a' } else { 'b' };
            format!("{}{}", page / 2 + 1, half)
        } else {
            (page + 1).to_string()
        }
    }
}

/// Last known value of every switch address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchBoard {
    values: Vec<u8>,
    confirmed: Vec<bool>,
}

impl SwitchBoard {
    pub fn new(total: usize) -> Self {
        Self {
            values: vec![0; total],
            confirmed: vec![false; total],
        }
    }

    /// Replace everything with a snapshot. Missing addresses read as 0.
    pub fn replace(&mut self, states: &SwitchStates) {
        for (address, slot) in self.values.iter_mut().enumerate() {
            *slot = states.get(address);
        }
        self.confirmed.fill(true);
    }

    /// Returns `true` when the stored value or its confirmation changed.
    /// Unknown addresses are ignored.
    pub fn set(&mut self, address: usize, value: u8) -> bool {
        let value = u8::from(value != 0);
        let (Some(slot), Some(confirmed)) = (self.values.get_mut(address), self.confirmed.get_mut(address)) else {
            return false;
        };
        let changed = *slot != value || !*confirmed;
        *slot = value;
        *confirmed = true;
        changed
    }

    /// Values in `addresses` keep showing but count as unconfirmed until the
    /// next snapshot or push.
    pub fn unconfirm(&mut self, addresses: std::ops::Range<usize>) {
        let end = addresses.end.min(self.confirmed.len());
        if let Some(slots) = self.confirmed.get_mut(addresses.start.min(end)..end) {
            slots.fill(false);
        }
    }

    pub fn value(&self, address: usize) -> u8 {
        self.values.get(address).copied().unwrap_or(0)
    }

    pub fn pair(&self, address: usize) -> PairState {
        PairState {
            active: Side::from_value(self.value(address)),
            confirmed: self.confirmed.get(address).copied().unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_eight_per_page() {
        let m = SwitchMatrix::new(8, 64, 4);
        assert_eq!(m.page_count(), 8);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.page_of(13), 1);
        assert_eq!(m.group_of(13), 5);
        assert_eq!(m.address(1, 5), 13);
        assert_eq!(m.page_addresses(7), 56..64);
        assert_eq!(m.cell(5), (1, 1));
        assert!(m.contains(63));
        assert!(!m.contains(64));
    }

    #[test]
    fn test_page_labels() {
        let m = SwitchMatrix::new(8, 64, 4);
        let labels: Vec<_> = (0..4).map(|p| m.page_label(p)).collect();
        assert_eq!(labels, vec!["1a", "1b", "2a", "2b"]);
        assert_eq!(m.page_label(7), "4b");

        let m = SwitchMatrix::new(16, 64, 4);
        assert_eq!(m.page_label(0), "1");
        assert_eq!(m.page_label(3), "4");
    }

    #[test]
    fn test_exactly_one_side_active() {
        let mut board = SwitchBoard::new(16);
        assert_eq!(board.pair(3).active, Side::Straight);
        assert!(board.set(3, 1));
        let pair = board.pair(3);
        assert!(pair.is_active(Side::Diverging));
        assert!(!pair.is_active(Side::Straight));
        assert!(!board.set(3, 7));
        assert!(board.set(3, 0));
        assert!(board.pair(3).is_active(Side::Straight));
    }

    #[test]
    fn test_snapshot_replaces_and_defaults_missing() {
        let mut board = SwitchBoard::new(8);
        board.set(6, 1);
        board.replace(&SwitchStates(vec![1, 0, 1]));
        assert_eq!(board.value(0), 1);
        assert_eq!(board.value(2), 1);
        assert_eq!(board.value(6), 0);
        assert!(!board.set(40, 1));
        assert_eq!(board.value(40), 0);
    }

    #[test]
    fn test_unconfirmed_pair_keeps_one_side_lit() {
        let m = SwitchMatrix::new(8, 64, 4);
        let mut board = SwitchBoard::new(64);
        assert!(!board.pair(9).confirmed);
        board.replace(&SwitchStates(vec![0; 64]));
        board.set(9, 1);
        board.unconfirm(m.page_addresses(1));
        let pair = board.pair(9);
        assert!(!pair.confirmed);
        assert!(pair.is_active(Side::Diverging));
        assert!(!pair.is_active(Side::Straight));
        assert!(board.pair(3).confirmed);
        assert!(board.pair(16).confirmed);

        // A push with the same value still confirms.
        assert!(board.set(9, 1));
        assert!(board.pair(9).confirmed);
        assert!(!board.set(9, 1));

        board.unconfirm(60..80);
        assert!(!board.pair(63).confirmed);
        board.replace(&SwitchStates(vec![]));
        assert!(board.pair(63).confirmed);
        assert!(board.pair(9).is_active(Side::Straight));
    }

    #[test]
    fn test_side_values() {
        assert_eq!(Side::Straight.value(), 0);
        assert_eq!(Side::Diverging.value(), 1);
        assert_eq!(Side::from_value(2), Side::Diverging);
        assert_eq!(Side::Straight.opposite(), Side::Diverging);
    }
}

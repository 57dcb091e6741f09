//! FILENAME: core/spreadsheet-engine/src/selection.rs
//! Multi-cell selection, keyed by cell identity (row/column headers).

use crate::cell::{CellInfo, Header};

type CellKey = (Option<Header>, Option<Header>);

#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    /// Selected cells in selection order.
    selected: Vec<CellInfo>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &CellKey) -> Option<usize> {
        self.selected.iter().position(|cell| &cell.key() == key)
    }

    pub fn is_selected(&self, cell: &CellInfo) -> bool {
        self.position(&cell.key()).is_some()
    }

    /// Returns true if the cell is selected afterwards.
    pub fn toggle(&mut self, cell: &CellInfo) -> bool {
        match self.position(&cell.key()) {
            Some(index) => {
                self.selected.remove(index);
                false
            }
            None => {
                self.selected.push(cell.clone());
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn selected_cells(&self) -> &[CellInfo] {
        &self.selected
    }

    /// Empties the selection, returning what was selected.
    pub fn clear(&mut self) -> Vec<CellInfo> {
        std::mem::take(&mut self.selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::header_from;

    #[test]
    fn test_toggle_by_identity() {
        let mut selection = SelectionManager::new();
        let cell = CellInfo::new(Some(header_from(&["x86"])), Some(header_from(&["4.4"])), "1 / 2");
        let mut same = cell.clone();
        same.contents = "changed".into();

        assert!(selection.toggle(&cell));
        assert!(selection.is_selected(&same));
        assert!(!selection.toggle(&same));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_clear_returns_previous() {
        let mut selection = SelectionManager::new();
        selection.toggle(&CellInfo::new(Some(header_from(&["a"])), None, "a"));
        selection.toggle(&CellInfo::new(None, Some(header_from(&["b"])), "b"));
        assert_eq!(selection.clear().len(), 2);
        assert_eq!(selection.len(), 0);
    }
}

use std::collections::HashSet;
use tracing::trace;

/// Multi-row selection with a distinguished primary row.
///
/// The same type backs both the main selection and the pinned reference
/// selection used for example-to-example comparison.
#[derive(Debug, Default)]
pub struct SelectionService {
    selected_ids: Vec<String>,
    primary_selected_id: Option<String>,
    shift_anchor_id: Option<String>,
    shift_end_id: Option<String>,
    revision: u64,
}

impl SelectionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected_ids
    }

    pub fn primary_selected_id(&self) -> Option<&str> {
        self.primary_selected_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected_ids.len()
    }

    /// Endpoints of the last shift-extended range, anchor first.
    pub fn shift_selection_endpoints(&self) -> (Option<&str>, Option<&str>) {
        (self.shift_anchor_id.as_deref(), self.shift_end_id.as_deref())
    }

    /// Replaces the selection. The primary survives if it is still selected,
    /// otherwise the first id becomes primary.
    pub fn select_ids(&mut self, ids: Vec<String>) {
        let primary = self
            .primary_selected_id
            .clone()
            .filter(|p| ids.contains(p))
            .or_else(|| ids.first().cloned());
        self.select_ids_with_primary(ids, primary);
    }

    pub fn select_ids_with_primary(&mut self, ids: Vec<String>, primary: Option<String>) {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        let primary = primary.filter(|p| ids.contains(p));
        if ids == self.selected_ids && primary == self.primary_selected_id {
            return;
        }
        trace!("Select {} ids, primary {:?}", ids.len(), primary);
        self.selected_ids = ids;
        self.primary_selected_id = primary;
        self.revision += 1;
    }

    /// Makes `id` the primary selection, adding it to the selection if needed.
    pub fn set_primary_selection(&mut self, id: Option<String>) {
        let Some(id) = id else {
            if self.primary_selected_id.take().is_some() {
                self.revision += 1;
            }
            return;
        };
        let mut ids = self.selected_ids.clone();
        if !ids.contains(&id) {
            ids.push(id.clone());
        }
        self.select_ids_with_primary(ids, Some(id));
    }

    pub fn set_shift_range(&mut self, anchor: Option<String>, end: Option<String>) {
        self.shift_anchor_id = anchor;
        self.shift_end_id = end;
    }

    pub fn clear(&mut self) {
        self.shift_anchor_id = None;
        self.shift_end_id = None;
        self.select_ids_with_primary(Vec::new(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn primary_defaults_to_first_selected() {
        let mut selection = SelectionService::new();
        selection.select_ids(ids(&["b", "a"]));
        assert_eq!(selection.primary_selected_id(), Some("b"));

        selection.select_ids(ids(&["a", "b", "c"]));
        assert_eq!(selection.primary_selected_id(), Some("b"));

        selection.select_ids(ids(&["c"]));
        assert_eq!(selection.primary_selected_id(), Some("c"));
    }

    #[test]
    fn duplicate_ids_are_collapsed() {
        let mut selection = SelectionService::new();
        selection.select_ids(ids(&["a", "a", "b"]));
        assert_eq!(selection.selected_ids(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn revision_moves_only_on_change() {
        let mut selection = SelectionService::new();
        selection.select_ids(ids(&["a"]));
        let rev = selection.revision();
        selection.select_ids(ids(&["a"]));
        assert_eq!(selection.revision(), rev);
        selection.set_primary_selection(Some("b".to_string()));
        assert!(selection.revision() > rev);
        assert_eq!(selection.selected_ids(), ids(&["a", "b"]).as_slice());
        assert_eq!(selection.primary_selected_id(), Some("b"));
    }

    #[test]
    fn clear_drops_everything() {
        let mut selection = SelectionService::new();
        selection.select_ids(ids(&["a", "b"]));
        selection.set_shift_range(Some("a".to_string()), Some("b".to_string()));
        selection.clear();
        assert!(selection.is_empty());
        assert_eq!(selection.primary_selected_id(), None);
        assert_eq!(selection.shift_selection_endpoints(), (None, None));
    }
}

//! The data table module: view-model glue between the shared services and
//! the position-based [`DataTable`] widget.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, trace};

use super::cells::{TableEntry, format_cell};
use super::columns::{ColumnHeader, build_headers, default_visibility};
use super::index_map::{PositionIndex, id_at, ids_at, index_positions, position_of, positions_of};
use super::widget::{DataTable, Highlights, TableEvent};
use crate::derived::Memo;
use crate::domain::TVConfig;
use crate::services::{
    DataService, FocusService, STARRED_SLICE_NAME, SelectionService, Shared, SliceService,
};
use crate::state::AppState;
use crate::types::FieldSpec;

/// Handles to the shared state the module reads and mutates.
#[derive(Clone)]
pub struct TableServices {
    pub app_state: Shared<AppState>,
    pub selection: Shared<SelectionService>,
    /// Pinned example used as the comparison reference.
    pub reference_selection: Shared<SelectionService>,
    pub focus: Shared<FocusService>,
    pub slices: Shared<SliceService>,
    pub data: Shared<DataService>,
}

/// Global search box state. Typing only marks the box as edited; the
/// applied text changes on commit.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchState {
    pub input: String,
    pub applied: String,
    pub edited: bool,
}

type VisibilityKey = (u64, u64, u64);
type HeadersKey = (u64, u64);
type RowsKey = (u64, bool, u64, bool);
type TableDataKey = (usize, usize, u64, u64, usize);
type HighlightsKey = (usize, u64, u64, u64, u64);

pub struct DataTableModule {
    services: TableServices,
    config: TVConfig,
    only_selected: bool,
    only_generated: bool,
    column_visibility: BTreeMap<String, bool>,
    visibility_key: Option<VisibilityKey>,
    visibility_revision: u64,
    headers: Memo<HeadersKey, Vec<ColumnHeader>>,
    sorted_ids: Memo<RowsKey, Vec<String>>,
    position_index: Memo<usize, PositionIndex>,
    highlights: Memo<HighlightsKey, Highlights>,
    table_data_key: Option<TableDataKey>,
    search: SearchState,
    search_revision: usize,
    table: DataTable,
}

impl DataTableModule {
    pub fn new(services: TableServices, config: &TVConfig) -> Self {
        let mut module = Self {
            services,
            config: config.clone(),
            only_selected: false,
            only_generated: false,
            column_visibility: BTreeMap::new(),
            visibility_key: None,
            visibility_revision: 0,
            headers: Memo::new(),
            sorted_ids: Memo::new(),
            position_index: Memo::new(),
            highlights: Memo::new(),
            table_data_key: None,
            search: SearchState::default(),
            search_revision: 0,
            table: DataTable::new(),
        };
        module.sync();
        module
    }

    // -------------------- Derived state ---------------------- //

    /// Brings every derived value up to date with the shared services and
    /// pushes changes into the widget. Cheap when nothing changed.
    pub fn sync(&mut self) {
        self.sync_column_visibility();

        let headers_key = {
            let state = self.services.app_state.borrow();
            let data = self.services.data.borrow();
            (state.rows_revision(), data.columns_revision())
        };
        {
            let state = self.services.app_state.borrow();
            let data = self.services.data.borrow();
            self.headers
                .get_or_compute(headers_key, || build_headers(state.spec(), data.cols()));
        }

        let rows_key = self.rows_key();
        {
            let state = self.services.app_state.borrow();
            let selection = self.services.selection.borrow();
            let (only_selected, only_generated) = (self.only_selected, self.only_generated);
            self.sorted_ids.get_or_compute(rows_key, || {
                filtered_sorted_ids(&state, &selection, only_selected, only_generated)
            });
        }

        let data_key = (
            self.sorted_ids.recomputations(),
            self.headers.recomputations(),
            self.visibility_revision,
            self.services.data.borrow().values_revision(),
            self.search_revision,
        );
        if self.table_data_key != Some(data_key) {
            self.push_table_data();
            self.table.set_global_search(&self.search.applied);
            self.table_data_key = Some(data_key);
        }

        let order_key = self.sorted_ids.recomputations();
        let highlights_key = {
            let services = &self.services;
            (
                order_key,
                services.selection.borrow().revision(),
                services.reference_selection.borrow().revision(),
                services.slices.borrow().revision(),
                services.focus.borrow().revision(),
            )
        };
        let before = self.highlights.recomputations();
        {
            let order = self.sorted_ids.cached().map(Vec::as_slice).unwrap_or_default();
            let index = self
                .position_index
                .get_or_compute(order_key, || index_positions(order));
            let services = &self.services;
            self.highlights
                .get_or_compute(highlights_key, || build_highlights(index, services));
        }
        if self.highlights.recomputations() != before
            && let Some(highlights) = self.highlights.cached()
        {
            self.table.set_highlights(highlights.clone());
        }
    }

    fn rows_key(&self) -> RowsKey {
        let state = self.services.app_state.borrow();
        let selection_rev = if self.only_selected {
            self.services.selection.borrow().revision()
        } else {
            0
        };
        (
            state.rows_revision(),
            self.only_selected,
            selection_rev,
            self.only_generated,
        )
    }

    /// Rebuilds the visibility map from scratch whenever the dataset, the
    /// model set or the derived column list changes. Earlier toggles are dropped.
    fn sync_column_visibility(&mut self) {
        let key = {
            let state = self.services.app_state.borrow();
            let data = self.services.data.borrow();
            (
                state.rows_revision(),
                state.models_revision(),
                data.columns_revision(),
            )
        };
        if self.visibility_key == Some(key) {
            return;
        }
        let state = self.services.app_state.borrow();
        let data = self.services.data.borrow();
        self.column_visibility = default_visibility(state.spec(), data.cols());
        self.visibility_key = Some(key);
        self.visibility_revision += 1;
        debug!(
            "Column visibility reset for {} ({} columns)",
            state.current_dataset(),
            self.column_visibility.len()
        );
    }

    fn push_table_data(&mut self) {
        let headers: Vec<ColumnHeader> = self
            .all_headers()
            .iter()
            .filter(|h| self.column_visibility.get(&h.name).copied().unwrap_or(false))
            .cloned()
            .collect();

        let rows: Vec<Vec<TableEntry>> = {
            let state = self.services.app_state.borrow();
            let data = self.services.data.borrow();
            let specs: HashMap<&str, &FieldSpec> = state
                .spec()
                .iter()
                .chain(data.cols().iter().map(|c| (c.name.as_str(), &c.spec)))
                .collect();

            let rows: Vec<Vec<TableEntry>> = self
                .order()
                .iter()
                .map(|id| {
                    let Some(input) = state.get_input(id) else {
                        return vec![TableEntry::Value(String::new()); headers.len()];
                    };
                    headers
                        .iter()
                        .map(|h| {
                            if h.is_synthetic() {
                                let idx = state.index_of(id).map(|i| i.to_string());
                                return TableEntry::Value(idx.unwrap_or_default());
                            }
                            let spec = specs.get(h.name.as_str()).copied();
                            match input.data.get(&h.name).or_else(|| data.get_val(id, &h.name)) {
                                Some(value) => format_cell(value, spec, self.config.limit_words),
                                None => TableEntry::Value(String::new()),
                            }
                        })
                        .collect()
                })
                .collect();
            rows
        };
        trace!("Pushing {} rows x {} columns to table", rows.len(), headers.len());
        self.table.set_data(headers, rows);
    }

    /// Current row ids in module order.
    pub fn order(&self) -> &[String] {
        self.sorted_ids.cached().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn all_headers(&self) -> &[ColumnHeader] {
        self.headers.cached().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn row_recomputations(&self) -> usize {
        self.sorted_ids.recomputations()
    }

    pub fn highlight_recomputations(&self) -> usize {
        self.highlights.recomputations()
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut DataTable {
        &mut self.table
    }

    pub fn services(&self) -> &TableServices {
        &self.services
    }

    // -------------------- Toggles ---------------------- //

    pub fn only_selected(&self) -> bool {
        self.only_selected
    }

    pub fn only_generated(&self) -> bool {
        self.only_generated
    }

    pub fn set_only_selected(&mut self, on: bool) {
        self.only_selected = on;
        self.sync();
    }

    pub fn set_only_generated(&mut self, on: bool) {
        self.only_generated = on;
        self.sync();
    }

    // -------------------- Column visibility ---------------------- //

    pub fn column_visibility(&self) -> &BTreeMap<String, bool> {
        &self.column_visibility
    }

    /// Non-synthetic columns with their visibility, in header order.
    pub fn column_choices(&self) -> Vec<(String, bool)> {
        self.all_headers()
            .iter()
            .filter(|h| !h.is_synthetic())
            .map(|h| {
                let visible = self.column_visibility.get(&h.name).copied().unwrap_or(false);
                (h.name.clone(), visible)
            })
            .collect()
    }

    pub fn toggle_column(&mut self, name: &str) {
        let Some(visible) = self.column_visibility.get(name).map(|v| !v) else {
            return;
        };
        self.column_visibility.insert(name.to_string(), visible);
        self.visibility_revision += 1;
        debug!("Column {name} visible: {visible}");
        self.sync();
    }

    // -------------------- Search ---------------------- //

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    /// Records a keystroke's result without touching the applied search.
    pub fn edit_search(&mut self, input: &str) {
        self.search.input = input.to_string();
        self.search.edited = true;
    }

    /// Drops uncommitted edits, restoring the input to the applied text.
    pub fn cancel_search(&mut self) {
        self.search.input = self.search.applied.clone();
        self.search.edited = false;
    }

    pub fn commit_search(&mut self) {
        self.search.applied = self.search.input.clone();
        self.search.edited = false;
        self.search_revision += 1;
        info!("Applied search \"{}\"", self.search.applied);
        self.sync();
    }

    /// Clears the applied search and the widget's own sort, filters and paging.
    pub fn reset_view(&mut self) {
        self.search = SearchState::default();
        self.search_revision += 1;
        self.table.reset_view();
        self.sync();
    }

    pub fn filter_current_column(&mut self, term: &str) {
        if let Some(column) = self.table.current_column().map(|c| c.name.clone()) {
            self.table.set_column_filter(&column, term);
        }
    }

    pub fn sort_current_column(&mut self, ascending: bool) {
        if let Some(column) = self.table.current_column().map(|c| c.name.clone()) {
            self.table.sort_by_column(&column, ascending);
        }
    }

    /// Replaces the selection with whatever the widget currently shows.
    pub fn select_filtered(&mut self) {
        let ids = ids_at(self.order(), &self.table.visible_row_indices());
        info!("Selecting {} filtered rows", ids.len());
        self.services.selection.borrow_mut().select_ids(ids);
        self.sync();
    }

    // -------------------- Row actions ---------------------- //

    /// Pins `id` as the comparison reference, or unpins it if it already is.
    pub fn toggle_pin(&mut self, id: &str) {
        {
            let mut state = self.services.app_state.borrow_mut();
            let mut reference = self.services.reference_selection.borrow_mut();
            if reference.primary_selected_id() == Some(id) {
                state.set_compare_examples(false);
                reference.clear();
                debug!("Unpinned {id}");
            } else {
                state.set_compare_examples(true);
                reference.select_ids_with_primary(vec![id.to_string()], Some(id.to_string()));
                debug!("Pinned {id}");
            }
        }
        self.sync();
    }

    /// Adds `id` to the starred slice, or removes it if already starred.
    pub fn toggle_star(&mut self, id: &str) {
        {
            let mut slices = self.services.slices.borrow_mut();
            let ids = [id.to_string()];
            if slices.is_in_slice(id, STARRED_SLICE_NAME) {
                slices.remove_ids_from_slice(STARRED_SLICE_NAME, &ids);
            } else {
                slices.add_ids_to_slice(STARRED_SLICE_NAME, &ids);
            }
        }
        self.sync();
    }

    pub fn cursor_id(&self) -> Option<String> {
        self.table
            .cursor_position()
            .and_then(|p| id_at(self.order(), p))
            .map(String::from)
    }

    pub fn pin_current(&mut self) {
        if let Some(id) = self.cursor_id() {
            self.toggle_pin(&id);
        }
    }

    pub fn star_current(&mut self) {
        if let Some(id) = self.cursor_id() {
            self.toggle_star(&id);
        }
    }

    // -------------------- Widget events ---------------------- //

    /// Translates widget events into service calls. Returns a URL when a link
    /// cell was activated.
    pub fn handle_table_events(&mut self, events: Vec<TableEvent>) -> Option<String> {
        let mut link = None;
        for event in events {
            trace!("Table event {event:?}");
            match event {
                TableEvent::Select(positions) => {
                    let ids = ids_at(self.order(), &positions);
                    let anchor = self
                        .table
                        .shift_anchor()
                        .and_then(|p| id_at(self.order(), p))
                        .map(String::from);
                    let end = self.cursor_id();
                    let mut selection = self.services.selection.borrow_mut();
                    selection.select_ids(ids);
                    selection.set_shift_range(anchor, end);
                }
                TableEvent::PrimarySelect(position) => {
                    let id = position
                        .and_then(|p| id_at(self.order(), p))
                        .map(String::from);
                    if position.is_none() || id.is_some() {
                        self.services
                            .selection
                            .borrow_mut()
                            .set_primary_selection(id);
                    }
                }
                TableEvent::Hover(position) => {
                    let id = position.and_then(|p| id_at(self.order(), p));
                    let mut focus = self.services.focus.borrow_mut();
                    match id {
                        Some(id) => {
                            let sub_field = self
                                .table
                                .current_column()
                                .filter(|c| !c.is_synthetic())
                                .map(|c| c.name.clone());
                            focus.set_focus(id, sub_field);
                        }
                        None => focus.clear_focus(),
                    }
                }
                TableEvent::LinkActivated { url, .. } => link = Some(url),
            }
        }
        self.sync();
        link
    }
}

/// Positions of everything the services want highlighted in the current order.
fn build_highlights(index: &PositionIndex, services: &TableServices) -> Highlights {
    let selection = services.selection.borrow();
    let reference = services.reference_selection.borrow();
    let slices = services.slices.borrow();
    let focus = services.focus.borrow();
    let starred = slices
        .get_slice_by_name(STARRED_SLICE_NAME)
        .unwrap_or_default();

    Highlights {
        selected: positions_of(index, selection.selected_ids().iter().map(String::as_str)),
        primary: selection
            .primary_selected_id()
            .and_then(|id| position_of(index, id)),
        reference: reference
            .primary_selected_id()
            .and_then(|id| position_of(index, id)),
        starred: positions_of(index, starred.iter().map(String::as_str)),
        focused: focus.focused_id().and_then(|id| position_of(index, id)),
        anchor: selection
            .shift_selection_endpoints()
            .0
            .and_then(|id| position_of(index, id)),
    }
}

/// Rows after the only-selected and only-generated filters, ordered so every
/// example follows its ancestors.
pub fn filtered_sorted_ids(
    state: &AppState,
    selection: &SelectionService,
    only_selected: bool,
    only_generated: bool,
) -> Vec<String> {
    let mut ids: Vec<&str> = if only_selected {
        selection
            .selected_ids()
            .iter()
            .filter(|id| state.index_of(id).is_some())
            .map(String::as_str)
            .collect()
    } else {
        state.current_inputs().iter().map(|i| i.id.as_str()).collect()
    };
    if only_generated {
        ids.retain(|id| state.is_added(id));
    }
    ids.sort_by_cached_key(|id| ancestry_sort_key(state, id));
    ids.into_iter().map(String::from).collect()
}

/// Dataset indices of the lineage of `id`, oldest ancestor first.
pub fn ancestry_sort_key(state: &AppState, id: &str) -> Vec<usize> {
    let mut key: Vec<usize> = state
        .ancestry(id)
        .iter()
        .filter_map(|a| state.index_of(a))
        .collect();
    key.reverse();
    key
}

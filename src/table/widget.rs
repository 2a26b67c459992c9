//! Generic sortable, filterable table widget.
//!
//! The widget knows nothing about example ids. Rows arrive in the order the
//! owner wants them shown by default and are addressed by their position in
//! that order ("module positions"). Sorting and filtering only change which
//! positions are displayed and in what order; every event reports module
//! positions, never display positions.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::trace;

use super::cells::TableEntry;
use super::columns::ColumnHeader;

/// Events emitted towards the owner of the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    Select(Vec<usize>),
    PrimarySelect(Option<usize>),
    Hover(Option<usize>),
    LinkActivated {
        row: usize,
        column: String,
        url: String,
    },
}

/// Module positions the owner wants highlighted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlights {
    pub selected: Vec<usize>,
    pub primary: Option<usize>,
    pub reference: Option<usize>,
    pub starred: Vec<usize>,
    pub focused: Option<usize>,
    /// Where the owner's shift range starts.
    pub anchor: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMarks {
    pub selected: bool,
    pub primary: bool,
    pub reference: bool,
    pub starred: bool,
    pub focused: bool,
}

#[derive(Debug, Default)]
pub struct DataTable {
    columns: Vec<ColumnHeader>,
    rows: Vec<Vec<TableEntry>>,
    content_widths: Vec<usize>,
    highlights: Highlights,
    sort: Option<(String, bool)>,
    column_filters: BTreeMap<String, String>,
    global_search: String,
    display: Vec<usize>, // Module positions in display order
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    offset_column: usize,
    shift_anchor: Option<usize>,
    height: usize,
    width: usize,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------- Inputs from the owner ---------------------- //

    pub fn set_data(&mut self, columns: Vec<ColumnHeader>, rows: Vec<Vec<TableEntry>>) {
        self.content_widths = columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                rows.iter()
                    .filter_map(|r| r.get(cidx))
                    .map(|e| e.display().chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(column.name.chars().count())
            })
            .collect();
        // Filters and sort on columns that disappeared no longer apply.
        self.column_filters
            .retain(|name, _| columns.iter().any(|c| &c.name == name));
        if let Some((name, _)) = &self.sort
            && !columns.iter().any(|c| &c.name == name)
        {
            self.sort = None;
        }
        self.columns = columns;
        self.rows = rows;
        self.curser_column = self.curser_column.min(self.columns.len().saturating_sub(1));
        self.offset_column = self.offset_column.min(self.curser_column);
        self.rebuild_display();
    }

    pub fn set_highlights(&mut self, highlights: Highlights) {
        if highlights.selected.is_empty() {
            self.shift_anchor = None;
        } else if highlights.anchor.is_some() {
            self.shift_anchor = highlights.anchor;
        }
        self.highlights = highlights;
    }

    pub fn set_global_search(&mut self, text: &str) {
        if self.global_search != text {
            self.global_search = text.to_string();
            self.rebuild_display();
        }
    }

    pub fn set_column_filter(&mut self, column: &str, term: &str) {
        if term.is_empty() {
            self.column_filters.remove(column);
        } else {
            self.column_filters
                .insert(column.to_string(), term.to_string());
        }
        self.rebuild_display();
    }

    pub fn sort_by_column(&mut self, column: &str, ascending: bool) {
        self.sort = Some((column.to_string(), ascending));
        self.rebuild_display();
    }

    /// Clears the widget's own sort, filters and pagination.
    pub fn reset_view(&mut self) {
        self.sort = None;
        self.column_filters.clear();
        self.curser_row = 0;
        self.offset_row = 0;
        self.curser_column = 0;
        self.offset_column = 0;
        self.shift_anchor = None;
        self.rebuild_display();
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.clamp_cursor();
    }

    // -------------------- Queries ---------------------- //

    /// Module positions of the rows that pass the internal filters, in display order.
    pub fn visible_row_indices(&self) -> Vec<usize> {
        self.display.clone()
    }

    /// True when neither a sort nor a column filter is active.
    pub fn is_default_view(&self) -> bool {
        self.sort.is_none() && self.column_filters.is_empty()
    }

    pub fn sort(&self) -> Option<(&str, bool)> {
        self.sort.as_ref().map(|(c, asc)| (c.as_str(), *asc))
    }

    pub fn column_filters(&self) -> &BTreeMap<String, String> {
        &self.column_filters
    }

    pub fn columns(&self) -> &[ColumnHeader] {
        &self.columns
    }

    pub fn current_column(&self) -> Option<&ColumnHeader> {
        self.columns.get(self.curser_column)
    }

    pub fn current_column_idx(&self) -> usize {
        self.curser_column
    }

    /// Module position under the cursor.
    pub fn cursor_position(&self) -> Option<usize> {
        self.display.get(self.offset_row + self.curser_row).copied()
    }

    pub fn cursor_display_row(&self) -> usize {
        self.offset_row + self.curser_row
    }

    pub fn cell(&self, position: usize, column: usize) -> Option<&TableEntry> {
        self.rows.get(position).and_then(|r| r.get(column))
    }

    pub fn marks(&self, position: usize) -> RowMarks {
        let h = &self.highlights;
        RowMarks {
            selected: h.selected.contains(&position),
            primary: h.primary == Some(position),
            reference: h.reference == Some(position),
            starred: h.starred.contains(&position),
            focused: h.focused == Some(position),
        }
    }

    /// Module positions of the rows inside the viewport.
    pub fn window(&self) -> &[usize] {
        let begin = self.offset_row.min(self.display.len());
        let end = (begin + self.height.max(1)).min(self.display.len());
        &self.display[begin..end]
    }

    /// Columns that fit the viewport, starting at the column offset, with their render widths.
    pub fn visible_columns(&self, max_column_width: usize) -> Vec<(usize, usize)> {
        let mut visible = Vec::new();
        let mut used = 0;
        for cidx in self.offset_column..self.columns.len() {
            let natural = self.content_widths.get(cidx).copied().unwrap_or(0) + 1;
            let width = self.columns[cidx].render_width(natural, max_column_width);
            if used + width + 1 > self.width && !visible.is_empty() {
                break;
            }
            visible.push((cidx, width));
            used += width + 1;
        }
        visible
    }

    // -------------------- Navigation ---------------------- //

    pub fn move_up(&mut self, size: usize) -> Option<TableEvent> {
        let target = self.cursor_display_row().saturating_sub(size);
        self.move_to(target)
    }

    pub fn move_down(&mut self, size: usize) -> Option<TableEvent> {
        let target = self.cursor_display_row() + size;
        self.move_to(target)
    }

    pub fn move_beginning(&mut self) -> Option<TableEvent> {
        self.move_to(0)
    }

    pub fn move_end(&mut self) -> Option<TableEvent> {
        self.move_to(self.display.len().saturating_sub(1))
    }

    pub fn move_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
        }
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
    }

    pub fn move_right(&mut self, max_column_width: usize) {
        if self.curser_column + 1 >= self.columns.len() {
            return;
        }
        self.curser_column += 1;
        while self.offset_column < self.curser_column
            && !self
                .visible_columns(max_column_width)
                .iter()
                .any(|(c, _)| *c == self.curser_column)
        {
            self.offset_column += 1;
        }
    }

    /// Moves the cursor to a display row and reports the newly hovered row.
    fn move_to(&mut self, display_row: usize) -> Option<TableEvent> {
        if self.display.is_empty() {
            return None;
        }
        let before = self.cursor_position();
        let target = display_row.min(self.display.len() - 1);
        let height = self.height.max(1);
        if target < self.offset_row {
            self.offset_row = target;
        } else if target >= self.offset_row + height {
            self.offset_row = target + 1 - height;
        }
        self.curser_row = target - self.offset_row;
        let after = self.cursor_position();
        (after != before).then_some(TableEvent::Hover(after))
    }

    fn clamp_cursor(&mut self) {
        let height = self.height.max(1);
        let last = self.display.len().saturating_sub(1);
        let target = self.cursor_display_row().min(last);
        if self.offset_row > target {
            self.offset_row = target;
        }
        if target >= self.offset_row + height {
            self.offset_row = target + 1 - height;
        }
        self.curser_row = target - self.offset_row;
    }

    // -------------------- Selection gestures ---------------------- //

    /// Selects only the row under the cursor and makes it primary.
    pub fn select_current(&mut self) -> Vec<TableEvent> {
        let Some(position) = self.cursor_position() else {
            return Vec::new();
        };
        self.shift_anchor = Some(position);
        vec![
            TableEvent::Select(vec![position]),
            TableEvent::PrimarySelect(Some(position)),
        ]
    }

    /// Adds or removes the row under the cursor from the selection.
    pub fn toggle_current(&mut self) -> Option<TableEvent> {
        let position = self.cursor_position()?;
        let mut selected = self.highlights.selected.clone();
        if let Some(idx) = selected.iter().position(|&p| p == position) {
            selected.remove(idx);
        } else {
            selected.push(position);
        }
        self.shift_anchor = Some(position);
        Some(TableEvent::Select(selected))
    }

    /// Moves the cursor and selects every displayed row between the anchor and it.
    pub fn extend_selection(&mut self, step: isize) -> Option<TableEvent> {
        let start = self.cursor_position()?;
        let anchor = *self.shift_anchor.get_or_insert(start);
        let current = self.cursor_display_row();
        let target = current.saturating_add_signed(step);
        self.move_to(target);

        let anchor_row = self.display.iter().position(|&p| p == anchor)?;
        let cursor_row = self.cursor_display_row();
        let (lo, hi) = if anchor_row <= cursor_row {
            (anchor_row, cursor_row)
        } else {
            (cursor_row, anchor_row)
        };
        Some(TableEvent::Select(self.display[lo..=hi].to_vec()))
    }

    pub fn shift_anchor(&self) -> Option<usize> {
        self.shift_anchor
    }

    /// Activates a link in the current cell. Link cells never select the row.
    pub fn activate_link(&self) -> Option<TableEvent> {
        let position = self.cursor_position()?;
        let entry = self.cell(position, self.curser_column)?;
        let url = entry.link()?;
        Some(TableEvent::LinkActivated {
            row: position,
            column: self.current_column()?.name.clone(),
            url: url.to_string(),
        })
    }

    // -------------------- Filtering and sorting ---------------------- //

    fn column_idx(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn rebuild_display(&mut self) {
        let needle = self.global_search.to_lowercase();
        let filters: Vec<(usize, String)> = self
            .column_filters
            .iter()
            .filter_map(|(name, term)| self.column_idx(name).map(|c| (c, term.to_lowercase())))
            .collect();

        let mut shown: Vec<usize> = (0..self.rows.len())
            .filter(|&ridx| {
                let row = &self.rows[ridx];
                let global_match = needle.is_empty() || row.iter().any(|e| matches(e, &needle));
                global_match
                    && filters
                        .iter()
                        .all(|(cidx, term)| row.get(*cidx).is_some_and(|e| matches(e, term)))
            })
            .collect();

        if let Some((name, ascending)) = &self.sort
            && let Some(cidx) = self.column_idx(name)
        {
            let rows = &self.rows;
            let key = |ridx: usize| rows[ridx].get(cidx).map(TableEntry::sort_value).unwrap_or("");
            shown.sort_by(|&a, &b| {
                let ord = compare_sort_values(key(a), key(b));
                if *ascending { ord } else { ord.reverse() }
            });
        }

        trace!(
            "Table display rebuilt: {} of {} rows, sort {:?}, {} column filters",
            shown.len(),
            self.rows.len(),
            self.sort,
            self.column_filters.len()
        );
        self.display = shown;
        self.clamp_cursor();
    }
}

fn matches(entry: &TableEntry, needle: &str) -> bool {
    entry.display().to_lowercase().contains(needle)
        || entry.sort_value().to_lowercase().contains(needle)
}

/// Numbers compare numerically and sort before anything that does not parse.
fn compare_sort_values(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(name: &str) -> ColumnHeader {
        ColumnHeader {
            name: name.to_string(),
            field_type: None,
            min_width: None,
            max_width: None,
            width: None,
            vocab: None,
            synthetic: false,
        }
    }

    fn table() -> DataTable {
        let rows = vec![
            vec![TableEntry::Value("b".into()), TableEntry::Value("10".into())],
            vec![TableEntry::Value("a".into()), TableEntry::Value("9".into())],
            vec![TableEntry::Value("c".into()), TableEntry::Value("n/a".into())],
        ];
        let mut table = DataTable::new();
        table.resize(80, 10);
        table.set_data(vec![header("name"), header("score")], rows);
        table
    }

    #[test]
    fn numeric_sort_puts_numbers_first_and_keeps_positions() {
        let mut table = table();
        table.sort_by_column("score", true);
        assert_eq!(table.visible_row_indices(), vec![1, 0, 2]);
        assert!(!table.is_default_view());
        table.sort_by_column("score", false);
        assert_eq!(table.visible_row_indices(), vec![2, 0, 1]);
    }

    #[test]
    fn filters_combine_and_reset() {
        let mut table = table();
        table.set_global_search("A");
        assert_eq!(table.visible_row_indices(), vec![1, 2]);
        table.set_column_filter("name", "c");
        assert_eq!(table.visible_row_indices(), vec![2]);
        table.reset_view();
        assert!(table.is_default_view());
        // The global search belongs to the owner and survives a reset.
        assert_eq!(table.visible_row_indices(), vec![1, 2]);
    }

    #[test]
    fn selection_events_use_module_positions() {
        let mut table = table();
        table.sort_by_column("name", true);
        assert_eq!(table.move_beginning(), None);
        assert_eq!(
            table.select_current(),
            vec![TableEvent::Select(vec![1]), TableEvent::PrimarySelect(Some(1))]
        );
        assert_eq!(table.extend_selection(1), Some(TableEvent::Select(vec![1, 0])));
        assert_eq!(table.move_down(1), Some(TableEvent::Hover(Some(2))));
    }

    #[test]
    fn toggle_uses_owner_highlights() {
        let mut table = table();
        table.set_highlights(Highlights {
            selected: vec![0, 2],
            ..Highlights::default()
        });
        assert_eq!(table.toggle_current(), Some(TableEvent::Select(vec![2])));
        table.move_down(1);
        assert_eq!(table.toggle_current(), Some(TableEvent::Select(vec![0, 2, 1])));
    }

    #[test]
    fn links_activate_without_selecting() {
        let rows = vec![vec![TableEntry::Rendered {
            display: "https://x.org".into(),
            sort_value: "https://x.org".into(),
            link: true,
        }]];
        let mut table = DataTable::new();
        table.set_data(vec![header("url")], rows);
        assert_eq!(
            table.activate_link(),
            Some(TableEvent::LinkActivated {
                row: 0,
                column: "url".to_string(),
                url: "https://x.org".to_string()
            })
        );
    }

    #[test]
    fn cursor_scrolls_viewport() {
        let rows = (0..10)
            .map(|i| vec![TableEntry::Value(i.to_string())])
            .collect();
        let mut table = DataTable::new();
        table.resize(20, 3);
        table.set_data(vec![header("n")], rows);
        table.move_down(5);
        assert_eq!(table.window(), &[3, 4, 5]);
        table.move_end();
        assert_eq!(table.cursor_position(), Some(9));
        table.move_up(100);
        assert_eq!(table.window(), &[0, 1, 2]);
    }
}

use arboard::Clipboard;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::dataset::{self, Dataset};
use crate::domain::{CMDMode, HELP_TEXT, Message, TVConfig, TVError};
use crate::inputter::{InputResult, Inputter};
use crate::services::{
    DataService, FocusService, STARRED_SLICE_NAME, SelectionService, SliceService, shared,
};
use crate::state::AppState;
use crate::table::{DataTableModule, TableEvent, TableServices};
use crate::ui::{CMDLINE_HEIGH, ROW_MARKER_WIDTH, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT, TOOLBAR_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    COLUMNS,
    POPUP,
    CMDINPUT,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH + ROW_MARKER_WIDTH),
            table_height: ui_height
                .saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT + TOOLBAR_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    services: TableServices,
    table: DataTableModule,
    uilayout: UILayout,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    column_cursor: usize,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        dataset: Dataset,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, TVError> {
        let services = TableServices {
            app_state: shared(AppState::new(dataset)),
            selection: shared(SelectionService::new()),
            reference_selection: shared(SelectionService::new()),
            focus: shared(FocusService::new()),
            slices: shared(SliceService::new()),
            data: shared(DataService::new()),
        };
        let table = DataTableModule::new(services.clone(), config);
        let clipboard = Clipboard::new()
            .map_err(|e| warn!("Clipboard not available: {e}"))
            .ok();

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            services,
            table,
            uilayout: UILayout::default(),
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            column_cursor: 0,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.ui_resize(ui_width, ui_height);
        let nrows = model.services.app_state.borrow().current_inputs().len();
        model.set_status_message(format!("Loaded {nrows} rows"));
        Ok(model)
    }

    // -------------------- Accessors for rendering ---------------------- //

    pub fn table(&self) -> &DataTableModule {
        &self.table
    }

    pub fn services(&self) -> &TableServices {
        &self.services
    }

    pub fn config(&self) -> &TVConfig {
        &self.config
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn cmd_mode(&self) -> Option<CMDMode> {
        self.cmd_mode
    }

    pub fn cmd_input(&self) -> &InputResult {
        &self.last_input
    }

    pub fn column_cursor(&self) -> usize {
        self.column_cursor
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn report_error(&mut self, context: &str, err: TVError) {
        error!("{context}: {err}");
        self.set_status_message(format!("{context}: {err}"));
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.table
            .table_mut()
            .resize(self.uilayout.table_width, self.uilayout.table_height);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => self.update_table(msg),
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.column_cursor = self.column_cursor.saturating_sub(1),
                    Message::MoveDown => {
                        let last = self.table.column_choices().len().saturating_sub(1);
                        self.column_cursor = (self.column_cursor + 1).min(last);
                    }
                    Message::ToggleSelect | Message::PrimarySelect => self.toggle_picked_column(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::ColumnPicker => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help | Message::PrimarySelect => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        // Other holders of the services may have changed them.
        self.table.sync();
        Ok(())
    }

    fn update_table(&mut self, msg: Message) {
        let page = match self.uilayout.table_height {
            0 => self.config.page_step,
            height => height,
        };
        match msg {
            Message::Quit => self.quit(),
            Message::Exit => self.exit(),
            Message::Help => self.show_help(),
            Message::MoveUp => self.with_table(|t| t.move_up(1).into_iter().collect()),
            Message::MoveDown => self.with_table(|t| t.move_down(1).into_iter().collect()),
            Message::MovePageUp => self.with_table(|t| t.move_up(page).into_iter().collect()),
            Message::MovePageDown => self.with_table(|t| t.move_down(page).into_iter().collect()),
            Message::MoveBeginning => self.with_table(|t| t.move_beginning().into_iter().collect()),
            Message::MoveEnd => self.with_table(|t| t.move_end().into_iter().collect()),
            Message::MoveLeft => self.table.table_mut().move_left(),
            Message::MoveRight => {
                let max_width = self.config.max_column_width;
                self.table.table_mut().move_right(max_width)
            }
            Message::ToggleSelect => self.with_table(|t| t.toggle_current().into_iter().collect()),
            Message::PrimarySelect => self.with_table(|t| t.select_current()),
            Message::ExtendSelectionUp => {
                self.with_table(|t| t.extend_selection(-1).into_iter().collect())
            }
            Message::ExtendSelectionDown => {
                self.with_table(|t| t.extend_selection(1).into_iter().collect())
            }
            Message::Pin => self.table.pin_current(),
            Message::Star => self.table.star_current(),
            Message::Search => self.enter_cmd_mode(CMDMode::Search),
            Message::FilterColumn => self.enter_cmd_mode(CMDMode::FilterColumn),
            Message::EnterCommand => self.enter_cmd_mode(CMDMode::Raw),
            Message::SortAscending => self.table.sort_current_column(true),
            Message::SortDescending => self.table.sort_current_column(false),
            Message::ColumnPicker => {
                self.previous_modus = self.modus;
                self.modus = Modus::COLUMNS;
                self.column_cursor = 0;
            }
            Message::ResetView => {
                self.table.reset_view();
                self.set_status_message("View reset");
            }
            Message::SelectFiltered => {
                self.table.select_filtered();
                let n = self.services.selection.borrow().len();
                self.set_status_message(format!("Selected {n} rows"));
            }
            Message::ToggleOnlySelected => {
                let on = !self.table.only_selected();
                self.table.set_only_selected(on);
            }
            Message::ToggleOnlyGenerated => {
                let on = !self.table.only_generated();
                self.table.set_only_generated(on);
            }
            Message::OpenLink => self.open_link(),
            Message::CopyIds => self.copy_selected_ids(),
            Message::Resize(width, height) => self.ui_resize(width, height),
            _ => (),
        }
    }

    /// Runs a widget gesture and routes its events through the table module.
    fn with_table<F>(&mut self, gesture: F)
    where
        F: FnOnce(&mut crate::table::widget::DataTable) -> Vec<TableEvent>,
    {
        let events = gesture(self.table.table_mut());
        if !events.is_empty() {
            self.table.handle_table_events(events);
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                self.services.selection.borrow_mut().clear();
                self.table.sync();
            }
            Modus::COLUMNS | Modus::POPUP => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::TABLE;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn toggle_picked_column(&mut self) {
        if let Some((name, _)) = self.table.column_choices().get(self.column_cursor) {
            let name = name.clone();
            self.table.toggle_column(&name);
        }
    }

    fn open_link(&mut self) {
        let Some(event) = self.table.table().activate_link() else {
            self.set_status_message("No link in this cell");
            return;
        };
        if let Some(url) = self.table.handle_table_events(vec![event]) {
            info!("Opening {url}");
            match open::that_detached(&url) {
                Ok(()) => self.set_status_message(format!("Opened {url}")),
                Err(e) => self.report_error("Could not open link", TVError::IoError(e)),
            }
        }
    }

    fn copy_selected_ids(&mut self) {
        let ids = self.services.selection.borrow().selected_ids().join("\n");
        if ids.is_empty() {
            self.set_status_message("Nothing selected");
            return;
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available");
            return;
        };
        match clipboard.set_text(ids) {
            Ok(_) => self.set_status_message("Copied selected ids"),
            Err(e) => trace!("Error copying to clipboard: {:?}", e),
        }
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        } else if self.cmd_mode == Some(CMDMode::Search) {
            let input = self.last_input.input.clone();
            self.table.edit_search(&input);
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        if mode == CMDMode::Search {
            let current = self.table.search().input.clone();
            self.input.set(&current);
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.cmd_mode {
            Some(CMDMode::Search) if canceled => self.table.cancel_search(),
            Some(CMDMode::Search) => {
                self.table.edit_search(&cmd_input);
                self.table.commit_search();
                let n = self.table.table().visible_row_indices().len();
                self.set_status_message(format!("{n} rows match \"{cmd_input}\""));
            }
            Some(CMDMode::FilterColumn) if !canceled => {
                self.table.filter_current_column(&cmd_input);
            }
            Some(CMDMode::Raw) if !canceled => {
                if let Err(e) = self.run_command(&cmd_input) {
                    self.report_error("Command failed", e);
                }
            }
            _ => {}
        }

        self.cmd_mode = None;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn run_command(&mut self, cmd: &str) -> Result<(), TVError> {
        let cmd = cmd.trim();
        let (name, arg) = cmd
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((cmd, ""));
        info!("Running command {name} {arg}");
        let needs_arg = |arg: &str| {
            if arg.is_empty() {
                Err(TVError::InvalidCommand(format!("{name} needs an argument")))
            } else {
                Ok(())
            }
        };
        match name {
            "open" => {
                needs_arg(arg)?;
                self.open_dataset(&dataset::expand_path(arg)?)
            }
            "preds" => {
                needs_arg(arg)?;
                self.load_predictions(&dataset::expand_path(arg)?)
            }
            "slice" => {
                needs_arg(arg)?;
                let ids = self.services.selection.borrow().selected_ids().to_vec();
                let n = ids.len();
                self.services.slices.borrow_mut().create_slice(arg, ids)?;
                self.set_status_message(format!("Saved {n} rows as slice {arg}"));
                Ok(())
            }
            "select" => {
                needs_arg(arg)?;
                let ids = self
                    .services
                    .slices
                    .borrow()
                    .get_slice_by_name(arg)
                    .map(<[String]>::to_vec)
                    .ok_or_else(|| {
                        let known = self.services.slices.borrow().slice_names().join(", ");
                        TVError::InvalidCommand(format!("no slice named {arg} (known: {known})"))
                    })?;
                self.services.selection.borrow_mut().select_ids(ids);
                Ok(())
            }
            "delslice" => {
                needs_arg(arg)?;
                self.services.slices.borrow_mut().delete_slice(arg)
            }
            "q" | "quit" => {
                self.quit();
                Ok(())
            }
            _ => Err(TVError::InvalidCommand(cmd.to_string())),
        }
    }

    /// Replaces the dataset. Everything keyed by the old ids is cleared.
    pub fn open_dataset(&mut self, path: &Path) -> Result<(), TVError> {
        let dataset = dataset::load_dataset(path)?;
        let nrows = dataset.inputs.len();
        self.services.selection.borrow_mut().clear();
        self.services.reference_selection.borrow_mut().clear();
        self.services.focus.borrow_mut().clear_focus();
        self.services.slices.borrow_mut().clear_members();
        self.services.data.borrow_mut().clear();
        self.services.app_state.borrow_mut().set_dataset(dataset);
        self.table.reset_view();
        self.set_status_message(format!("Loaded {nrows} rows from {}", path.display()));
        Ok(())
    }

    pub fn load_predictions(&mut self, path: &Path) -> Result<(), TVError> {
        let predictions = dataset::load_predictions(path)?;
        let model_name = predictions.model.clone();
        {
            let mut state = self.services.app_state.borrow_mut();
            let mut data = self.services.data.borrow_mut();
            for column in predictions.columns {
                let (known, unknown): (Vec<_>, Vec<_>) = column
                    .values
                    .into_iter()
                    .partition(|(id, _)| state.index_of(id).is_some());
                if !unknown.is_empty() {
                    warn!(
                        "Skipping {} predictions of {} for unknown ids",
                        unknown.len(),
                        column.name
                    );
                }
                data.add_column(
                    column.name,
                    column.spec,
                    model_name.clone(),
                    known.into_iter().collect(),
                );
            }
            state.add_model(model_name.clone());
            debug!("Data columns now: {:?}", data.col_names());
        }
        self.table.sync();
        self.set_status_message(format!("Loaded predictions of {model_name}"));
        Ok(())
    }

    pub fn starred_count(&self) -> usize {
        self.services
            .slices
            .borrow()
            .get_slice_by_name(STARRED_SLICE_NAME)
            .map_or(0, <[String]>::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CellValue, IndexedInput};
    use crate::types::{FieldSpec, FieldType, Spec};
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::io::Write;

    fn dataset() -> Dataset {
        let mut spec = Spec::new();
        spec.push("sentence", FieldSpec::new(FieldType::String));
        let inputs = ["r1", "r2", "r3"]
            .iter()
            .map(|id| {
                IndexedInput::new(*id).with_value("sentence", CellValue::Text(format!("about {id}")))
            })
            .collect();
        Dataset::new("toy", spec, inputs)
    }

    fn model() -> Model {
        Model::init(&TVConfig::default(), dataset(), 100, 30).unwrap()
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    fn press(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    #[test]
    fn search_is_applied_on_enter_only() {
        let mut model = model();
        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        type_text(&mut model, "r2");
        assert!(model.table().search().edited);
        assert_eq!(model.table().search().applied, "");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.table().search().applied, "r2");
        assert_eq!(model.table().table().visible_row_indices(), vec![1]);
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn escape_discards_search_edits() {
        let mut model = model();
        model.update(Some(Message::Search)).unwrap();
        type_text(&mut model, "zzz");
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.table().search().applied, "");
        assert!(!model.table().search().edited);
        assert_eq!(model.table().table().visible_row_indices().len(), 3);
    }

    #[test]
    fn selection_messages_reach_the_service() {
        let mut model = model();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::PrimarySelect)).unwrap();
        model.update(Some(Message::ExtendSelectionDown)).unwrap();
        let selection = model.services().selection.clone();
        assert_eq!(selection.borrow().selected_ids(), &["r2".to_string(), "r3".to_string()]);
        assert_eq!(selection.borrow().primary_selected_id(), Some("r2"));
        assert_eq!(model.services().focus.borrow().focused_id(), Some("r2"));
        model.update(Some(Message::Exit)).unwrap();
        assert!(selection.borrow().is_empty());
    }

    #[test]
    fn slice_commands_round_trip_selection() {
        let mut model = model();
        model.update(Some(Message::SelectFiltered)).unwrap();
        model.run_command("slice all").unwrap();
        model.services().selection.borrow_mut().clear();
        model.run_command("select all").unwrap();
        assert_eq!(model.services().selection.borrow().len(), 3);
        model.run_command("delslice all").unwrap();
        assert!(model.run_command("select all").is_err());
        assert!(model.run_command("slice").is_err());
        assert!(matches!(
            model.run_command("bogus"),
            Err(TVError::InvalidCommand(_))
        ));
    }

    #[test]
    fn star_and_pin_messages() {
        let mut model = model();
        model.update(Some(Message::Star)).unwrap();
        assert_eq!(model.starred_count(), 1);
        model.update(Some(Message::Pin)).unwrap();
        assert!(model.services().app_state.borrow().compare_examples_enabled());
        assert!(model.services().selection.borrow().is_empty());
    }

    #[test]
    fn column_picker_toggles_columns() {
        let mut model = model();
        model.update(Some(Message::ColumnPicker)).unwrap();
        assert_eq!(model.modus(), Modus::COLUMNS);
        model.update(Some(Message::ToggleSelect)).unwrap();
        assert_eq!(
            model.table().column_visibility().get("sentence"),
            Some(&false)
        );
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn predictions_reset_column_visibility() {
        let mut model = model();
        model.update(Some(Message::ColumnPicker)).unwrap();
        model.update(Some(Message::ToggleSelect)).unwrap();
        model.update(Some(Message::Exit)).unwrap();

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,label").unwrap();
        writeln!(file, "r1,pos").unwrap();
        writeln!(file, "r2,neg").unwrap();
        writeln!(file, "ghost,pos").unwrap();
        file.flush().unwrap();
        model.load_predictions(file.path()).unwrap();

        let model_name = file
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap()
            .to_string();
        let column = format!("{model_name}:label");
        assert_eq!(model.table().column_visibility().get("sentence"), Some(&true));
        assert_eq!(model.table().column_visibility().get(&column), Some(&true));
        assert_eq!(
            model.services().app_state.borrow().current_models(),
            &[model_name]
        );
        assert!(model.services().data.borrow().get_val("ghost", &column).is_none());
    }
}

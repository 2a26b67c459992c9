use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::fmt;
use std::io::Error;

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidCommand(String),
    LoggingFailed(String),
}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<PolarsError> for TVError {
    fn from(err: PolarsError) -> Self {
        TVError::PolarsError(err)
    }
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "io error: {e}"),
            TVError::PolarsError(e) => write!(f, "polars error: {e}"),
            TVError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
            TVError::UnknownFileType => write!(f, "unknown file type"),
            TVError::InvalidCommand(cmd) => write!(f, "invalid command: {cmd}"),
            TVError::LoggingFailed(msg) => write!(f, "could not set up logging: {msg}"),
        }
    }
}

impl std::error::Error for TVError {}

#[derive(Debug, Clone, Setters)]
pub struct TVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Rows skipped by PageUp/PageDown when the viewport height is unknown.
    pub page_step: usize,
    /// Hint passed to the cell formatter to shorten long text.
    pub limit_words: bool,
}

impl Default for TVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            page_step: 20,
            limit_words: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Raw,
    Search,
    FilterColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Help,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveLeft,
    MoveRight,
    ToggleSelect,
    PrimarySelect,
    ExtendSelectionUp,
    ExtendSelectionDown,
    Pin,
    Star,
    Search,
    FilterColumn,
    EnterCommand,
    SortAscending,
    SortDescending,
    ColumnPicker,
    ResetView,
    SelectFiltered,
    ToggleOnlySelected,
    ToggleOnlyGenerated,
    OpenLink,
    CopyIds,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  ↑/↓ PgUp/PgDn Home/End   move row cursor
  ←/→                      move column cursor

Selection
  Space                    toggle row in selection
  Enter                    make row the primary selection
  Shift+↑/↓                extend selection
  a                        select all filtered rows
  Esc                      clear selection / close

Rows
  p                        pin row as comparison reference
  s                        star / unstar row
  l                        open link in current cell
  y                        copy selected ids

View
  /                        search all columns (Enter applies)
  \\                        filter current column
  [ / ]                    sort current column desc / asc
  c                        choose visible columns
  o                        show only selected rows
  g                        show only generated rows
  r                        reset view

Commands
  :open <path>             load another dataset
  :preds <path>            join model predictions
  :slice <name>            save selection as slice
  :select <name>           select slice members
  :delslice <name>         delete slice

  ?                        this help
  q                        quit";

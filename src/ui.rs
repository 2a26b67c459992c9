use std::iter;

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState, Table,
    },
};

use crate::domain::{CMDMode, TVConfig};
use crate::model::{Modus, Model};
use crate::table::widget::DataTable;

pub const TOOLBAR_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
/// Selection, star and pin markers plus the column spacer.
pub const ROW_MARKER_WIDTH: usize = 4;

const MARK_PRIMARY: char = '▶';
const MARK_SELECTED: char = '✔';
const MARK_STARRED: char = '★';
const MARK_PINNED: char = 'P';

pub struct UI {
    max_column_width: usize,
}

impl UI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [toolbar, body, cmdline] = Layout::vertical([
            Constraint::Length(TOOLBAR_HEIGHT as u16),
            Constraint::Fill(1),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(body);

        frame.render_widget(Paragraph::new(toolbar_line(model)), toolbar);
        self.draw_table(model.table().table(), frame, table_area);
        draw_scrollbar(model.table().table(), frame, scrollbar_area);
        draw_cmdline(model, frame, cmdline);

        match model.modus() {
            Modus::COLUMNS => draw_column_picker(model, frame),
            Modus::POPUP => draw_help(model, frame),
            _ => {}
        }
    }

    fn draw_table(&self, table: &DataTable, frame: &mut Frame, area: Rect) {
        let columns = table.visible_columns(self.max_column_width);
        if table.window().is_empty() {
            let text = Paragraph::new("No rows to show".dark_gray()).centered();
            frame.render_widget(text, area);
            return;
        }

        let current_column = table.current_column_idx();
        let header = Row::new(iter::once(Cell::from("")).chain(columns.iter().map(|(cidx, _)| {
            let column = &table.columns()[*cidx];
            let mut label = column.name.clone();
            if let Some((sorted, ascending)) = table.sort()
                && sorted == column.name
            {
                let arrow = if ascending { "↑" } else { "↓" };
                label = format!("{arrow} {label}");
            }
            if table.column_filters().contains_key(&column.name) {
                label.push_str(" ⧩");
            }
            let style = if *cidx == current_column {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            Cell::from(label).style(style)
        })))
        .height(TABLE_HEADER_HEIGHT as u16)
        .style(Style::default().add_modifier(Modifier::UNDERLINED));

        let cursor = table.cursor_position();
        let rows = table.window().iter().map(|&position| {
            let marks = table.marks(position);
            let marker: String = [
                if marks.primary {
                    MARK_PRIMARY
                } else if marks.selected {
                    MARK_SELECTED
                } else {
                    ' '
                },
                if marks.starred { MARK_STARRED } else { ' ' },
                if marks.reference { MARK_PINNED } else { ' ' },
            ]
            .iter()
            .collect();

            let cells = columns.iter().map(|(cidx, _)| {
                let entry = table.cell(position, *cidx);
                let text = entry.map(|e| e.display()).unwrap_or_default().to_string();
                let mut cell = Cell::from(text);
                if entry.and_then(|e| e.link()).is_some() {
                    cell = cell.style(Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED));
                }
                if cursor == Some(position) && *cidx == current_column {
                    cell = cell.style(Style::default().fg(Color::Black).bg(Color::Yellow));
                }
                cell
            });

            let mut style = Style::default();
            if marks.selected {
                style = style.bg(Color::DarkGray);
            }
            if marks.primary {
                style = style.add_modifier(Modifier::BOLD);
            }
            if marks.reference {
                style = style.fg(Color::Magenta);
            }
            if cursor == Some(position) {
                style = style.add_modifier(Modifier::REVERSED);
            } else if marks.focused {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Row::new(iter::once(Cell::from(marker)).chain(cells)).style(style)
        });

        let widths = iter::once(Constraint::Length((ROW_MARKER_WIDTH - 1) as u16))
            .chain(columns.iter().map(|(_, w)| Constraint::Length(*w as u16)));
        frame.render_widget(Table::new(rows, widths).header(header), area);
    }
}

fn draw_scrollbar(table: &DataTable, frame: &mut Frame, area: Rect) {
    let total = table.visible_row_indices().len();
    let mut state = ScrollbarState::new(total).position(table.cursor_display_row());
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area,
        &mut state,
    );
}

fn toolbar_line(model: &Model) -> Line<'static> {
    let module = model.table();
    let services = module.services();
    let state = services.app_state.borrow();
    let total = state.current_inputs().len();
    let shown = module.table().visible_row_indices().len();
    let selected = services.selection.borrow().len();

    let mut spans = vec![
        Span::from(format!(" {} ", state.current_dataset())).bold().reversed(),
        Span::from(format!(" {shown}/{total} rows ")),
        Span::from(format!("| {selected} selected ")),
        Span::from(format!("| {MARK_STARRED} {} ", model.starred_count())),
    ];
    if !state.current_models().is_empty() {
        spans.push(Span::from(format!("| models: {} ", state.current_models().join(", "))));
    }
    if module.only_selected() {
        spans.push("[only selected] ".cyan());
    }
    if module.only_generated() {
        spans.push("[only generated] ".cyan());
    }
    let search = module.search();
    if !search.applied.is_empty() || search.edited {
        let marker = if search.edited { "*" } else { "" };
        spans.push(Span::from(format!("| search: \"{}\"{marker} ", search.input)).yellow());
    }
    if let Some(focus) = services.focus.borrow().focus_data() {
        let field = focus.sub_field.as_deref().unwrap_or("-");
        spans.push(Span::from(format!("| @{}:{field} ", focus.datapoint_id)).dark_gray());
    }
    for (column, term) in module.table().column_filters() {
        spans.push(Span::from(format!("| {column} ~ \"{term}\" ")).yellow());
    }
    if !module.table().is_default_view() {
        spans.push("[r: reset view] ".magenta());
    }
    Line::from(spans)
}

fn draw_cmdline(model: &Model, frame: &mut Frame, area: Rect) {
    if model.modus() == Modus::CMDINPUT {
        let prefix = match model.cmd_mode() {
            Some(CMDMode::Search) => "/",
            Some(CMDMode::FilterColumn) => "\\",
            _ => ":",
        };
        let input = model.cmd_input();
        frame.render_widget(Paragraph::new(format!("{prefix}{}", input.input)), area);
        let x = area.x + 1 + input.curser_pos as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    } else {
        let line = Line::from(vec![
            Span::from(model.status_message().to_string()),
            Span::from("  ? help").dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

fn draw_column_picker(model: &Model, frame: &mut Frame) {
    let area = popup_area(frame.area(), 50, 70);
    let lines: Vec<Line> = model
        .table()
        .column_choices()
        .into_iter()
        .enumerate()
        .map(|(idx, (name, visible))| {
            let check = if visible { "[x]" } else { "[ ]" };
            let line = Line::from(format!("{check} {name}"));
            if idx == model.column_cursor() {
                line.reversed()
            } else {
                line
            }
        })
        .collect();
    // Keep the cursor line inside the popup.
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = model.column_cursor().saturating_sub(inner_height.saturating_sub(1));
    let block = Block::bordered()
        .title(" Columns ")
        .title_bottom(" Space toggle, Esc close ");
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(block).scroll((scroll as u16, 0)),
        area,
    );
}

fn draw_help(model: &Model, frame: &mut Frame) {
    let area = popup_area(frame.area(), 70, 80);
    let block = Block::bordered().title(" Help ").title_bottom(" Esc close ");
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(model.help_text()).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{CellValue, Dataset, IndexedInput};
    use crate::domain::Message;
    use crate::types::{FieldSpec, FieldType, Spec};
    use ratatui::{Terminal, backend::TestBackend};

    fn render(model: &Model) -> String {
        let ui = UI::new(&TVConfig::default());
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn model() -> Model {
        let mut spec = Spec::new();
        spec.push("label", FieldSpec::new(FieldType::String));
        let inputs = vec![
            IndexedInput::new("a").with_value("label", CellValue::Text("alpha".into())),
            IndexedInput::new("b").with_value("label", CellValue::Text("beta".into())),
        ];
        Model::init(&TVConfig::default(), Dataset::new("toy", spec, inputs), 80, 12).unwrap()
    }

    #[test]
    fn renders_rows_and_toolbar() {
        let mut model = model();
        model.update(Some(Message::Star)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("toy"));
        assert!(screen.contains("2/2 rows"));
        assert!(screen.contains("alpha"));
        assert!(screen.contains("beta"));
        assert!(screen.contains(MARK_STARRED));
    }

    #[test]
    fn sorting_shows_reset_hint() {
        let mut model = model();
        assert!(!render(&model).contains("reset view"));
        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::SortAscending)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("reset view"));
        assert!(screen.contains("↑ label"));
        model.update(Some(Message::ResetView)).unwrap();
        assert!(!render(&model).contains("reset view"));
    }

    #[test]
    fn renders_help_popup() {
        let mut model = model();
        model.update(Some(Message::Help)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Help"));
    }
}

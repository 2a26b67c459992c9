use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TVConfig, TVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(self.handle_key(key))
                }
            }
            Event::Resize(width, height) => Ok(Some(Message::Resize(width as usize, height as usize))),
            _ => Ok(None),
        }
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Up, KeyModifiers::SHIFT) => Some(Message::ExtendSelectionUp),
            (KeyCode::Down, KeyModifiers::SHIFT) => Some(Message::ExtendSelectionDown),
            (KeyCode::Char('K'), _) => Some(Message::ExtendSelectionUp),
            (KeyCode::Char('J'), _) => Some(Message::ExtendSelectionDown),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Char(' '), _) => Some(Message::ToggleSelect),
            (KeyCode::Enter, _) => Some(Message::PrimarySelect),
            (KeyCode::Char('p'), _) => Some(Message::Pin),
            (KeyCode::Char('s'), _) => Some(Message::Star),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('\\'), _) => Some(Message::FilterColumn),
            (KeyCode::Char(':'), _) => Some(Message::EnterCommand),
            (KeyCode::Char(']'), _) => Some(Message::SortAscending),
            (KeyCode::Char('['), _) => Some(Message::SortDescending),
            (KeyCode::Char('c'), _) => Some(Message::ColumnPicker),
            (KeyCode::Char('r'), _) => Some(Message::ResetView),
            (KeyCode::Char('a'), _) => Some(Message::SelectFiltered),
            (KeyCode::Char('o'), _) => Some(Message::ToggleOnlySelected),
            (KeyCode::Char('g'), _) => Some(Message::ToggleOnlyGenerated),
            (KeyCode::Char('l'), _) => Some(Message::OpenLink),
            (KeyCode::Char('y'), _) => Some(Message::CopyIds),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        let controller = Controller::new(&TVConfig::default());
        controller.handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn shift_arrows_extend_selection() {
        assert_eq!(map(KeyCode::Up, KeyModifiers::SHIFT), Some(Message::ExtendSelectionUp));
        assert_eq!(map(KeyCode::Up, KeyModifiers::NONE), Some(Message::MoveUp));
        assert_eq!(map(KeyCode::Down, KeyModifiers::SHIFT), Some(Message::ExtendSelectionDown));
    }

    #[test]
    fn letters_map_to_row_actions() {
        assert_eq!(map(KeyCode::Char('l'), KeyModifiers::NONE), Some(Message::OpenLink));
        assert_eq!(map(KeyCode::Char('s'), KeyModifiers::NONE), Some(Message::Star));
        assert_eq!(map(KeyCode::Char(' '), KeyModifiers::NONE), Some(Message::ToggleSelect));
        assert_eq!(map(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }
}

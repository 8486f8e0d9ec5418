//! Keyboard event handling for the dashboard.
//!
//! Maps crossterm keyboard events to application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Focus};

/// Handles a keyboard event and updates the app state accordingly.
///
/// Returns `true` if the application should quit, `false` otherwise.
///
/// # Event Handling
///
/// - `q` / `Ctrl+C`: Quit
/// - `Tab` / `Shift+Tab`: Switch between question list and answer panel
/// - `g`: Jump to the newest question
/// - When `QuestionList` focused: j/k (or arrows) move the selection
/// - When `AnswerView` focused: j/k (or arrows) scroll the answer
///
/// # Examples
///
/// ```
/// use butterfly::tui::{App, event::handle_key_event};
/// use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
///
/// let mut app = App::new("kb.pdf");
/// let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
/// assert!(handle_key_event(&mut app, key));
/// ```
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.is_empty() {
        return true;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match key.code {
        KeyCode::Tab | KeyCode::BackTab => {
            app.next_focus();
            return false;
        }
        KeyCode::Char('g') if key.modifiers.is_empty() => {
            app.select_newest();
            return false;
        }
        _ => {}
    }

    match app.focus() {
        Focus::QuestionList => handle_question_list(app, key),
        Focus::AnswerView => handle_answer_view(app, key),
    }

    false
}

fn handle_question_list(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        _ => {}
    }
}

fn handle_answer_view(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_detail_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_detail_up(1),
        KeyCode::PageDown => app.scroll_detail_down(10),
        KeyCode::PageUp => app.scroll_detail_up(10),
        _ => {}
    }
}

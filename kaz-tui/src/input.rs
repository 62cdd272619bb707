use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, PRICE_STEP, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.dataset`(...) for the highlighted municipality
    LoadDataset,
    /// Drop the memoized table and load it again
    ReloadDataset,
    /// Filter changed, resample the map
    FilterChanged,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, F, Left, PageDown, PageUp, Right, Up};

    // Global quit shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if key.code == Char('q') && key.modifiers.is_empty() {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::MunicipalitySelect => match key.code {
            Up | Char('k') => {
                app.list_index = app.list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.list_index + 1 < app.municipalities.len() {
                    app.list_index += 1;
                }
            }
            Enter | Char(' ') => {
                action = Action::LoadDataset;
            }
            _ => {}
        },

        Screen::Dashboard => match key.code {
            Left | Char('h') => {
                app.postal_index = app.postal_index.saturating_sub(1);
            }
            Right | Char('l') => {
                if app.postal_index + 1 < app.postal_codes.len() {
                    app.postal_index += 1;
                }
            }
            Char(' ') => {
                app.toggle_postal_code();
                action = Action::FilterChanged;
            }
            Char('a') => {
                app.select_all_postal_codes();
                action = Action::FilterChanged;
            }
            Char('t') => {
                app.cycle_type();
                action = Action::FilterChanged;
            }
            Char('[') => {
                app.shift_min(-PRICE_STEP);
                action = Action::FilterChanged;
            }
            Char(']') => {
                app.shift_min(PRICE_STEP);
                action = Action::FilterChanged;
            }
            Char('{') => {
                app.shift_max(-PRICE_STEP);
                action = Action::FilterChanged;
            }
            Char('}') => {
                app.shift_max(PRICE_STEP);
                action = Action::FilterChanged;
            }
            Char('r') => {
                app.reset_filter();
                action = Action::FilterChanged;
            }
            F(5) | Char('u') => {
                action = Action::ReloadDataset;
            }
            Up | Char('k') => {
                app.detail_offset = app.detail_offset.saturating_sub(1);
            }
            Down | Char('j') => {
                app.detail_offset += 1;
            }
            PageUp => {
                app.detail_offset = app.detail_offset.saturating_sub(10);
            }
            PageDown => {
                app.detail_offset += 10;
            }
            Esc | Backspace | Char('b') => {
                app.back_to_list();
            }
            _ => {}
        },
    }
    action
}

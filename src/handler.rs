use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, AuthPhase, ChatFocus, InputMode, LoginField, RegisterField, Route, SUGGESTED_PROMPTS};
use crate::auth;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Nothing conclusive is rendered or accepted until the initial session
    // check settles.
    if app.auth_phase == AuthPhase::Checking {
        return Ok(());
    }

    if app.show_rename {
        handle_rename_popup(app, key);
        return Ok(());
    }

    match app.route {
        Route::Login => handle_login(app, key),
        Route::Register => handle_register(app, key),
        Route::Dashboard => handle_dashboard(app, key),
        Route::Chat => handle_chat(app, key),
        Route::Properties | Route::Valuation | Route::Documents | Route::Approvals => {
            handle_placeholder(app, key)
        }
    }
    Ok(())
}

/// Screen switching for the protected views (sidebar equivalent).
fn handle_nav_key(app: &mut App, key: KeyEvent) -> bool {
    let route = match key.code {
        KeyCode::Char('1') => Route::Dashboard,
        KeyCode::Char('2') => Route::Chat,
        KeyCode::Char('3') => Route::Properties,
        KeyCode::Char('4') => Route::Valuation,
        KeyCode::Char('5') => Route::Documents,
        KeyCode::Char('6') => Route::Approvals,
        _ => return false,
    };
    app.navigate(route);
    true
}

fn handle_login(app: &mut App, key: KeyEvent) {
    // The submit control is disabled while a request is outstanding.
    if app.auth_loading {
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::Down => {
            app.login.field = match app.login.field {
                LoginField::Email => LoginField::Password,
                LoginField::Password => LoginField::Remember,
                LoginField::Remember => LoginField::Email,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.login.field = match app.login.field {
                LoginField::Email => LoginField::Remember,
                LoginField::Password => LoginField::Email,
                LoginField::Remember => LoginField::Password,
            };
        }
        KeyCode::Enter => {
            if app.login.field == LoginField::Remember {
                app.login.remember = !app.login.remember;
            } else {
                app.submit_login();
            }
        }
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.login.show_password = !app.login.show_password;
        }
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.navigate(Route::Register);
        }
        KeyCode::Char(' ') if app.login.field == LoginField::Remember => {
            app.login.remember = !app.login.remember;
        }
        KeyCode::Backspace => {
            match app.login.field {
                LoginField::Email => {
                    app.login.email.pop();
                }
                LoginField::Password => {
                    app.login.password.pop();
                }
                LoginField::Remember => {}
            }
        }
        KeyCode::Char(c) => match app.login.field {
            LoginField::Email => app.login.email.push(c),
            LoginField::Password => app.login.password.push(c),
            LoginField::Remember => {}
        },
        _ => {}
    }
}

fn handle_register(app: &mut App, key: KeyEvent) {
    if app.auth_loading {
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab | KeyCode::Down => {
            app.register.field = match app.register.field {
                RegisterField::Name => RegisterField::Email,
                RegisterField::Email => RegisterField::Password,
                RegisterField::Password => RegisterField::Confirm,
                RegisterField::Confirm => RegisterField::Name,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.register.field = match app.register.field {
                RegisterField::Name => RegisterField::Confirm,
                RegisterField::Email => RegisterField::Name,
                RegisterField::Password => RegisterField::Email,
                RegisterField::Confirm => RegisterField::Password,
            };
        }
        KeyCode::Enter => app.submit_register(),
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.register.show_password = !app.register.show_password;
        }
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.navigate(Route::Login);
        }
        KeyCode::Backspace => {
            match app.register.field {
                RegisterField::Name => {
                    app.register.name.pop();
                }
                RegisterField::Email => {
                    app.register.email.pop();
                }
                RegisterField::Password => {
                    app.register.password.pop();
                    app.register.strength = auth::password_strength(&app.register.password);
                }
                RegisterField::Confirm => {
                    app.register.confirm.pop();
                }
            }
        }
        KeyCode::Char(c) => match app.register.field {
            RegisterField::Name => app.register.name.push(c),
            RegisterField::Email => app.register.email.push(c),
            RegisterField::Password => {
                app.register.password.push(c);
                app.register.strength = auth::password_strength(&app.register.password);
            }
            RegisterField::Confirm => app.register.confirm.push(c),
        },
        _ => {}
    }
}

fn handle_dashboard(app: &mut App, key: KeyEvent) {
    match app.input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('i') | KeyCode::Char('/') => {
                app.input_mode = InputMode::Editing;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let len = SUGGESTED_PROMPTS.len();
                let i = app.prompt_state.selected().map(|i| (i + 1).min(len - 1)).unwrap_or(0);
                app.prompt_state.select(Some(i));
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let i = app.prompt_state.selected().unwrap_or(0);
                app.prompt_state.select(Some(i.saturating_sub(1)));
            }
            KeyCode::Enter => {
                if let Some(i) = app.prompt_state.selected() {
                    if let Some(card) = SUGGESTED_PROMPTS.get(i) {
                        app.open_chat_with(card.prompt.to_string());
                    }
                }
            }
            _ => {
                handle_nav_key(app, key);
            }
        },
        InputMode::Editing => match key.code {
            KeyCode::Esc => app.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                let text = app.dashboard_input.trim().to_string();
                if !text.is_empty() {
                    app.dashboard_input.clear();
                    app.dashboard_cursor = 0;
                    app.open_chat_with(text);
                }
            }
            KeyCode::Backspace => {
                if app.dashboard_cursor > 0 {
                    app.dashboard_cursor -= 1;
                    let byte_pos = char_to_byte_index(&app.dashboard_input, app.dashboard_cursor);
                    app.dashboard_input.remove(byte_pos);
                }
            }
            KeyCode::Left => {
                app.dashboard_cursor = app.dashboard_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                let count = app.dashboard_input.chars().count();
                app.dashboard_cursor = (app.dashboard_cursor + 1).min(count);
            }
            KeyCode::Char(c) => {
                let byte_pos = char_to_byte_index(&app.dashboard_input, app.dashboard_cursor);
                app.dashboard_input.insert(byte_pos, c);
                app.dashboard_cursor += 1;
            }
            _ => {}
        },
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    match app.input_mode {
        InputMode::Normal => handle_chat_normal(app, key),
        InputMode::Editing => handle_chat_editing(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Char('a') => {
            app.input_mode = InputMode::Editing;
            app.chat_focus = ChatFocus::Input;
        }
        KeyCode::Tab => {
            app.chat_focus = match app.chat_focus {
                ChatFocus::Input => {
                    if app.sidebar_state.selected().is_none()
                        && !app.store.conversations().is_empty()
                    {
                        app.sidebar_state.select(Some(0));
                    }
                    ChatFocus::Sidebar
                }
                ChatFocus::Sidebar => ChatFocus::Input,
            };
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.chat_focus == ChatFocus::Sidebar {
                app.sidebar_nav_down();
            } else {
                app.scroll_chat_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.chat_focus == ChatFocus::Sidebar {
                app.sidebar_nav_up();
            } else {
                app.scroll_chat_up();
            }
        }
        KeyCode::Enter => {
            if app.chat_focus == ChatFocus::Sidebar {
                if let Some(id) = app.selected_conversation_id() {
                    app.store.load_conversation(id);
                    app.chat_error = None;
                    app.scroll_chat_to_bottom();
                }
            }
        }
        KeyCode::Char('n') => app.new_chat(),
        KeyCode::Char('d') => {
            if app.chat_focus == ChatFocus::Sidebar {
                app.delete_selected_conversation();
            }
        }
        KeyCode::Char('r') => {
            if app.chat_focus == ChatFocus::Sidebar {
                app.open_rename();
            }
        }
        _ => {
            handle_nav_key(app, key);
        }
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            let text = app.chat_input.trim().to_string();
            if !text.is_empty() && !app.has_pending_chat() {
                if app.store.active_id().is_none() {
                    app.store.create_conversation();
                }
                app.chat_input.clear();
                app.chat_cursor = 0;
                app.send_chat_message(text);
            }
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(count);
        }
        KeyCode::Home => app.chat_cursor = 0,
        KeyCode::End => app.chat_cursor = app.chat_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

fn handle_rename_popup(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_rename = false;
            app.rename_target = None;
            app.rename_input.clear();
            app.rename_cursor = 0;
        }
        KeyCode::Enter => app.confirm_rename(),
        KeyCode::Backspace => {
            if app.rename_cursor > 0 {
                app.rename_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.rename_input, app.rename_cursor);
                app.rename_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.rename_cursor = app.rename_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let count = app.rename_input.chars().count();
            app.rename_cursor = (app.rename_cursor + 1).min(count);
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.rename_input, app.rename_cursor);
            app.rename_input.insert(byte_pos, c);
            app.rename_cursor += 1;
        }
        _ => {}
    }
}

fn handle_placeholder(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => app.navigate(Route::Dashboard),
        _ => {
            handle_nav_key(app, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::SessionStore;
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_in(dir: &tempfile::TempDir) -> App {
        let store = SessionStore::open(dir.path().join("chat_history.json"));
        App::new(Config::new(), store)
    }

    #[test]
    fn test_login_typing_fills_focused_field() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        for c in "me@x.in".chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        handle_key(&mut app, key(KeyCode::Tab)).unwrap();
        for c in "secret123".chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).unwrap();
        }

        assert_eq!(app.login.email, "me@x.in");
        assert_eq!(app.login.password, "secret123");
    }

    #[test]
    fn test_login_enter_with_empty_fields_sets_error() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        handle_key(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.login.error.as_deref(), Some("Please fill in all fields"));
        assert!(!app.has_pending_auth());
    }

    #[test]
    fn test_remember_me_toggle() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        handle_key(&mut app, key(KeyCode::Tab)).unwrap(); // Password
        handle_key(&mut app, key(KeyCode::Tab)).unwrap(); // Remember
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(app.login.remember);
        handle_key(&mut app, key(KeyCode::Char(' '))).unwrap();
        assert!(!app.login.remember);
    }

    #[test]
    fn test_switch_to_register_and_back() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL),
        )
        .unwrap();
        assert_eq!(app.route, Route::Register);

        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL),
        )
        .unwrap();
        assert_eq!(app.route, Route::Login);
    }

    #[test]
    fn test_register_password_updates_strength_meter() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.navigate(Route::Register);
        app.register.field = crate::app::RegisterField::Password;

        for c in "Abcdefg1".chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        // length >= 8, mixed case, digit
        assert_eq!(app.register.strength, 75);

        handle_key(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.register.strength, 25); // digit gone, length < 8
    }

    #[tokio::test]
    async fn test_dashboard_quick_prompt_navigates_to_chat() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = crate::app::AuthPhase::Authenticated;
        app.navigate(Route::Dashboard);

        // Move to the "Land Measurements" card and activate it.
        handle_key(&mut app, key(KeyCode::Char('j'))).unwrap();
        handle_key(&mut app, key(KeyCode::Char('j'))).unwrap();
        handle_key(&mut app, key(KeyCode::Char('j'))).unwrap();
        assert_eq!(app.prompt_state.selected(), Some(2));
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();

        assert_eq!(app.route, Route::Chat);
        assert_eq!(
            app.store.messages()[0].content,
            "How many square feet is 5 cents?"
        );
    }

    #[tokio::test]
    async fn test_chat_enter_creates_conversation_on_demand() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = crate::app::AuthPhase::Authenticated;
        app.navigate(Route::Chat);

        for c in "hello".chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();

        assert!(app.store.active_id().is_some());
        assert_eq!(app.store.conversations().len(), 1);
        assert_eq!(app.store.messages()[0].content, "hello");
        assert!(app.chat_input.is_empty());
    }

    #[test]
    fn test_sidebar_delete_and_rename_flow() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = crate::app::AuthPhase::Authenticated;
        app.navigate(Route::Chat);
        app.store.create_conversation();
        app.store.create_conversation();
        app.input_mode = InputMode::Normal;

        handle_key(&mut app, key(KeyCode::Tab)).unwrap(); // focus sidebar
        assert_eq!(app.chat_focus, ChatFocus::Sidebar);

        handle_key(&mut app, key(KeyCode::Char('r'))).unwrap();
        assert!(app.show_rename);
        for c in " 2".chars() {
            handle_key(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        handle_key(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.store.conversations()[0].title, "New Chat 2");

        handle_key(&mut app, key(KeyCode::Char('d'))).unwrap();
        assert_eq!(app.store.conversations().len(), 1);
    }

    #[test]
    fn test_placeholder_escape_returns_to_dashboard() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = crate::app::AuthPhase::Authenticated;
        app.navigate(Route::Documents);

        handle_key(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.route, Route::Dashboard);
    }

    #[test]
    fn test_keys_ignored_while_session_check_pending() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = crate::app::AuthPhase::Checking;

        handle_key(&mut app, key(KeyCode::Char('x'))).unwrap();
        assert!(app.login.email.is_empty());
        assert!(!app.should_quit);
    }
}

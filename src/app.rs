use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::assistant::{AssistantClient, ChatReply};
use crate::auth::{AuthClient, AuthError, Session, UserProfile};
use crate::config::Config;
use crate::session::{Role, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Chat,
    Properties,
    Valuation,
    Documents,
    Approvals,
}

impl Route {
    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }
}

/// Route guard states: `Checking` while the initial session check is in
/// flight, then either `Authenticated` or `Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Checking,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
    Remember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterField {
    #[default]
    Name,
    Email,
    Password,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFocus {
    Input,
    Sidebar,
}

#[derive(Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember: bool,
    pub show_password: bool,
    pub field: LoginField,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
    pub show_password: bool,
    pub field: RegisterField,
    pub error: Option<String>,
    pub strength: u8,
}

pub struct SuggestedPrompt {
    pub icon: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTED_PROMPTS: [SuggestedPrompt; 4] = [
    SuggestedPrompt {
        icon: "📋",
        title: "Property Registration",
        description: "Learn about the registration process and required documents",
        prompt: "What documents do I need for property registration in Tamil Nadu?",
    },
    SuggestedPrompt {
        icon: "💰",
        title: "Stamp Duty Calculator",
        description: "Calculate stamp duty and registration fees",
        prompt: "How much is stamp duty for a property worth 50 lakhs?",
    },
    SuggestedPrompt {
        icon: "📏",
        title: "Land Measurements",
        description: "Convert between cents, grounds, and square feet",
        prompt: "How many square feet is 5 cents?",
    },
    SuggestedPrompt {
        icon: "🏦",
        title: "Bank Loans",
        description: "Get information about home loans and eligibility",
        prompt: "What are the eligibility criteria for a home loan?",
    },
];

pub struct Placeholder {
    pub icon: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// Placeholder pages for features that are not built yet.
pub fn placeholder_for(route: Route) -> Option<Placeholder> {
    match route {
        Route::Properties => Some(Placeholder {
            icon: "🏢",
            title: "Properties Management",
            description: "Track and manage your real estate properties in Tamil Nadu",
        }),
        Route::Valuation => Some(Placeholder {
            icon: "📏",
            title: "Land Valuation",
            description: "Calculate property values and market rates in Tamil Nadu",
        }),
        Route::Documents => Some(Placeholder {
            icon: "📄",
            title: "Documents Manager",
            description: "Manage and track your property documents securely",
        }),
        Route::Approvals => Some(Placeholder {
            icon: "✅",
            title: "Approvals & Compliance",
            description: "Track TNRERA, DTCP, and CMDA approvals",
        }),
        _ => None,
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub route: Route,
    pub auth_phase: AuthPhase,
    pub input_mode: InputMode,
    pub user: Option<UserProfile>,

    // Auth forms
    pub login: LoginForm,
    pub register: RegisterForm,
    pub auth_loading: bool,
    auth_task: Option<JoinHandle<Result<Session, AuthError>>>,
    auth_task_remember: bool,
    check_task: Option<JoinHandle<Result<UserProfile, AuthError>>>,

    // Dashboard state
    pub dashboard_input: String,
    pub dashboard_cursor: usize,
    pub prompt_state: ListState,

    // Chat state
    pub store: SessionStore,
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_focus: ChatFocus,
    pub chat_loading: bool,
    pub chat_error: Option<String>,
    chat_task: Option<JoinHandle<anyhow::Result<ChatReply>>>,
    pub sidebar_state: ListState,

    // Rename popup
    pub show_rename: bool,
    pub rename_input: String,
    pub rename_cursor: usize,
    pub rename_target: Option<i64>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Clients
    pub auth_client: AuthClient,
    pub assistant: AssistantClient,
    pub config: Config,
}

impl App {
    pub fn new(config: Config, store: SessionStore) -> Self {
        let auth_client = AuthClient::new(config.api_url());
        let assistant = AssistantClient::new(config.api_url());

        // A remembered token is validated against the identity service
        // before anything conclusive is rendered.
        let (auth_phase, check_task) = match config.access_token.clone() {
            Some(token) => {
                let client = auth_client.clone();
                let task = tokio::spawn(async move { client.me(&token).await });
                (AuthPhase::Checking, Some(task))
            }
            None => (AuthPhase::Unauthenticated, None),
        };

        let route = match auth_phase {
            AuthPhase::Unauthenticated => Route::Login,
            _ => Route::Dashboard,
        };

        Self {
            should_quit: false,
            route,
            auth_phase,
            input_mode: InputMode::Editing,
            user: None,

            login: LoginForm::default(),
            register: RegisterForm::default(),
            auth_loading: false,
            auth_task: None,
            auth_task_remember: false,
            check_task,

            dashboard_input: String::new(),
            dashboard_cursor: 0,
            prompt_state: ListState::default(),

            store,
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_focus: ChatFocus::Input,
            chat_loading: false,
            chat_error: None,
            chat_task: None,
            sidebar_state: ListState::default(),

            show_rename: false,
            rename_input: String::new(),
            rename_cursor: 0,
            rename_target: None,

            animation_frame: 0,

            auth_client,
            assistant,
            config,
        }
    }

    /// Navigate with the route guard applied: protected routes are only
    /// reachable while authenticated, everything else redirects to Login.
    pub fn navigate(&mut self, route: Route) {
        if route.is_protected() && self.auth_phase != AuthPhase::Authenticated {
            self.route = Route::Login;
            self.input_mode = InputMode::Editing;
            return;
        }
        self.route = route;
        self.input_mode = match route {
            Route::Login | Route::Register | Route::Chat => InputMode::Editing,
            _ => InputMode::Normal,
        };
        if route == Route::Chat {
            self.chat_focus = ChatFocus::Input;
        }
    }

    // --- Auth flows ---

    /// Submit the login form. Validation errors short-circuit before any
    /// network call; a duplicate submit while one is in flight is ignored.
    pub fn submit_login(&mut self) {
        if self.auth_task.is_some() {
            return;
        }
        self.login.error = None;

        if let Err(msg) = crate::auth::validate_login(&self.login.email, &self.login.password) {
            self.login.error = Some(msg);
            return;
        }

        self.auth_loading = true;
        self.auth_task_remember = self.login.remember;
        let client = self.auth_client.clone();
        let email = self.login.email.clone();
        let password = self.login.password.clone();
        self.auth_task = Some(tokio::spawn(async move {
            client.login(&email, &password).await
        }));
    }

    /// Submit the registration form. Same discipline as `submit_login`.
    pub fn submit_register(&mut self) {
        if self.auth_task.is_some() {
            return;
        }
        self.register.error = None;

        if let Err(msg) = crate::auth::validate_registration(
            &self.register.name,
            &self.register.email,
            &self.register.password,
            &self.register.confirm,
        ) {
            self.register.error = Some(msg);
            return;
        }

        self.auth_loading = true;
        self.auth_task_remember = false;
        let client = self.auth_client.clone();
        let name = self.register.name.trim().to_string();
        let email = self.register.email.clone();
        let password = self.register.password.clone();
        self.auth_task = Some(tokio::spawn(async move {
            client.register(&name, &email, &password).await
        }));
    }

    fn apply_session(&mut self, session: Session) {
        tracing::info!(user = %session.user.email, "authenticated");
        if self.auth_task_remember {
            if let Err(e) = Config::save_tokens(&session.access_token, &session.refresh_token) {
                tracing::warn!(error = %e, "failed to remember session");
            }
        }
        self.user = Some(session.user);
        self.auth_phase = AuthPhase::Authenticated;
        self.login = LoginForm::default();
        self.register = RegisterForm::default();
        self.navigate(Route::Dashboard);
    }

    // --- Dashboard / chat flows ---

    /// Open the chat view carrying `text` as the initial message, creating
    /// a conversation when none is active.
    pub fn open_chat_with(&mut self, text: String) {
        self.navigate(Route::Chat);
        if self.route != Route::Chat {
            return; // redirected by the guard
        }
        if self.store.active_id().is_none() {
            self.store.create_conversation();
        }
        self.send_chat_message(text);
    }

    /// Append the user message and ask the assistant backend for a reply.
    /// Refused while a send is already outstanding.
    pub fn send_chat_message(&mut self, text: String) {
        if text.is_empty() || self.chat_task.is_some() {
            return;
        }
        let Some(session_id) = self.store.active_id() else {
            return;
        };

        self.chat_error = None;
        self.store.append_message(Role::User, text.clone(), None);
        self.chat_loading = true;
        self.scroll_chat_to_bottom();

        let assistant = self.assistant.clone();
        self.chat_task = Some(tokio::spawn(async move {
            assistant.send(session_id, &text).await
        }));
    }

    pub fn new_chat(&mut self) {
        self.store.create_conversation();
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_scroll = 0;
        self.chat_error = None;
        self.sidebar_state.select(Some(0));
    }

    pub fn selected_conversation_id(&self) -> Option<i64> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.store.conversations().get(i))
            .map(|c| c.id)
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = self.store.conversations().len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    pub fn delete_selected_conversation(&mut self) {
        if let Some(id) = self.selected_conversation_id() {
            self.store.delete_conversation(id);
            let len = self.store.conversations().len();
            if len == 0 {
                self.sidebar_state.select(None);
            } else if let Some(i) = self.sidebar_state.selected() {
                self.sidebar_state.select(Some(i.min(len - 1)));
            }
        }
    }

    pub fn open_rename(&mut self) {
        if let Some(id) = self.selected_conversation_id() {
            let current = self
                .store
                .conversations()
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.title.clone())
                .unwrap_or_default();
            self.rename_cursor = current.chars().count();
            self.rename_input = current;
            self.rename_target = Some(id);
            self.show_rename = true;
        }
    }

    pub fn confirm_rename(&mut self) {
        if let Some(id) = self.rename_target.take() {
            let title = self.rename_input.trim().to_string();
            if !title.is_empty() {
                self.store.rename_conversation(id, title);
            }
        }
        self.show_rename = false;
        self.rename_input.clear();
        self.rename_cursor = 0;
    }

    // --- Background task polling ---

    /// Observe completed network tasks. Called from the event loop on every
    /// tick; all state mutation stays on the event-loop task.
    pub async fn poll_tasks(&mut self) {
        if let Some(task) = take_finished(&mut self.check_task) {
            match task.await {
                Ok(Ok(profile)) => {
                    tracing::info!(user = %profile.email, "remembered session is valid");
                    self.user = Some(profile);
                    self.auth_phase = AuthPhase::Authenticated;
                    self.navigate(Route::Dashboard);
                }
                Ok(Err(e)) => {
                    tracing::info!(error = %e, "remembered session rejected");
                    if let Err(e) = Config::clear_tokens() {
                        tracing::warn!(error = %e, "failed to clear remembered session");
                    }
                    self.auth_phase = AuthPhase::Unauthenticated;
                    self.navigate(Route::Login);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "session check task failed");
                    self.auth_phase = AuthPhase::Unauthenticated;
                    self.navigate(Route::Login);
                }
            }
        }

        if let Some(task) = take_finished(&mut self.auth_task) {
            self.auth_loading = false;
            match task.await {
                Ok(Ok(session)) => self.apply_session(session),
                Ok(Err(e)) => {
                    tracing::info!(error = %e, "authentication failed");
                    let message = e.to_string();
                    match self.route {
                        Route::Register => self.register.error = Some(message),
                        _ => self.login.error = Some(message),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "auth task failed");
                    self.login.error =
                        Some("Login failed. Please try again.".to_string());
                }
            }
        }

        if let Some(task) = take_finished(&mut self.chat_task) {
            self.chat_loading = false;
            match task.await {
                Ok(Ok(reply)) => {
                    self.store
                        .append_message(Role::Assistant, reply.message, reply.language);
                    self.scroll_chat_to_bottom();
                }
                Ok(Err(e)) => {
                    tracing::info!(error = %e, "assistant request failed");
                    self.chat_error = Some(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "chat task failed");
                    self.chat_error = Some("Request failed. Please try again.".to_string());
                }
            }
        }
    }

    pub fn has_pending_auth(&self) -> bool {
        self.auth_task.is_some()
    }

    pub fn has_pending_chat(&self) -> bool {
        self.chat_task.is_some()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat_loading || self.auth_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // --- Chat scrolling ---

    pub fn scroll_chat_down(&mut self) {
        let max = self.total_chat_lines().saturating_sub(self.chat_height);
        if self.chat_scroll < max {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll the transcript so the newest message (or the "Thinking..."
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let total = self.total_chat_lines();
        let visible = if self.chat_height > 0 { self.chat_height } else { 20 };
        if total > visible {
            self.chat_scroll = total.saturating_sub(visible);
        } else {
            self.chat_scroll = 0;
        }
    }

    fn total_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.store.messages() {
            total_lines += 1; // Role line ("You:" or "AI Assistant:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.chat_loading {
            total_lines += 2; // "AI Assistant:" + "Thinking..."
        }

        total_lines
    }
}

/// Take a task handle out of its slot once the task has run to completion,
/// so awaiting it never blocks the event loop.
fn take_finished<T>(slot: &mut Option<JoinHandle<T>>) -> Option<JoinHandle<T>> {
    if slot.as_ref().is_some_and(|t| t.is_finished()) {
        slot.take()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn app_in(dir: &tempfile::TempDir) -> App {
        let store = SessionStore::open(dir.path().join("chat_history.json"));
        App::new(Config::new(), store)
    }

    #[test]
    fn test_unauthenticated_start_lands_on_login() {
        let dir = tempdir().unwrap();
        let app = app_in(&dir);
        assert_eq!(app.auth_phase, AuthPhase::Unauthenticated);
        assert_eq!(app.route, Route::Login);
    }

    #[test]
    fn test_guard_redirects_protected_routes() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        for route in [
            Route::Dashboard,
            Route::Chat,
            Route::Properties,
            Route::Valuation,
            Route::Documents,
            Route::Approvals,
        ] {
            app.navigate(route);
            assert_eq!(app.route, Route::Login, "{:?} must be gated", route);
        }

        // Register is reachable without a session.
        app.navigate(Route::Register);
        assert_eq!(app.route, Route::Register);
    }

    #[test]
    fn test_guard_admits_authenticated_user() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = AuthPhase::Authenticated;

        app.navigate(Route::Dashboard);
        assert_eq!(app.route, Route::Dashboard);
        app.navigate(Route::Properties);
        assert_eq!(app.route, Route::Properties);
    }

    #[test]
    fn test_login_validation_skips_network() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.submit_login();
        assert_eq!(app.login.error.as_deref(), Some("Please fill in all fields"));
        assert!(!app.has_pending_auth());
        assert!(!app.auth_loading);
    }

    #[test]
    fn test_register_short_password_skips_network() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.navigate(Route::Register);
        app.register.name = "Priya".to_string();
        app.register.email = "priya@example.com".to_string();
        app.register.password = "abc".to_string();
        app.register.confirm = "abc".to_string();

        app.submit_register();
        assert_eq!(
            app.register.error.as_deref(),
            Some("Password must be at least 8 characters long")
        );
        assert!(!app.has_pending_auth());
    }

    #[test]
    fn test_successful_login_lands_on_dashboard() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.login.email = "priya@example.com".to_string();

        app.apply_session(Session {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            user: UserProfile {
                id: "1".to_string(),
                email: "priya@example.com".to_string(),
                name: "Priya".to_string(),
                created_at: "2026-08-27T00:00:00Z".to_string(),
            },
        });

        assert_eq!(app.auth_phase, AuthPhase::Authenticated);
        assert_eq!(app.route, Route::Dashboard);
        // The form is reset for the next session.
        assert!(app.login.email.is_empty());
    }

    #[tokio::test]
    async fn test_quick_prompt_opens_chat_with_message() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = AuthPhase::Authenticated;
        app.navigate(Route::Dashboard);

        let prompt = SUGGESTED_PROMPTS[2].prompt; // "How many square feet is 5 cents?"
        app.open_chat_with(prompt.to_string());

        assert_eq!(app.route, Route::Chat);
        assert_eq!(app.store.messages().len(), 1);
        assert_eq!(app.store.messages()[0].content, prompt);
        assert!(app.has_pending_chat());
        assert!(app.chat_loading);
    }

    #[tokio::test]
    async fn test_duplicate_send_is_ignored_while_pending() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);
        app.auth_phase = AuthPhase::Authenticated;
        app.open_chat_with("first".to_string());

        app.send_chat_message("second".to_string());
        assert_eq!(app.store.messages().len(), 1);
    }

    #[test]
    fn test_quick_prompt_while_logged_out_redirects() {
        let dir = tempdir().unwrap();
        let mut app = app_in(&dir);

        app.open_chat_with("How many square feet is 5 cents?".to_string());
        assert_eq!(app.route, Route::Login);
        assert!(app.store.messages().is_empty());
    }

    #[test]
    fn test_placeholders_exist_for_future_pages() {
        for route in [Route::Properties, Route::Valuation, Route::Documents, Route::Approvals] {
            assert!(placeholder_for(route).is_some());
        }
        assert!(placeholder_for(Route::Dashboard).is_none());
    }
}

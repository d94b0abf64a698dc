use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use promptengine_core::session::LogoutReason;
use promptengine_core::voice::select_recognizer;
use promptengine_core::{
    ApiClient, Config, GalleryPoller, GalleryState, GuardOutcome, HistoryView, UploadBanner,
    VoiceInput, Workspace,
};

use crate::tui::{self, AppEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Signup,
    Generator,
    Knowledge,
    History,
}

impl Screen {
    /// Screens that need a session token
    pub fn is_protected(&self) -> bool {
        !matches!(self, Screen::Login | Screen::Signup)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Login => "Sign in",
            Screen::Signup => "Create account",
            Screen::Generator => "Generator",
            Screen::Knowledge => "Knowledge Base",
            Screen::History => "History",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
    /// Pasted OAuth redirect URL (login screen only)
    Callback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Draft,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeInput {
    Paths,
    Note,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single text field with a character cursor
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// Text before the cursor, for placing the terminal cursor
    pub fn before_cursor(&self) -> &str {
        &self.value[..char_to_byte_index(&self.value, self.cursor)]
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Services
    pub client: ApiClient,
    pub config: Config,
    events: mpsc::UnboundedSender<AppEvent>,

    // Login / signup forms
    pub email: TextInput,
    pub password: TextInput,
    pub callback: TextInput,
    pub auth_field: AuthField,
    pub show_password: bool,
    pub auth_pending: bool,
    pub auth_error: Option<String>,
    pub auth_notice: Option<String>,
    pub oauth_url: Option<String>,

    // Generator / workspace state
    pub workspace: Workspace,
    pub query: TextInput,
    pub draft: TextInput,
    pub instruction: TextInput,
    pub focus: FocusPane,
    pub show_context: bool,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub draft_scroll: u16,
    pub voice: VoiceInput,

    // Knowledge base state
    pub gallery: GalleryState,
    pub gallery_state: ListState,
    poller: Option<GalleryPoller>,
    pub knowledge_input: KnowledgeInput,
    pub paths: TextInput,
    pub note: TextInput,
    pub uploads_in_flight: usize,
    pub upload_banner: Option<UploadBanner>,

    // History state
    pub history: HistoryView,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub list_area: Option<Rect>,
}

impl App {
    pub fn new(
        client: ApiClient,
        config: Config,
        events: mpsc::UnboundedSender<AppEvent>,
        outcome: &GuardOutcome,
    ) -> Self {
        let screen = match outcome {
            GuardOutcome::Authenticated { .. } => Screen::Generator,
            GuardOutcome::RedirectToLogin => Screen::Login,
        };
        let workspace = Workspace::new(config.model(), config.mode());
        let voice = VoiceInput::new(select_recognizer(&config));

        Self {
            should_quit: false,
            screen,
            input_mode: InputMode::Editing,

            client,
            config,
            events,

            email: TextInput::default(),
            password: TextInput::default(),
            callback: TextInput::default(),
            auth_field: AuthField::Email,
            show_password: false,
            auth_pending: false,
            auth_error: None,
            auth_notice: None,
            oauth_url: None,

            workspace,
            query: TextInput::default(),
            draft: TextInput::default(),
            instruction: TextInput::default(),
            focus: FocusPane::Chat,
            show_context: false,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            draft_scroll: 0,
            voice,

            gallery: GalleryState::default(),
            gallery_state: ListState::default(),
            poller: None,
            knowledge_input: KnowledgeInput::Paths,
            paths: TextInput::default(),
            note: TextInput::default(),
            uploads_in_flight: 0,
            upload_banner: None,

            history: HistoryView::new(),

            animation_frame: 0,

            chat_area: None,
            list_area: None,
        }
    }

    /// Sender handed to background tasks
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Switch screens. Protected screens fall back to login without a session;
    /// the gallery poller only lives while the knowledge screen is shown.
    pub fn switch_screen(&mut self, screen: Screen) -> Screen {
        let screen = if screen.is_protected() && !self.client.session().is_authenticated() {
            Screen::Login
        } else {
            screen
        };

        if self.screen == Screen::Knowledge && screen != Screen::Knowledge {
            self.stop_poller();
        }
        if screen == Screen::Knowledge && self.poller.is_none() {
            self.start_poller();
        }
        if screen == Screen::History && self.screen != Screen::History {
            self.history = HistoryView::new();
        }

        self.screen = screen;
        self.input_mode = match screen {
            Screen::History => InputMode::Normal,
            _ => InputMode::Editing,
        };
        if matches!(screen, Screen::Login | Screen::Signup) {
            self.auth_field = AuthField::Email;
        }
        screen
    }

    fn start_poller(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        tui::forward(rx, self.events.clone(), AppEvent::Gallery);
        let generation = self.gallery.restart();
        self.poller = Some(GalleryPoller::spawn(
            self.client.clone(),
            self.config.poll_interval(),
            generation,
            tx,
        ));
        tracing::debug!("Gallery polling started");
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
            tracing::debug!("Gallery polling stopped");
        }
    }

    /// Session ended: drop every authenticated view and show the login form
    pub fn force_login(&mut self, reason: LogoutReason) {
        self.stop_poller();
        self.workspace.reset();
        self.query.clear();
        self.draft.clear();
        self.instruction.clear();
        self.chat_scroll = 0;
        self.gallery = GalleryState::default();
        self.gallery_state = ListState::default();
        self.upload_banner = None;
        self.history = HistoryView::new();
        self.password.clear();
        self.auth_pending = false;
        self.auth_notice = None;
        self.auth_error = match reason {
            LogoutReason::Unauthorized => {
                Some("Your session has expired. Please log in again.".to_string())
            }
            LogoutReason::User => None,
        };
        self.switch_screen(Screen::Login);
    }

    // Auth form helpers
    pub fn next_auth_field(&mut self) {
        self.auth_field = match (self.screen, self.auth_field) {
            (_, AuthField::Email) => AuthField::Password,
            (Screen::Login, AuthField::Password) => AuthField::Callback,
            _ => AuthField::Email,
        };
    }

    pub fn prev_auth_field(&mut self) {
        self.auth_field = match (self.screen, self.auth_field) {
            (Screen::Login, AuthField::Email) => AuthField::Callback,
            (_, AuthField::Email) => AuthField::Password,
            (_, AuthField::Password) => AuthField::Email,
            (_, AuthField::Callback) => AuthField::Password,
        };
    }

    pub fn auth_input_mut(&mut self) -> &mut TextInput {
        match self.auth_field {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
            AuthField::Callback => &mut self.callback,
        }
    }

    // Workspace helpers
    /// Mirror the workspace draft into the editable pane
    pub fn sync_draft(&mut self) {
        self.draft.set(self.workspace.result.draft.clone());
    }

    pub fn commit_draft(&mut self) {
        self.workspace.edit_draft(self.draft.value.clone());
    }

    pub fn knowledge_input_mut(&mut self) -> &mut TextInput {
        match self.knowledge_input {
            KnowledgeInput::Paths => &mut self.paths,
            KnowledgeInput::Note => &mut self.note,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.workspace.is_generating()
            || self.workspace.is_refining()
            || self.uploads_in_flight > 0
            || self.auth_pending
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest turn is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;

        for msg in &self.workspace.transcript {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += (char_count / wrap_width) + 1;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.workspace.is_refining() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        let total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    // Gallery navigation
    pub fn gallery_nav_down(&mut self) {
        let len = self.gallery.documents.len();
        if len > 0 {
            let i = self.gallery_state.selected().unwrap_or(0);
            self.gallery_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn gallery_nav_up(&mut self) {
        let i = self.gallery_state.selected().unwrap_or(0);
        self.gallery_state.select(Some(i.saturating_sub(1)));
    }

    /// Keep the gallery selection inside the current list
    pub fn clamp_gallery_selection(&mut self) {
        let len = self.gallery.documents.len();
        match self.gallery_state.selected() {
            _ if len == 0 => self.gallery_state.select(None),
            None => self.gallery_state.select(Some(0)),
            Some(i) if i >= len => self.gallery_state.select(Some(len - 1)),
            Some(_) => {}
        }
    }
}

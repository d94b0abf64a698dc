use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc;

use promptengine_core::session::LogoutReason;
use promptengine_core::upload::{parse_path_list, upload_note, upload_paths};
use promptengine_core::{
    Config, GuardOutcome, HistoryView, OAuthProvider, PendingRefine, SessionEvent,
};

use crate::app::{App, AuthField, FocusPane, InputMode, KnowledgeInput, Screen, TextInput};
use crate::tui::{self, AppEvent};

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Session(SessionEvent::LoggedOut { reason }) => {
            app.force_login(reason);
        }
        AppEvent::LoggedIn(result) => {
            app.auth_pending = false;
            match result {
                Ok(()) => signed_in(app),
                Err(e) => {
                    tracing::warn!("Login failed: {}", e);
                    app.auth_error = Some(e.user_message());
                }
            }
        }
        AppEvent::Registered(result) => {
            app.auth_pending = false;
            match result {
                Ok(()) => {
                    app.password.clear();
                    app.switch_screen(Screen::Login);
                    app.auth_error = None;
                    app.auth_notice = Some("Account created. Please sign in.".to_string());
                }
                Err(e) => {
                    tracing::warn!("Registration failed: {}", e);
                    app.auth_error = Some(e.user_message());
                }
            }
        }
        AppEvent::Generated(result) => {
            app.workspace.finish_generate(result);
            if app.workspace.is_active() {
                app.sync_draft();
                app.draft_scroll = 0;
                app.focus = FocusPane::Chat;
                app.scroll_chat_to_bottom();
            }
        }
        AppEvent::Refined { epoch, result } => {
            app.workspace.finish_refine(epoch, result);
            app.sync_draft();
            app.scroll_chat_to_bottom();
        }
        AppEvent::Uploaded(banner) => {
            app.uploads_in_flight = app.uploads_in_flight.saturating_sub(1);
            if banner.is_some() {
                app.upload_banner = banner;
            }
        }
        AppEvent::Gallery(update) => {
            app.gallery.apply(update);
            app.clamp_gallery_selection();
        }
        AppEvent::History(result) => {
            app.history.apply(result);
        }
        AppEvent::Voice(event) => {
            // Dictation goes to whichever prompt field is on screen
            let target = if app.workspace.is_active() {
                &mut app.instruction
            } else {
                &mut app.query
            };
            app.voice.handle(event, &mut target.value);
            target.end();
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

    // Navbar: pure view switch, available on every authenticated screen
    if app.screen.is_protected() {
        match key.code {
            KeyCode::F(1) => {
                open_screen(app, Screen::Generator);
                return Ok(());
            }
            KeyCode::F(2) => {
                open_screen(app, Screen::Knowledge);
                return Ok(());
            }
            KeyCode::F(3) => {
                open_screen(app, Screen::History);
                return Ok(());
            }
            KeyCode::F(10) => {
                // The LoggedOut event moves us to the login screen
                if !app.client.session().logout() {
                    app.force_login(LogoutReason::User);
                }
                return Ok(());
            }
            _ => {}
        }
    }

    match app.screen {
        Screen::Login => handle_login(app, key),
        Screen::Signup => handle_signup(app, key),
        Screen::Generator => match app.input_mode {
            InputMode::Normal => handle_generator_normal(app, key),
            InputMode::Editing => handle_generator_editing(app, key),
        },
        Screen::Knowledge => match app.input_mode {
            InputMode::Normal => handle_knowledge_normal(app, key),
            InputMode::Editing => handle_knowledge_editing(app, key),
        },
        Screen::History => handle_history(app, key),
    }

    Ok(())
}

/// Switch screens and kick off whatever the new screen loads on entry
pub fn open_screen(app: &mut App, screen: Screen) {
    let previous = app.screen;
    let screen = app.switch_screen(screen);
    if screen == Screen::History && previous != Screen::History {
        load_history(app);
    }
}

/// Shared single-line editing keys. Returns true if the key was consumed.
fn edit_input(input: &mut TextInput, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => input.insert(c),
        _ => return false,
    }
    true
}

// Login and signup

fn handle_login(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('g') if ctrl => open_oauth(app, OAuthProvider::GitHub),
        KeyCode::Char('o') if ctrl => open_oauth(app, OAuthProvider::Google),
        KeyCode::Char('n') if ctrl => {
            app.switch_screen(Screen::Signup);
            app.auth_error = None;
            app.auth_notice = None;
        }
        KeyCode::Char('p') if ctrl => app.show_password = !app.show_password,
        KeyCode::Esc => {
            app.auth_error = None;
            app.auth_notice = None;
        }
        KeyCode::Tab | KeyCode::Down => app.next_auth_field(),
        KeyCode::BackTab | KeyCode::Up => app.prev_auth_field(),
        KeyCode::Enter => {
            if app.auth_field == AuthField::Callback {
                harvest_callback(app);
            } else {
                submit_login(app);
            }
        }
        _ => {
            edit_input(app.auth_input_mut(), key);
        }
    }
}

fn handle_signup(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            app.switch_screen(Screen::Login);
            app.auth_error = None;
        }
        KeyCode::Char('p') if ctrl => app.show_password = !app.show_password,
        KeyCode::Tab | KeyCode::Down => app.next_auth_field(),
        KeyCode::BackTab | KeyCode::Up => app.prev_auth_field(),
        KeyCode::Enter => submit_signup(app),
        _ => {
            edit_input(app.auth_input_mut(), key);
        }
    }
}

fn submit_login(app: &mut App) {
    if app.auth_pending {
        return;
    }
    let email = app.email.value.trim().to_string();
    let password = app.password.value.clone();
    if email.is_empty() || password.is_empty() {
        app.auth_error = Some("Email and password are required.".to_string());
        return;
    }

    app.auth_pending = true;
    app.auth_error = None;
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let result = client.login(&email, &password).await;
        let _ = tx.send(AppEvent::LoggedIn(result));
    });
}

fn submit_signup(app: &mut App) {
    if app.auth_pending {
        return;
    }
    let email = app.email.value.trim().to_string();
    let password = app.password.value.clone();
    if email.is_empty() || password.is_empty() {
        app.auth_error = Some("Email and password are required.".to_string());
        return;
    }

    app.auth_pending = true;
    app.auth_error = None;
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let result = client.register(&email, &password).await;
        let _ = tx.send(AppEvent::Registered(result));
    });
}

fn open_oauth(app: &mut App, provider: OAuthProvider) {
    let url = app.client.oauth_login_url(provider);
    if !open_in_browser(&url) {
        tracing::debug!("No browser opener available");
    }
    app.auth_error = None;
    app.auth_notice = Some(format!(
        "Continue with {} in your browser, then paste the final URL below.",
        provider.display_name()
    ));
    app.oauth_url = Some(url);
    app.auth_field = AuthField::Callback;
}

/// Take the token out of a pasted OAuth redirect URL
fn harvest_callback(app: &mut App) {
    let raw = app.callback.value.trim().to_string();
    if raw.is_empty() {
        return;
    }
    match app.client.session().guard(Some(&raw)) {
        GuardOutcome::Authenticated { cleaned_url } => {
            if let Some(url) = cleaned_url {
                tracing::info!(%url, "Signed in from OAuth callback");
            }
            app.callback.clear();
            signed_in(app);
        }
        GuardOutcome::RedirectToLogin => {
            app.auth_error = Some("That URL does not contain a login token.".to_string());
        }
    }
}

fn signed_in(app: &mut App) {
    app.password.clear();
    app.auth_error = None;
    app.auth_notice = None;
    app.oauth_url = None;
    open_screen(app, Screen::Generator);
}

// Generator and workspace

fn handle_generator_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            if !app.workspace.is_active() {
                app.query.end();
            }
        }
        KeyCode::Char('m') => cycle_model(app),
        KeyCode::Char('o') => cycle_mode(app),
        KeyCode::Char('v') => toggle_voice(app),
        KeyCode::Char('x') => {
            app.voice.dismiss_notice();
            app.workspace.clear_error();
        }
        _ if app.workspace.is_active() => handle_workspace_normal(app, key),
        _ => {}
    }
}

fn handle_workspace_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab => toggle_focus(app),
        KeyCode::Char('b') | KeyCode::Esc => {
            app.workspace.back();
            app.draft.clear();
            app.instruction.clear();
            app.chat_scroll = 0;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('r') => submit_generate(app),
        KeyCode::Char('c') => app.show_context = !app.show_context,
        KeyCode::Char('y') => copy_to_clipboard(&app.workspace.result.draft),
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Chat => app.chat_scroll = app.chat_scroll.saturating_add(1),
            FocusPane::Draft => app.draft_scroll = app.draft_scroll.saturating_add(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Chat => app.chat_scroll = app.chat_scroll.saturating_sub(1),
            FocusPane::Draft => app.draft_scroll = app.draft_scroll.saturating_sub(1),
        },
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') => match app.focus {
            FocusPane::Chat => app.chat_scroll = 0,
            FocusPane::Draft => app.draft_scroll = 0,
        },
        _ => {}
    }
}

fn handle_generator_editing(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Esc {
        app.input_mode = InputMode::Normal;
        return;
    }
    if key.code == KeyCode::Char('r') && ctrl {
        toggle_voice(app);
        return;
    }

    if !app.workspace.is_active() {
        match key.code {
            KeyCode::Enter => submit_generate(app),
            KeyCode::Tab => cycle_model(app),
            KeyCode::BackTab => cycle_mode(app),
            _ => {
                edit_input(&mut app.query, key);
            }
        }
        return;
    }

    match (app.focus, key.code) {
        (_, KeyCode::Tab) => toggle_focus(app),
        (FocusPane::Chat, KeyCode::Enter) => submit_refine(app),
        (FocusPane::Chat, _) => {
            edit_input(&mut app.instruction, key);
        }
        (FocusPane::Draft, KeyCode::Enter) => {
            app.draft.insert('\n');
            app.commit_draft();
        }
        (FocusPane::Draft, _) => {
            if edit_input(&mut app.draft, key) {
                app.commit_draft();
            }
        }
    }
}

fn toggle_focus(app: &mut App) {
    app.focus = match app.focus {
        FocusPane::Chat => {
            app.draft.end();
            FocusPane::Draft
        }
        FocusPane::Draft => {
            app.commit_draft();
            FocusPane::Chat
        }
    };
}

fn cycle_model(app: &mut App) {
    let model = app.workspace.model.next();
    app.workspace.model = model;
    if let Err(e) = Config::save_default_model(model) {
        tracing::warn!("Could not save default model: {}", e);
    }
}

fn cycle_mode(app: &mut App) {
    let mode = app.workspace.mode.next();
    app.workspace.mode = mode;
    if let Err(e) = Config::save_default_mode(mode) {
        tracing::warn!("Could not save default mode: {}", e);
    }
}

fn toggle_voice(app: &mut App) {
    let (tx, rx) = mpsc::unbounded_channel();
    tui::forward(rx, app.sender(), AppEvent::Voice);
    app.voice.toggle(tx);
}

fn submit_generate(app: &mut App) {
    app.workspace.query = app.query.value.clone();
    let Some(request) = app.workspace.begin_generate() else {
        return;
    };

    // Spawn background task for the generate call
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let result = client.generate(&request).await;
        let _ = tx.send(AppEvent::Generated(result));
    });
}

fn submit_refine(app: &mut App) {
    let instruction = app.instruction.value.clone();
    let Some(PendingRefine { epoch, request }) = app.workspace.begin_refine(&instruction) else {
        return;
    };
    app.instruction.clear();

    // Scroll to bottom so "Thinking..." is visible
    app.scroll_chat_to_bottom();

    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let result = client.refine(&request).await;
        let _ = tx.send(AppEvent::Refined { epoch, result });
    });
}

// Knowledge base

fn handle_knowledge_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Tab => toggle_knowledge_input(app),
        KeyCode::Char('j') | KeyCode::Down => app.gallery_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.gallery_nav_up(),
        KeyCode::Char('x') => app.upload_banner = None,
        _ => {}
    }
}

fn handle_knowledge_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Tab => toggle_knowledge_input(app),
        KeyCode::Enter => match app.knowledge_input {
            KnowledgeInput::Paths => submit_upload(app),
            KnowledgeInput::Note => submit_note(app),
        },
        _ => {
            edit_input(app.knowledge_input_mut(), key);
        }
    }
}

fn toggle_knowledge_input(app: &mut App) {
    app.knowledge_input = match app.knowledge_input {
        KnowledgeInput::Paths => KnowledgeInput::Note,
        KnowledgeInput::Note => KnowledgeInput::Paths,
    };
}

fn submit_upload(app: &mut App) {
    let paths = parse_path_list(&app.paths.take());
    if paths.is_empty() {
        return;
    }

    app.upload_banner = None;
    app.uploads_in_flight += 1;
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let banner = upload_paths(&client, paths).await;
        let _ = tx.send(AppEvent::Uploaded(banner));
    });
}

fn submit_note(app: &mut App) {
    let text = app.note.take();
    if text.trim().is_empty() {
        return;
    }

    app.upload_banner = None;
    app.uploads_in_flight += 1;
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let banner = upload_note(&client, &text).await;
        let _ = tx.send(AppEvent::Uploaded(banner));
    });
}

// History

fn handle_history(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.history.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.history.select_prev(),
        KeyCode::Enter | KeyCode::Char(' ') => app.history.toggle_selected(),
        KeyCode::Char('r') => {
            app.history = HistoryView::new();
            load_history(app);
        }
        KeyCode::Char('c') => continue_selected(app),
        _ => {}
    }
}

fn load_history(app: &mut App) {
    let client = app.client.clone();
    let tx = app.sender();
    tokio::spawn(async move {
        let result = client.history().await;
        let _ = tx.send(AppEvent::History(result));
    });
}

/// Load the selected exchange into the workspace, replacing any open draft
fn continue_selected(app: &mut App) {
    let Some(record) = app.history.selected_record().cloned() else {
        return;
    };
    app.workspace.continue_from(&record);
    app.query.set(app.workspace.query.clone());
    app.sync_draft();
    app.instruction.clear();
    app.focus = FocusPane::Chat;
    open_screen(app, Screen::Generator);
    app.scroll_chat_to_bottom();
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling
    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_list = app.list_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => match app.screen {
            Screen::Generator if in_chat => app.chat_scroll = app.chat_scroll.saturating_add(3),
            Screen::Knowledge if in_list => app.gallery_nav_down(),
            Screen::History if in_list => app.history.select_next(),
            _ => {}
        },
        MouseEventKind::ScrollUp => match app.screen {
            Screen::Generator if in_chat => app.chat_scroll = app.chat_scroll.saturating_sub(3),
            Screen::Knowledge if in_list => app.gallery_nav_up(),
            Screen::History if in_list => app.history.select_prev(),
            _ => {}
        },
        _ => {}
    }
}

fn open_in_browser(url: &str) -> bool {
    use std::process::{Command, Stdio};

    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    Command::new(opener)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .is_ok()
}

fn copy_to_clipboard(text: &str) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
        ("pbcopy", &[])
    } else {
        ("xclip", &["-selection", "clipboard"])
    };

    if let Ok(mut child) = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
    {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(text.as_bytes());
        }
    }
}

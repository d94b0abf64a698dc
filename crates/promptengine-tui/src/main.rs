use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use promptengine_core::config::API_URL_ENV;
use promptengine_core::{ApiClient, Config, FileTokenStore, GuardOutcome, Session};
use tui::{AppEvent, EventHandler, Tui};

/// File holding the session token, next to config.json
const STORAGE_FILE: &str = "storage.json";

#[derive(Parser)]
#[command(name = "promptengine")]
#[command(version, about = "Terminal client for the RAG prompt engine")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// OAuth redirect URL carrying a `token` query parameter
    #[arg(long)]
    callback_url: Option<String>,

    /// Log filter, e.g. "debug" or "promptengine_core=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Clear the stored session and start at the login screen
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load().unwrap_or_else(|_| Config::new());
    let _log_guard = logging::init(&config, cli.log_level.as_deref())?;

    let base_url = config.resolve_base_url(cli.api_url.as_deref());
    tracing::info!("Starting promptengine v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("API base URL: {}", base_url);

    let session = Session::new(FileTokenStore::new(Config::config_dir()?.join(STORAGE_FILE)));
    if cli.logout && session.logout() {
        tracing::info!("Stored session cleared");
    }

    let outcome = session.guard(cli.callback_url.as_deref());
    if let GuardOutcome::Authenticated { cleaned_url: Some(url) } = &outcome {
        tracing::info!(%url, "Signed in from OAuth callback");
    }
    let client = ApiClient::new(&base_url, session.clone());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    forward_session_events(&session, &events);

    let mut app = App::new(client, config, events.sender(), &outcome);
    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// Relay session broadcasts (logout after a 401) into the UI event stream
fn forward_session_events(session: &Session, events: &EventHandler) {
    let mut rx = session.subscribe();
    let tx = events.sender();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if tx.send(AppEvent::Session(event)).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

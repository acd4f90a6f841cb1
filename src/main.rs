use anyhow::Result;
use std::fs;
use std::sync::Mutex;

mod app;
mod assistant;
mod auth;
mod config;
mod handler;
mod session;
mod tui;
mod ui;

use app::App;
use config::Config;
use session::SessionStore;
use tui::EventHandler;

/// Log to a file under the data directory; stdout and stderr belong to the
/// terminal UI. Best-effort: the app runs fine without logs.
fn init_logging() {
    let Some(dir) = dirs::data_dir().map(|d| d.join("purityprop")) else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    if let Ok(file) = fs::File::create(dir.join("purityprop.log")) {
        let _ = tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .try_init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        Config::new()
    });
    tracing::info!(api_url = config.api_url(), "starting purityprop");

    let store = SessionStore::open(SessionStore::default_path()?);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(config, store);

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        // Observe completed login/register/chat tasks before drawing so
        // their results show up on the next frame.
        app.poll_tasks().await;

        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

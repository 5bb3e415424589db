use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use acechat_core::{HttpBackend, Session, SessionEvent, SettingsStore};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod handler;
mod markup;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::{EventHandler, Tui};

const LOG_ENV: &str = "ACECHAT_LOG";
const DEFAULT_LOG_FILTER: &str = "acechat=info,acechat_core=info";

#[derive(Parser)]
#[command(name = "acechat")]
#[command(about = "Terminal client for the ACE AI chat server")]
#[command(version)]
struct Cli {
    /// Chat server base URL (overrides ACECHAT_URL and the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// Write logs here instead of the cache directory
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("warning: ignoring config file: {e:#}");
        Config::new()
    });

    let log_path = cli.log_file.clone().unwrap_or_else(|| config.log_path());
    init_logging(&log_path)?;

    let server_url = cli.url.unwrap_or_else(|| config.server_url());
    info!(%server_url, log = %log_path.display(), "starting acechat");

    let backend = HttpBackend::new(&server_url, config.request_timeout())
        .context("building HTTP client")?;
    let store = SettingsStore::default_location().context("locating settings store")?;
    let (session, session_rx) = Session::new(Arc::new(backend), store);
    let mut app = App::new(session, server_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, session_rx).await;

    tui::restore()?;
    info!("acechat exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    mut session_rx: UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            Some(event) = session_rx.recv() => app.on_session_event(event),
        }

        // Drain whatever else arrived so a fast stream paints once per batch
        while let Ok(event) = session_rx.try_recv() {
            app.on_session_event(event);
        }
    }

    Ok(())
}

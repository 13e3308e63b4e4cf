mod api;
mod app;
mod config;
mod error;
mod fetch;
mod guard;
mod models;
mod parser;
mod schedule;
mod session;
mod ui;
mod upsell;

use crate::api::ApiClient;
use crate::app::App;
use crate::config::Config;
use crate::session::{Session, TokenStore};
use anyhow::Context;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

struct Args {
    debug: bool,
    callback: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Args {
            debug: false,
            callback: None,
        };
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--callback" => args.callback = iter.next(),
                _ => {}
            }
        }
        args
    }
}

// Logs go to a file so they never draw over the terminal UI.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let path = config.log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("todo_tui=debug"));
    fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    if args.debug {
        init_logging(&config)?;
    }
    tracing::info!(api_url = %config.api_url, "starting");

    let api = ApiClient::new(&config.api_url);
    let store = match &config.token_file {
        Some(path) => TokenStore::file(path.clone()),
        None => TokenStore::keyring()?,
    };
    tracing::debug!(base_url = %api.base_url(), %store, "session setup");
    let mut session = Session::new(api, store);
    let outcome = session.load().await;
    tracing::info!(authenticated = outcome.is_authenticated(), "session loaded");

    let mut app = App::new(session, config);
    app.start(outcome);
    if let Some(url) = &args.callback {
        app.handle_callback(url);
    }

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal error");
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

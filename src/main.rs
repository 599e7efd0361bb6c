use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

mod app;
mod client;
mod config;
mod handler;
mod markdown;
mod tui;
mod ui;

use app::{App, DEFAULT_ENDPOINT};
use config::Config;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "mcp-chat")]
#[command(about = "Chat with a configurable HTTP endpoint from the terminal")]
struct Cli {
    /// Endpoint URL that receives prompts
    #[arg(long)]
    endpoint: Option<String>,

    /// Write debug logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        init_logging(path)?;
    }

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let endpoint = cli
        .endpoint
        .or(config.endpoint)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let app = App::new(endpoint);
    let result = run(&mut terminal, app).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, mut app: App) -> Result<()> {
    let mut events = EventHandler::new();

    loop {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mcp_chat=debug")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

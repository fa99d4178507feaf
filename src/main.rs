mod app;
mod dom;
mod event;
mod extractor;
mod lifecycle;
mod mode;
mod observe;
mod protocol;
mod simulator;
mod state;
mod text_utils;
mod ui;

use crate::app::App;
use crate::dom::PageHandle;
use crate::lifecycle::LifecycleConfig;
use crate::simulator::Simulator;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Print events and serve requests as JSON lines (default is the terminal mini-player)
    #[arg(long)]
    pub pipe: bool,
    /// Mirror a saved HTML page instead of the live simulated player
    #[arg(long, env = "PIP_MIRROR_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,
    /// Enable diagnostic logging (stderr unless --log-file is given)
    #[arg(long)]
    pub debug_log: bool,
    /// Write diagnostic logs to this file
    #[arg(long, requires = "debug_log")]
    pub log_file: Option<PathBuf>,
    /// Replace lyric lines without the cross-fade
    #[arg(long = "no-transitions")]
    pub no_transitions: bool,
    /// Mini-player width in columns
    #[arg(long, default_value_t = 48)]
    pub width: u16,
    /// Mini-player height in rows
    #[arg(long, default_value_t = 12)]
    pub height: u16,
    /// Make the simulated page reload its app shell every N seconds
    #[arg(long, value_name = "SECS")]
    pub shell_reload_secs: Option<u64>,
}

fn init_logging(cfg: &Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !cfg.debug_log {
        return Ok(());
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pip_mirror=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match &cfg.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cfg = Config::parse();
    init_logging(&cfg)?;

    let (page, simulation) = match &cfg.snapshot {
        Some(path) => {
            let html = std::fs::read_to_string(path)?;
            tracing::info!(path = %path.display(), "Mirroring snapshot");
            (PageHandle::new(dom::html::parse_document(&html)), None)
        }
        None => {
            let sim = Simulator::new();
            let page = sim.page();
            let reload = cfg.shell_reload_secs.filter(|s| *s > 0).map(Duration::from_secs);
            (page, Some(sim.spawn(reload)))
        }
    };

    let app = App::start(page, LifecycleConfig::default());
    let result = if cfg.pipe {
        crate::ui::display_pipe(&app).await
    } else {
        let view = crate::ui::ViewConfig {
            width: cfg.width,
            height: cfg.height,
            transitions: !cfg.no_transitions,
        };
        crate::ui::display_mini_player(&app, view).await
    };

    app.shutdown().await;
    if let Some(simulation) = simulation {
        simulation.abort();
    }

    // Print error if any, for better diagnostics
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}

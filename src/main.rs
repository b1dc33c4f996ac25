//! Padchat CLI
//!
//! Gamepad-style chat client for OpenAI-compatible endpoints, driven from
//! the keyboard in a terminal.

use clap::Parser;
use padchat::camera::StillCamera;
use padchat::keyboard::LineEditor;
use padchat::pipeline::HttpTransport;
use padchat::ui::UiContext;
use padchat::{App, PadchatConfig, Tuning};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Padchat - chat with a language model using only a pad
#[derive(Parser, Debug)]
#[command(name = "padchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for sessions, settings, tuning and photos
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Chat endpoint to use for this run (not persisted until edited)
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory of images served as camera frames
    #[arg(long)]
    camera_dir: Option<PathBuf>,

    /// Frames per second (overrides tuning.toml)
    #[arg(long)]
    fps: Option<u32>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log file (defaults to padchat.log in the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find a data directory"))?
            .join("padchat"),
    };
    fs::create_dir_all(&data_dir)?;

    init_logging(&cli.log_file.unwrap_or_else(|| data_dir.join("padchat.log")), cli.verbose)?;
    info!("Starting Padchat {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", data_dir);

    let mut config = PadchatConfig::new(data_dir);
    let mut tuning = Tuning::load(&config.tuning_file()).await?;
    if let Some(fps) = cli.fps {
        tuning.fps = fps.max(1);
    }
    config = config.with_tuning(tuning);
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint_override(endpoint);
    }
    if let Some(dir) = cli.camera_dir {
        config = config.with_camera_dir(dir);
    }

    let transport = Arc::new(HttpTransport::new());
    let camera = Box::new(StillCamera::new(config.camera_dir.clone()));
    let keyboard = Box::new(LineEditor::new());
    let mut app = App::new(config, transport, camera, keyboard).await;

    let mut ui = UiContext::new()?;
    let result = app.run(&mut ui).await;
    drop(ui);

    if let Err(e) = &result {
        error!("Frame loop failed: {}", e);
    }
    info!("Padchat stopped");
    Ok(result?)
}

/// Send logs to a file; the terminal belongs to the UI.
fn init_logging(path: &Path, verbose: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

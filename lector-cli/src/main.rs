use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod narrate;
#[cfg(feature = "playback")]
mod speak;

#[derive(Parser, Debug)]
#[command(name = "lector")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lector - sentence-level narration of plain text documents")]
struct Args {
    /// Settings file to use instead of ~/.lector/settings.toml
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sentences of each paragraph as JSON lines
    Split { file: PathBuf },

    /// Print the spoken form of some text and its offset mapping
    Normalize { text: String },

    /// Synthesize a document into a WAV file
    Narrate(narrate::NarrateArgs),

    /// Read a document aloud on the default output device
    #[cfg(feature = "playback")]
    Speak(speak::SpeakArgs),
}

fn main() -> Result<()> {
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let local = tokio::task::LocalSet::new();
        local.run_until(async_main()).await
    })
}

async fn async_main() -> Result<()> {
    let args = Args::parse();
    info!(command = ?args.command, settings = ?args.settings, "CLI startup");

    match args.command {
        Command::Split { file } => commands::split(&file),
        Command::Normalize { text } => commands::normalize(&text),
        Command::Narrate(narrate) => narrate::run(narrate, args.settings).await,
        #[cfg(feature = "playback")]
        Command::Speak(speak) => speak::run(speak, args.settings).await,
    }
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let trace_dir = PathBuf::from(home).join(".lector").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("lector.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}

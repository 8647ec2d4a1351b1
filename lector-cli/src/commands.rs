use anyhow::{Context, Result};
use lector_core::coordinator::CoordinatorEvent;
use lector_core::settings::{SettingsManager, SynthesizerConfig};
use lector_core::synthesis::{create_synthesizer, MockBehavior, MockSynthesizer, Synthesizer};
use lector_core::{split_sentences, Document, Settings, TextNormalizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn split(file: &Path) -> Result<()> {
    let document = Document::from_file(file)?;
    for (index, paragraph) in document.paragraphs.iter().enumerate() {
        for chunk in split_sentences(index, paragraph) {
            println!("{}", serde_json::to_string(&chunk)?);
        }
    }
    Ok(())
}

pub fn normalize(text: &str) -> Result<()> {
    let normalized = TextNormalizer::new().normalize(text);
    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}

pub fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let manager = match path {
        Some(path) => SettingsManager::from_path(path)?,
        None => SettingsManager::new()?,
    };
    Ok(manager.settings())
}

/// The synthesizer named in settings, or the mock when asked for one.
pub fn resolve_synthesizer(settings: &Settings, mock: bool) -> Result<Arc<dyn Synthesizer>> {
    if mock {
        return Ok(Arc::new(MockSynthesizer::new(MockBehavior::Success)));
    }

    let config = settings.active_synthesizer_config().context(
        "No synthesizer configured. Add a [synthesizers.<name>] entry to settings or pass --mock",
    )?;
    if let SynthesizerConfig::Sidecar { command } = config {
        tracing::info!(command, "Using sidecar synthesizer");
    }
    create_synthesizer(config)
}

/// Prints coordinator problems to stderr as they happen.
pub fn report_events(mut events: mpsc::UnboundedReceiver<CoordinatorEvent>) {
    tokio::task::spawn_local(async move {
        while let Some(event) = events.recv().await {
            match event {
                CoordinatorEvent::SentenceFailed {
                    paragraph,
                    sentence,
                    error,
                } => eprintln!("warning: skipped sentence {paragraph}:{sentence}: {error}"),
                CoordinatorEvent::PlaybackError { message, .. } => eprintln!("error: {message}"),
                event => tracing::debug!(?event, "Coordinator event"),
            }
        }
    });
}

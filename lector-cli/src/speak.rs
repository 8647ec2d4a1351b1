use anyhow::Result;
use clap::Args;
use lector_core::coordinator::SentenceKey;
use lector_core::playback::{DeviceOutput, HighlightTarget, PlaybackConsumer, PlaybackEvent, PlaybackOutcome};
use lector_core::{Document, SynthesisCoordinator};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::commands::{load_settings, report_events, resolve_synthesizer};

#[derive(Args, Debug)]
pub struct SpeakArgs {
    file: PathBuf,

    /// Paragraph to start reading at
    #[arg(long, default_value_t = 0)]
    paragraph: usize,

    #[arg(long)]
    speed: Option<f32>,

    #[arg(long)]
    mock: bool,
}

pub async fn run(args: SpeakArgs, settings_path: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings(settings_path)?;
    if let Some(speed) = args.speed {
        settings.playback.speed = speed;
    }

    let document = Document::from_file(&args.file)?;
    let paragraphs = document.paragraphs.clone();

    let (coordinator, events) = SynthesisCoordinator::builder()
        .synthesizer(resolve_synthesizer(&settings, args.mock)?)
        .settings(&settings)
        .document(document)
        .build()?;
    report_events(events);

    let (consumer, playback_events) =
        PlaybackConsumer::new(coordinator.clone(), DeviceOutput::new()?, paragraphs.len());
    let mut consumer = consumer.with_highlight(settings.playback.highlight);
    print_highlights(playback_events, paragraphs);

    coordinator.start(args.paragraph).await?;
    match consumer.play_from(SentenceKey::start_of(args.paragraph)).await? {
        PlaybackOutcome::Completed => println!(),
        PlaybackOutcome::Interrupted { resume_at } => {
            println!();
            eprintln!("Playback interrupted at {resume_at:?}");
        }
    }
    Ok(())
}

/// Echoes each highlighted word, breaking lines between paragraphs.
fn print_highlights(mut events: mpsc::UnboundedReceiver<PlaybackEvent>, paragraphs: Vec<String>) {
    tokio::task::spawn_local(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = events.recv().await {
            match event {
                PlaybackEvent::Highlight(HighlightTarget::Word { key, range, .. })
                | PlaybackEvent::Highlight(HighlightTarget::Sentence { key, range }) => {
                    let Some(text) = paragraphs.get(key.paragraph) else {
                        continue;
                    };
                    let piece: String = text.chars().skip(range.start).take(range.len()).collect();
                    let _ = write!(stdout, "{piece} ");
                    let _ = stdout.flush();
                }
                PlaybackEvent::ParagraphFinished(_) => {
                    let _ = writeln!(stdout, "\n");
                }
                _ => {}
            }
        }
    });
}

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use hound::{SampleFormat, WavSpec, WavWriter};
use lector_core::alignment::ParagraphSynthesisResult;
use lector_core::synthesis::AudioBuffer;
use lector_core::{Document, SynthesisCoordinator};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands::{load_settings, report_events, resolve_synthesizer};

#[derive(Args, Debug)]
pub struct NarrateArgs {
    /// Plain text document; paragraphs are separated by blank lines
    file: PathBuf,

    /// WAV file to write
    #[arg(long)]
    out: PathBuf,

    /// Narrate only this paragraph
    #[arg(long)]
    paragraph: Option<usize>,

    #[arg(long)]
    speed: Option<f32>,

    #[arg(long)]
    voice: Option<String>,

    /// Write per-paragraph word timings here, one JSON object per line
    #[arg(long, value_name = "JSONL")]
    timings: Option<PathBuf>,

    /// Use the built-in test tone synthesizer
    #[arg(long)]
    mock: bool,
}

pub async fn run(args: NarrateArgs, settings_path: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings(settings_path)?;
    if let Some(speed) = args.speed {
        settings.playback.speed = speed;
    }
    if args.voice.is_some() {
        settings.playback.voice = args.voice.clone();
    }

    let document = Document::from_file(&args.file)?;
    let paragraphs = match args.paragraph {
        Some(p) if p >= document.len() => {
            anyhow::bail!("Paragraph {p} out of range, document has {}", document.len())
        }
        Some(p) => p..p + 1,
        None => 0..document.len(),
    };

    let (coordinator, events) = SynthesisCoordinator::builder()
        .synthesizer(resolve_synthesizer(&settings, args.mock)?)
        .settings(&settings)
        .document(document)
        .build()?;
    report_events(events);

    let mut timings = args
        .timings
        .as_ref()
        .map(|path| {
            File::create(path)
                .map(BufWriter::new)
                .with_context(|| format!("Failed to create {path:?}"))
        })
        .transpose()?;

    let mut audio: Option<AudioBuffer> = None;
    coordinator.start(paragraphs.start).await?;

    for paragraph in paragraphs {
        let result = narrate_paragraph(&coordinator, paragraph, &mut audio).await?;
        info!(paragraph, sentences = result.sentences.len(), seconds = result.duration, "Narrated paragraph");
        if let Some(writer) = timings.as_mut() {
            writeln!(writer, "{}", serde_json::to_string(&result)?)?;
        }
    }

    if let Some(writer) = timings.as_mut() {
        writer.flush()?;
    }

    let Some(audio) = audio else {
        anyhow::bail!("Nothing could be synthesized");
    };
    write_wav(&args.out, &audio)?;
    println!("Wrote {:.1}s of audio to {}", audio.duration(), args.out.display());
    Ok(())
}

async fn narrate_paragraph(
    coordinator: &SynthesisCoordinator,
    paragraph: usize,
    audio: &mut Option<AudioBuffer>,
) -> Result<ParagraphSynthesisResult> {
    let mut result = ParagraphSynthesisResult::new(paragraph);
    let mut stream = coordinator.stream(paragraph);

    while let Some(sentence) = stream.next().await {
        if let Some(buffer) = audio.as_mut() {
            buffer.append(&sentence.audio)?;
        } else {
            *audio = Some(sentence.audio.clone());
        }
        result.push(&sentence)?;
        stream.report_finished(sentence.sentence_index)?;
    }

    Ok(result)
}

fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("Failed to create {path:?}"))?;
    for sample in audio.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finish WAV file")?;
    Ok(())
}

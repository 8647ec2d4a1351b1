//! Synthesis through an external engine process.
//!
//! One process is spawned per sentence. The request is written to its stdin
//! as a single JSON line, then stdin is closed. The process answers on stdout
//! with JSON lines tagged by `type`:
//!
//! - `audio`: `pcm_base64` (s16le), `sample_rate`, `channels`
//! - `phonemes`: `phonemes`, a list of timed phonemes with char offsets
//! - `done`: the utterance is complete
//! - `error`: `message`

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::SynthesisError;
use super::provider::Synthesizer;
use super::types::{
    collect_stream, AudioBuffer, PhonemeEvent, SynthesisEvent, SynthesisRequest, SynthesisStream,
    SynthesizedAudio,
};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SidecarRequest<'a> {
    Synthesize {
        text: &'a str,
        voice: Option<&'a str>,
        speed: f32,
        want_timing: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SidecarMessage {
    Audio {
        pcm_base64: String,
        sample_rate: u32,
        #[serde(default = "default_channels")]
        channels: u16,
    },
    Phonemes {
        phonemes: Vec<PhonemeEvent>,
    },
    Done,
    Error {
        message: String,
    },
}

fn default_channels() -> u16 {
    1
}

pub struct SidecarSynthesizer {
    program: String,
    args: Vec<String>,
}

impl SidecarSynthesizer {
    /// `command` is split with shell quoting rules, e.g.
    /// `python3 "/opt/tts/engine.py" --model en`.
    pub fn new(command: &str) -> anyhow::Result<Self> {
        let mut parts = shell_words::split(command)
            .map_err(|e| anyhow!("Failed to parse sidecar command: {e:?}"))?;
        if parts.is_empty() {
            return Err(anyhow!("Sidecar command is empty"));
        }
        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    fn spawn(&self) -> anyhow::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn synthesis sidecar '{}'", self.program))
    }
}

#[async_trait]
impl Synthesizer for SidecarSynthesizer {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError> {
        let stream = self.synthesize_stream(request).await?;
        collect_stream(stream).await
    }

    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<SynthesisStream, SynthesisError> {
        let mut child = self.spawn().map_err(SynthesisError::Engine)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SynthesisError::Engine(anyhow!("Sidecar stdin is unavailable")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SynthesisError::Engine(anyhow!("Sidecar stdout is unavailable")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SynthesisError::Engine(anyhow!("Sidecar stderr is unavailable")))?;
        let stderr_handle = tokio::spawn(drain_stderr(stderr));

        let mut line = serde_json::to_vec(&SidecarRequest::Synthesize {
            text: &request.text,
            voice: request.voice.as_deref(),
            speed: request.speed,
            want_timing: request.want_timing,
        })?;
        line.push(b'\n');

        debug!(program = %self.program, chars = request.text.chars().count(), "Sending sentence to sidecar");
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        drop(stdin);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_stdout(child, stdout, stderr_handle, tx));
        Ok(SynthesisStream::new(rx))
    }
}

/// Reads stderr to the end while stdout is being consumed, so a chatty engine
/// never blocks on a full pipe.
async fn drain_stderr(stderr: ChildStderr) -> String {
    let mut buf = String::new();
    let mut reader = BufReader::new(stderr);
    if let Err(e) = reader.read_to_string(&mut buf).await {
        warn!(error = ?e, "Failed reading sidecar stderr");
    }
    buf
}

/// Forwards sidecar output until `done`, an error, or the receiver hanging up.
/// Owning `child` here means a dropped stream kills the process.
async fn pump_stdout(
    mut child: Child,
    stdout: ChildStdout,
    stderr_handle: JoinHandle<String>,
    tx: mpsc::UnboundedSender<Result<SynthesisEvent, SynthesisError>>,
) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                stderr_handle.abort();
                let _ = tx.send(Err(e.into()));
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                stderr_handle.abort();
                let _ = tx.send(Err(e));
                return;
            }
        };

        let finished = matches!(event, SynthesisEvent::Finished);
        if tx.send(Ok(event)).is_err() {
            debug!("Synthesis stream dropped, stopping sidecar");
            stderr_handle.abort();
            return;
        }
        if finished {
            let _ = child.wait().await;
            return;
        }
    }

    // EOF without `done`: report how the process ended.
    let status = child.wait().await;
    let stderr = match stderr_handle.await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = ?e, "Failed awaiting sidecar stderr");
            String::new()
        }
    };
    let error = match status {
        Ok(status) if !status.success() => {
            SynthesisError::Engine(anyhow!("Sidecar exited with {status}: {}", stderr.trim()))
        }
        Ok(_) => SynthesisError::StreamClosed,
        Err(e) => e.into(),
    };
    let _ = tx.send(Err(error));
}

fn parse_line(line: &str) -> Result<Option<SynthesisEvent>, SynthesisError> {
    let message: SidecarMessage = serde_json::from_str(line)?;
    let event = match message {
        SidecarMessage::Audio {
            pcm_base64,
            sample_rate,
            channels,
        } => {
            let pcm_data = BASE64
                .decode(pcm_base64.as_bytes())
                .map_err(|e| SynthesisError::Engine(anyhow!("Invalid base64 audio: {e}")))?;
            if pcm_data.is_empty() {
                return Ok(None);
            }
            SynthesisEvent::Audio(AudioBuffer {
                pcm_data,
                sample_rate,
                channels,
            })
        }
        SidecarMessage::Phonemes { phonemes } => SynthesisEvent::Phonemes(phonemes),
        SidecarMessage::Done => SynthesisEvent::Finished,
        SidecarMessage::Error { message } => {
            return Err(SynthesisError::Engine(anyhow!("Sidecar reported: {message}")))
        }
    };
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_split_with_quotes() {
        let sidecar = SidecarSynthesizer::new(r#"python3 "/opt/my tts/engine.py" --model en"#).unwrap();
        assert_eq!(sidecar.program, "python3");
        assert_eq!(sidecar.args, vec!["/opt/my tts/engine.py", "--model", "en"]);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(SidecarSynthesizer::new("   ").is_err());
    }

    #[test]
    fn test_request_line_shape() {
        let json = serde_json::to_value(SidecarRequest::Synthesize {
            text: "Doctor Smith",
            voice: Some("amy"),
            speed: 1.5,
            want_timing: true,
        })
        .unwrap();
        assert_eq!(json["type"], "synthesize");
        assert_eq!(json["voice"], "amy");
        assert_eq!(json["want_timing"], true);
    }

    #[test]
    fn test_parse_audio_line() {
        let pcm = BASE64.encode([1u8, 0, 2, 0]);
        let line = format!(r#"{{"type":"audio","pcm_base64":"{pcm}","sample_rate":22050}}"#);
        match parse_line(&line).unwrap() {
            Some(SynthesisEvent::Audio(audio)) => {
                assert_eq!(audio.samples(), vec![1, 2]);
                assert_eq!(audio.sample_rate, 22050);
                assert_eq!(audio.channels, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_phonemes_and_done() {
        let line = r#"{"type":"phonemes","phonemes":[{"symbol":"d","start_time":0.0,"end_time":0.05,"char_start":0,"char_end":1}]}"#;
        assert!(matches!(parse_line(line).unwrap(), Some(SynthesisEvent::Phonemes(p)) if p.len() == 1));
        assert!(matches!(parse_line(r#"{"type":"done"}"#).unwrap(), Some(SynthesisEvent::Finished)));
    }

    #[test]
    fn test_parse_error_line() {
        let result = parse_line(r#"{"type":"error","message":"model not loaded"}"#);
        assert!(matches!(result, Err(SynthesisError::Engine(e)) if e.to_string().contains("model not loaded")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_round_trip_through_shell_script() {
        let pcm = BASE64.encode([0u8; 3200]);
        let script = format!(
            r#"read line; echo '{{"type":"audio","pcm_base64":"{pcm}","sample_rate":16000}}'; echo '{{"type":"done"}}'"#
        );
        let command = shell_words::join(["sh", "-c", script.as_str()]);
        let sidecar = SidecarSynthesizer::new(&command).unwrap();

        let result = sidecar.synthesize(&SynthesisRequest::new("Hello")).await.unwrap();
        assert_eq!(result.audio.duration(), 0.1);
        assert!(result.phonemes.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_exiting_early_is_an_error() {
        let sidecar = SidecarSynthesizer::new("sh -c 'read line; echo boom >&2; exit 3'").unwrap();
        let result = sidecar.synthesize(&SynthesisRequest::new("Hello")).await;
        assert!(matches!(result, Err(SynthesisError::Engine(e)) if e.to_string().contains("boom")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_stderr_output_does_not_block() {
        let pcm = BASE64.encode([0u8; 3200]);
        // Far more than a pipe buffer holds, written before any stdout
        let script = format!(
            r#"read line; head -c 300000 /dev/zero | tr '\0' x >&2; echo '{{"type":"audio","pcm_base64":"{pcm}","sample_rate":16000}}'; echo '{{"type":"done"}}'"#
        );
        let command = shell_words::join(["sh", "-c", script.as_str()]);
        let sidecar = SidecarSynthesizer::new(&command).unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            sidecar.synthesize(&SynthesisRequest::new("Hello")),
        )
        .await
        .expect("sidecar should not stall on stderr")
        .unwrap();
        assert_eq!(result.audio.duration(), 0.1);
    }
}

//! Sentence audio on the default output device.
//! Audio is mixed down to mono, resampled to the device rate, then spread
//! across the device's channels.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig,
};
use rubato::{FftFixedIn, Resampler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::consumer::{AudioOutput, PlaybackHandle};
use crate::synthesis::AudioBuffer;

pub struct DeviceOutput {
    device: Device,
    supported_config: SupportedStreamConfig,
}

/// Dropping stops playback.
pub struct DevicePlayback {
    _stream: Stream,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    samples_per_second: f64,
}

impl PlaybackHandle for DevicePlayback {
    fn elapsed(&self) -> f64 {
        self.position.load(Ordering::SeqCst) as f64 / self.samples_per_second
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl DeviceOutput {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no output device available")?;

        let supported_config = device
            .default_output_config()
            .context("failed to get default output config")?;

        tracing::info!(
            sample_rate = supported_config.sample_rate().0,
            channels = supported_config.channels(),
            "Opened output device"
        );

        Ok(Self {
            device,
            supported_config,
        })
    }

    fn build_stream<T>(
        &self,
        config: &StreamConfig,
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32> + Default + Send + 'static,
    {
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let pos = position.load(Ordering::SeqCst);
                    let remaining = samples.len().saturating_sub(pos);

                    if remaining == 0 {
                        data.fill(T::default());
                        finished.store(true, Ordering::SeqCst);
                        return;
                    }

                    let to_copy = remaining.min(data.len());
                    for (out, &sample) in data.iter_mut().zip(&samples[pos..pos + to_copy]) {
                        *out = T::from_sample(sample);
                    }
                    if to_copy < data.len() {
                        data[to_copy..].fill(T::default());
                    }

                    position.store(pos + to_copy, Ordering::SeqCst);
                },
                move |err| {
                    tracing::error!(error = ?err, "playback stream error");
                },
                None,
            )
            .context("failed to build output stream")
    }
}

impl AudioOutput for DeviceOutput {
    type Handle = DevicePlayback;

    fn play(&mut self, audio: &AudioBuffer) -> Result<DevicePlayback> {
        let native_rate = self.supported_config.sample_rate().0;
        let native_channels = self.supported_config.channels() as usize;
        let config: StreamConfig = self.supported_config.clone().into();

        let mono = downmix(&audio.samples(), audio.channels.max(1) as usize);
        let resampled = if audio.sample_rate == native_rate {
            mono
        } else {
            resample(&mono, audio.sample_rate, native_rate)?
        };
        let samples = Arc::new(expand_to_channels(&resampled, native_channels.max(1)));

        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = match self.supported_config.sample_format() {
            SampleFormat::F32 => {
                self.build_stream::<f32>(&config, samples, position.clone(), finished.clone())?
            }
            SampleFormat::I16 => {
                self.build_stream::<i16>(&config, samples, position.clone(), finished.clone())?
            }
            format => anyhow::bail!("unsupported sample format: {:?}", format),
        };

        stream.play().context("failed to start playback stream")?;

        Ok(DevicePlayback {
            _stream: stream,
            position,
            finished,
            samples_per_second: (native_rate as usize * native_channels.max(1)) as f64,
        })
    }
}

fn downmix(samples: &[i16], channels: usize) -> Vec<f32> {
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s as f32 / 32768.0).sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    let chunk_size = 1024;
    let mut resampler =
        FftFixedIn::<f32>::new(source_rate as usize, target_rate as usize, chunk_size, 2, 1)
            .context("failed to create resampler")?;

    let mut output = Vec::new();
    let mut pos = 0;

    while pos < samples.len() {
        let frames_needed = resampler.input_frames_next();
        let end = (pos + frames_needed).min(samples.len());

        let mut input_chunk = samples[pos..end].to_vec();
        input_chunk.resize(frames_needed, 0.0);

        let input = vec![input_chunk];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| anyhow::anyhow!("resampling failed: {e:?}"))?;
        if let Some(chunk) = resampled.into_iter().next() {
            output.extend(chunk);
        }

        pos = end;
    }

    Ok(output)
}

fn expand_to_channels(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .iter()
        .flat_map(|&sample| std::iter::repeat(sample).take(channels))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_frames() {
        let mono = downmix(&[16384, 0, -16384, -16384], 2);
        assert_eq!(mono, vec![0.25, -0.5]);
    }

    #[test]
    fn test_expand_to_channels() {
        assert_eq!(expand_to_channels(&[0.1, 0.2], 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_resample_changes_length_proportionally() {
        let input = vec![0.0f32; 16_000];
        let output = resample(&input, 16_000, 48_000).unwrap();
        assert!(output.len() >= 48_000);
    }
}

pub mod consumer;
#[cfg(feature = "playback")]
pub mod device;

pub use consumer::{
    AudioOutput, HighlightTarget, PlaybackConsumer, PlaybackEvent, PlaybackHandle,
    PlaybackOutcome,
};
#[cfg(feature = "playback")]
pub use device::{DeviceOutput, DevicePlayback};

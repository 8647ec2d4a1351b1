use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::synthesis::MockBehavior;

/// How much of the text is highlighted while it is spoken. Only `word` needs
/// phoneme timing from the synthesizer.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HighlightGranularity {
    Off,
    Paragraph,
    Sentence,
    #[default]
    Word,
}

impl HighlightGranularity {
    pub fn needs_timing(self) -> bool {
        self == HighlightGranularity::Word
    }
}

/// Listener-facing settings. Changing speed or voice restarts production from
/// the sentence being played.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default)]
    pub voice: Option<String>,

    #[serde(default)]
    pub highlight: HighlightGranularity,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            voice: None,
            highlight: HighlightGranularity::default(),
        }
    }
}

/// Tunables for the production window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Upper bound on synthesized sentences held across both paragraphs.
    #[serde(default = "default_max_cached_sentences")]
    pub max_cached_sentences: usize,

    /// Once this many or fewer sentences of the current paragraph are left
    /// to produce, the next paragraph is split and `PrefetchStarted` is
    /// announced. Scheduling is unaffected: with a single producer, the next
    /// paragraph is produced once the last sentence of the current one is,
    /// whatever this value is.
    #[serde(default = "default_lookahead_threshold")]
    pub lookahead_threshold: usize,
}

fn default_max_cached_sentences() -> usize {
    7
}

fn default_lookahead_threshold() -> usize {
    2
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_cached_sentences: default_max_cached_sentences(),
            lookahead_threshold: default_lookahead_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SynthesizerConfig {
    #[serde(rename = "sidecar")]
    Sidecar { command: String },
    #[serde(rename = "mock")]
    Mock {
        #[serde(default)]
        behavior: MockBehavior,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub active_synthesizer: Option<String>,

    #[serde(default)]
    pub synthesizers: HashMap<String, SynthesizerConfig>,
}

impl Settings {
    /// The active synthesizer's config, or the only one if just one is defined.
    pub fn active_synthesizer_config(&self) -> Option<&SynthesizerConfig> {
        match &self.active_synthesizer {
            Some(name) => self.synthesizers.get(name),
            None if self.synthesizers.len() == 1 => self.synthesizers.values().next(),
            None => None,
        }
    }
}

pub mod config;
pub mod manager;


pub use config::{
    CoordinatorConfig, HighlightGranularity, PlaybackConfig, Settings, SynthesizerConfig,
};
pub use manager::SettingsManager;

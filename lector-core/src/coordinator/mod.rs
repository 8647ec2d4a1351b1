pub mod actor;
pub mod cache;
pub mod error;
pub mod events;
mod producer;
pub mod state;
pub mod stream;
pub mod types;

pub use actor::{CoordinatorBuilder, SynthesisCoordinator};
pub use cache::SentenceCache;
pub use error::{CacheError, CoordinatorError};
pub use events::{CoordinatorEvent, EventSender};
pub use state::{CoordinatorSnapshot, Phase, SessionFlag};
pub use stream::SentenceStream;
pub use types::{SentenceKey, SentenceSynthesisResult};

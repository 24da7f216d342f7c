pub mod sequencer;
pub mod types;

pub use sequencer::MessageSequencer;
pub use types::{AudioData, Message, Role, TranscriptStatus};

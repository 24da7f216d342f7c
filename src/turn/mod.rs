pub mod coordinator;
pub mod detection;

pub use coordinator::{PlaybackControl, Speaker, TurnCoordinator};
pub use detection::{
    AutomaticStyle, Eagerness, ThresholdVad, TurnDetectionConfig, TurnDetectionMode,
};

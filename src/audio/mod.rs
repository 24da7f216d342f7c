pub mod buffer;
pub mod echo;
pub mod gate;
pub mod levels;

pub use buffer::CaptureBuffer;
pub use echo::{EchoCanceller, EchoCancellerConfig};
pub use gate::{EchoGate, EchoGateConfig, EchoProtectionMode};
pub use levels::{analyze, analyze_with_bands, pcm16_to_f32, AudioLevels, BandRanges};

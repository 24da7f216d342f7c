pub mod audio;
pub mod config;
pub mod events;
pub mod messages;
pub mod turn;

use thiserror::Error;

/// Errors at the crate boundary.
///
/// The coordination core itself has no fatal paths: invalid configuration is
/// clamped, unknown ids are no-ops, degenerate audio yields zero metrics.
/// These variants cover decoding of collaborator-supplied values only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrosstalkError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown transcript status: {0}")]
    UnknownTranscriptStatus(String),
}

pub type Result<T> = std::result::Result<T, CrosstalkError>;

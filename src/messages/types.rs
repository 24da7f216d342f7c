use crate::CrosstalkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl FromStr for Role {
    type Err = CrosstalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            other => Err(CrosstalkError::UnknownRole(other.to_string())),
        }
    }
}

/// Transcript lifecycle of a conversation entry.
///
/// `NotApplicable` covers entries that never had audio to transcribe
/// (typed text, tool output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    NotStarted,
    InProgress,
    Completed,
    NotApplicable,
}

impl TranscriptStatus {
    /// Whether this entry's own state no longer blocks finalization.
    pub fn is_resolved(&self) -> bool {
        matches!(self, TranscriptStatus::Completed | TranscriptStatus::NotApplicable)
    }
}

impl FromStr for TranscriptStatus {
    type Err = CrosstalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TranscriptStatus::NotStarted),
            "in_progress" => Ok(TranscriptStatus::InProgress),
            "completed" => Ok(TranscriptStatus::Completed),
            "not_applicable" => Ok(TranscriptStatus::NotApplicable),
            other => Err(CrosstalkError::UnknownTranscriptStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One conversation entry.
///
/// `sequence` is assigned once at creation and defines true causal order
/// regardless of when the entry's transcript resolves; it is never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub audio: Option<AudioData>,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub transcript: TranscriptStatus,
}

impl Message {
    pub fn new(
        sequence: u64,
        role: Role,
        text: impl Into<String>,
        audio: Option<AudioData>,
        transcript: TranscriptStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            audio,
            timestamp: Utc::now(),
            sequence,
            transcript,
        }
    }
}

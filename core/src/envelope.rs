//! Result envelope - the one shape every analysis path converges to
//!
//! Serializes as `{"type": "<modality>_analysis", "result": {...}}`. The
//! modality tag and the result shape come from the same enum variant, so they
//! cannot disagree.

use crate::analyzers::{FrameVerdict, TextVerdict};
use serde::{Deserialize, Serialize};

/// `{ "error": "..." }` body for a degraded analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextResult {
    Verdict(TextVerdict),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub transcription: String,
    pub scam_analysis: TextResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioResult {
    Analysis(AudioAnalysis),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    /// Verdicts for the sampled frames, in capture order
    pub frame_checks: Vec<FrameVerdict>,
    /// `None` when no audio track could be extracted
    pub audio_analysis: Option<AudioResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoResult {
    Analysis(VideoAnalysis),
    Error(ErrorBody),
}

macro_rules! error_constructor {
    ($ty:ident) => {
        impl $ty {
            pub fn error(message: impl Into<String>) -> Self {
                $ty::Error(ErrorBody {
                    error: message.into(),
                })
            }

            pub fn error_message(&self) -> Option<&str> {
                match self {
                    $ty::Error(body) => Some(&body.error),
                    _ => None,
                }
            }
        }
    };
}

error_constructor!(TextResult);
error_constructor!(AudioResult);
error_constructor!(VideoResult);

impl VideoResult {
    /// At least one sampled frame shows a face judged not real
    pub fn has_deepfake_face(&self) -> bool {
        match self {
            VideoResult::Analysis(analysis) => {
                analysis.frame_checks.iter().any(FrameVerdict::is_deepfake)
            }
            VideoResult::Error(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Audio,
    Video,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
            Modality::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result", rename_all = "snake_case")]
pub enum Envelope {
    TextAnalysis(TextResult),
    AudioAnalysis(AudioResult),
    VideoAnalysis(VideoResult),
}

impl Envelope {
    /// Error envelope for `modality`
    pub fn error(modality: Modality, message: impl Into<String>) -> Self {
        match modality {
            Modality::Text => Envelope::TextAnalysis(TextResult::error(message)),
            Modality::Audio => Envelope::AudioAnalysis(AudioResult::error(message)),
            Modality::Video => Envelope::VideoAnalysis(VideoResult::error(message)),
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Envelope::TextAnalysis(_) => Modality::Text,
            Envelope::AudioAnalysis(_) => Modality::Audio,
            Envelope::VideoAnalysis(_) => Modality::Video,
        }
    }

    /// Top-level error message, if the whole analysis degraded
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Envelope::TextAnalysis(r) => r.error_message(),
            Envelope::AudioAnalysis(r) => r.error_message(),
            Envelope::VideoAnalysis(r) => r.error_message(),
        }
    }

    /// Whether this envelope belongs on the filtered real-time alert feed
    pub fn is_deepfake_alert(&self) -> bool {
        matches!(self, Envelope::VideoAnalysis(result) if result.has_deepfake_face())
    }
}

//! Analyzer capabilities - the narrow contracts every detection model is consumed through
//!
//! Each modality has its own trait. Implementations are injected into the
//! orchestrator at start-up and must be safe for concurrent invocation
//! (`Send + Sync`); the orchestrator shares one instance across requests
//! without additional locking.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::media::Frame;

/// Errors that can occur inside an analyzer capability
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Analyzer internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Verdict produced by a text classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVerdict {
    /// Probability (0.0 - 1.0) that the text is a scam attempt
    pub scam_probability: f32,

    /// Coarse label derived from the probability (e.g. "scam", "legitimate")
    pub label: String,

    /// Human-readable explanation of the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Verdict for one sampled video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameVerdict {
    pub face_detected: bool,

    /// `None` when the analyzer could not decide
    #[serde(default)]
    pub is_real: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameVerdict {
    /// Verdict for a frame whose bytes could not be decoded
    pub fn invalid_frame() -> Self {
        Self::failed("Invalid frame")
    }

    /// Verdict for a frame the analyzer failed on
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            face_detected: false,
            is_real: None,
            confidence: None,
            error: Some(message.into()),
        }
    }

    /// A face was found and judged not real
    pub fn is_deepfake(&self) -> bool {
        self.face_detected && self.is_real == Some(false)
    }
}

/// Mono PCM audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Scam classifier over free text
pub trait TextAnalyzer: Send + Sync {
    /// Identifier used in logs and availability reports
    fn name(&self) -> &str;

    /// Classify `text`. Empty input is the analyzer's call, not the caller's.
    fn predict(&self, text: &str) -> AnalyzerResult<TextVerdict>;
}

/// Speech-to-text front end
pub trait AudioAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Sample rate the transcriber expects; `decode` resamples to it
    fn target_sample_rate(&self) -> u32 {
        16_000
    }

    /// Decode an audio artifact into a mono waveform at `target_sample_rate`.
    ///
    /// Fails with [`AnalyzerError::InputNotFound`] when the file is missing and
    /// [`AnalyzerError::DecodeFailure`] when it is malformed.
    fn decode(&self, path: &Path) -> AnalyzerResult<Waveform>;

    /// Produce a transcript for a decoded waveform
    fn transcribe(&self, waveform: &Waveform) -> AnalyzerResult<String>;
}

/// Face / deepfake check for a single decoded frame
pub trait VideoFrameAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn analyze_frame(&self, frame: &Frame) -> AnalyzerResult<FrameVerdict>;
}

//! Analyzer set - per-modality availability decided once at start-up

use super::r#trait::{AudioAnalyzer, TextAnalyzer, VideoFrameAnalyzer};
use crate::config::Config;
use crate::detectors::{CommandFrameAnalyzer, KeywordTextAnalyzer, WavAudioAnalyzer};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info};

/// Whether a modality's analyzer could be constructed
pub enum Availability<T: ?Sized> {
    Available(Arc<T>),
    Unavailable(String),
}

impl<T: ?Sized> Availability<T> {
    /// Record the outcome of initializing one analyzer, logging either way
    pub fn from_init<E: Display>(modality: &str, result: Result<Arc<T>, E>) -> Self {
        match result {
            Ok(analyzer) => {
                info!(modality, "analyzer initialized");
                Availability::Available(analyzer)
            }
            Err(e) => {
                error!(modality, error = %e, "failed to initialize analyzer");
                Availability::Unavailable(e.to_string())
            }
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Availability::Available(analyzer) => Some(analyzer),
            Availability::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Availability::Available(_) => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }
}

impl<T: ?Sized> Clone for Availability<T> {
    fn clone(&self) -> Self {
        match self {
            Availability::Available(analyzer) => Availability::Available(Arc::clone(analyzer)),
            Availability::Unavailable(reason) => Availability::Unavailable(reason.clone()),
        }
    }
}

/// Status of one modality as shown to operators
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModalityStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailabilityReport {
    pub text: ModalityStatus,
    pub audio: ModalityStatus,
    pub video: ModalityStatus,
}

/// The analyzers injected into the orchestrator. Immutable once built.
#[derive(Clone)]
pub struct AnalyzerSet {
    pub text: Availability<dyn TextAnalyzer>,
    pub audio: Availability<dyn AudioAnalyzer>,
    pub video: Availability<dyn VideoFrameAnalyzer>,
}

impl AnalyzerSet {
    pub fn new(
        text: Availability<dyn TextAnalyzer>,
        audio: Availability<dyn AudioAnalyzer>,
        video: Availability<dyn VideoFrameAnalyzer>,
    ) -> Self {
        Self { text, audio, video }
    }

    /// A set with every modality unavailable
    pub fn none() -> Self {
        Self {
            text: Availability::Unavailable("not configured".to_string()),
            audio: Availability::Unavailable("not configured".to_string()),
            video: Availability::Unavailable("not configured".to_string()),
        }
    }

    /// Build the built-in analyzers. Each modality is initialized on its own;
    /// one failing leaves the others untouched.
    pub fn initialize(config: &Config) -> Self {
        info!("initializing analyzers");

        let text = Availability::from_init(
            "text",
            KeywordTextAnalyzer::from_config(&config.text)
                .map(|a| Arc::new(a) as Arc<dyn TextAnalyzer>),
        );
        let audio = Availability::from_init(
            "audio",
            WavAudioAnalyzer::from_config(config).map(|a| Arc::new(a) as Arc<dyn AudioAnalyzer>),
        );
        let video = Availability::from_init(
            "video",
            CommandFrameAnalyzer::from_config(&config.frame_analyzer)
                .map(|a| Arc::new(a) as Arc<dyn VideoFrameAnalyzer>),
        );

        Self { text, audio, video }
    }

    pub fn report(&self) -> AvailabilityReport {
        AvailabilityReport {
            text: status(&self.text, |a| a.name().to_string()),
            audio: status(&self.audio, |a| a.name().to_string()),
            video: status(&self.video, |a| a.name().to_string()),
        }
    }
}

impl Default for AnalyzerSet {
    fn default() -> Self {
        Self::none()
    }
}

fn status<T: ?Sized>(slot: &Availability<T>, name: impl Fn(&T) -> String) -> ModalityStatus {
    ModalityStatus {
        available: slot.is_available(),
        analyzer: slot.get().map(|a| name(&**a)),
        reason: slot.reason().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandConfig;

    #[test]
    fn test_default_config_keeps_text_when_others_fail() {
        let mut config = Config::default();
        config.transcriber = CommandConfig::default();
        config.frame_analyzer = CommandConfig::default();

        let set = AnalyzerSet::initialize(&config);

        assert!(set.text.is_available());
        assert!(!set.audio.is_available());
        assert!(!set.video.is_available());
        assert!(set.audio.reason().is_some());
    }

    #[test]
    fn test_report_names_available_analyzers() {
        let set = AnalyzerSet::initialize(&Config::default());
        let report = set.report();

        assert!(report.text.available);
        assert_eq!(report.text.analyzer.as_deref(), Some("keyword_text"));
        assert!(report.text.reason.is_none());
        assert!(!report.video.available);
        assert!(report.video.analyzer.is_none());
    }
}

//! Scamwatch Core
//!
//! Multi-modal scam and deepfake detection for the Scamwatch alert gateway.
//!
//! # Overview
//!
//! This crate turns raw text, audio and video into one normalized result
//! envelope and fans envelopes out to live subscribers:
//! - Analyzer capabilities are injected per modality and may be unavailable
//! - The orchestrator composes modalities (video → audio → text) and contains
//!   every failure as an `{error}` body on the affected modality
//! - The broadcast hub delivers envelopes to each subscriber's own queue
//!
//! # Modalities
//!
//! - **Text**: scam-tactic classification
//! - **Audio**: decode, resample to 16 kHz mono, transcribe, classify transcript
//! - **Video**: sample the first frames for deepfake faces, analyze the audio track
//!
//! # Example
//!
//! ```rust,ignore
//! use scamwatch_core::{BroadcastHub, Config, Orchestrator};
//!
//! let config = Config::default();
//! let orchestrator = Orchestrator::from_config(&config);
//! let hub = BroadcastHub::new(config.subscriber_queue_capacity);
//!
//! let envelope = orchestrator.analyze_text("You have won! Pay the fee by gift card").await;
//! hub.broadcast(envelope);
//! ```

pub mod analyzers;
pub mod config;
pub mod detectors;
pub mod envelope;
pub mod hub;
pub mod media;
pub mod orchestrator;

// Re-export main types
pub use analyzers::{
    AnalyzerError, AnalyzerResult, AnalyzerSet, AudioAnalyzer, Availability, AvailabilityReport,
    FrameVerdict, ModalityStatus, TextAnalyzer, TextVerdict, VideoFrameAnalyzer, Waveform,
};
pub use config::{CommandConfig, Config, ConfigError, TextConfig};
pub use envelope::{
    AudioAnalysis, AudioResult, Envelope, ErrorBody, Modality, TextResult, VideoAnalysis,
    VideoResult,
};
pub use hub::{BroadcastHub, SubscriberId, Subscription};
pub use media::{FfmpegDemuxer, Frame, FrameSource, MediaDemuxer, MediaError, MediaResult};
pub use orchestrator::{Orchestrator, OrchestratorSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_orchestrator_runs_text_path() {
        let orchestrator = Orchestrator::from_config(&Config::default());

        let envelope = orchestrator.analyze_text("free money click now").await;

        let Envelope::TextAnalysis(TextResult::Verdict(verdict)) = envelope else {
            panic!("expected a text verdict");
        };
        assert_eq!(verdict.label, "scam");
    }

    #[tokio::test]
    async fn test_default_orchestrator_degrades_audio_and_video() {
        let orchestrator = Orchestrator::from_config(&Config::default());

        let audio = orchestrator.analyze_audio("/tmp/missing.wav").await;
        assert_eq!(
            audio.error_message(),
            Some(orchestrator::AUDIO_UNAVAILABLE)
        );

        let video = orchestrator.analyze_video("/tmp/missing.mp4").await;
        assert_eq!(video.error_message(), Some(orchestrator::VIDEO_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_envelopes_reach_subscribers() {
        let orchestrator = Orchestrator::from_config(&Config::default());
        let hub = BroadcastHub::default();
        let mut subscriber = hub.connect();

        let envelope = orchestrator.analyze_text("see you soon").await;
        assert_eq!(hub.broadcast(envelope.clone()), 1);

        assert_eq!(*subscriber.recv().await.unwrap(), envelope);
    }
}

//! Detection orchestrator
//!
//! Drives each modality through its analyzers and composes modalities:
//! video extracts its audio track and runs the audio path, audio transcribes
//! and runs the text path. Every failure, panics included, is contained at
//! the analyzer call and becomes an `{error}` body on the smallest affected
//! modality (a frame verdict, the embedded audio, the nested text result);
//! no `analyze_*` call returns an error or panics through to the caller.
//!
//! Analyzer calls are blocking. The async operations run the blocking
//! counterparts on Tokio's blocking pool, and the sampled frames of one video
//! are checked in parallel on the rayon pool.

use crate::analyzers::{
    AnalyzerError, AnalyzerResult, AnalyzerSet, AvailabilityReport, FrameVerdict,
    VideoFrameAnalyzer,
};
use crate::config::Config;
use crate::envelope::{
    AudioAnalysis, AudioResult, Envelope, Modality, TextResult, VideoAnalysis, VideoResult,
};
use crate::media::{FfmpegDemuxer, Frame, MediaDemuxer};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const TEXT_UNAVAILABLE: &str = "Text model is not available.";
pub const AUDIO_UNAVAILABLE: &str = "Audio/Text model not available.";
pub const VIDEO_UNAVAILABLE: &str = "Video model not available.";
pub const AUDIO_NOT_FOUND: &str = "Audio file not found.";
pub const VIDEO_NOT_FOUND: &str = "Video file not found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum frames sampled from the start of a video
    pub frame_sample_cap: usize,
    /// Sample rate of the audio track demuxed from video
    pub extract_sample_rate: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            frame_sample_cap: crate::config::DEFAULT_FRAME_SAMPLE_CAP,
            extract_sample_rate: crate::config::DEFAULT_TARGET_SAMPLE_RATE,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            frame_sample_cap: config.frame_sample_cap,
            extract_sample_rate: config.target_sample_rate,
        }
    }
}

struct Inner {
    analyzers: AnalyzerSet,
    demuxer: Arc<dyn MediaDemuxer>,
    settings: OrchestratorSettings,
}

/// Cheap to clone; clones share the same analyzers
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        analyzers: AnalyzerSet,
        demuxer: Arc<dyn MediaDemuxer>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                analyzers,
                demuxer,
                settings,
            }),
        }
    }

    /// Initialize the built-in analyzers and the ffmpeg demuxer
    pub fn from_config(config: &Config) -> Self {
        let analyzers = AnalyzerSet::initialize(config);
        let demuxer = Arc::new(FfmpegDemuxer::new(&config.ffmpeg_path));
        Self::new(analyzers, demuxer, OrchestratorSettings::from(config))
    }

    pub fn availability(&self) -> AvailabilityReport {
        self.inner.analyzers.report()
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.inner.settings
    }

    pub async fn analyze_text(&self, text: impl Into<String>) -> Envelope {
        let text = text.into();
        self.offload(Modality::Text, move |o| o.analyze_text_blocking(&text))
            .await
    }

    pub async fn analyze_audio(&self, path: impl Into<PathBuf>) -> Envelope {
        let path = path.into();
        self.offload(Modality::Audio, move |o| o.analyze_audio_blocking(&path))
            .await
    }

    pub async fn analyze_video(&self, path: impl Into<PathBuf>) -> Envelope {
        let path = path.into();
        self.offload(Modality::Video, move |o| o.analyze_video_blocking(&path))
            .await
    }

    /// Analyze one still image as a single-frame video
    pub async fn analyze_frame_image(&self, bytes: Vec<u8>) -> Envelope {
        self.offload(Modality::Video, move |o| {
            o.analyze_frame_image_blocking(&bytes)
        })
        .await
    }

    /// Run `job` on the blocking pool; a panic becomes an error envelope
    async fn offload<F>(&self, modality: Modality, job: F) -> Envelope
    where
        F: FnOnce(&Orchestrator) -> Envelope + Send + 'static,
    {
        let this = self.clone();
        match tokio::task::spawn_blocking(move || job(&this)).await {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(modality = modality.as_str(), error = %e, "analysis task failed");
                Envelope::error(
                    modality,
                    AnalyzerError::Internal(e.to_string()).to_string(),
                )
            }
        }
    }

    pub fn analyze_text_blocking(&self, text: &str) -> Envelope {
        Envelope::TextAnalysis(self.text_result(text))
    }

    pub fn analyze_audio_blocking(&self, path: &Path) -> Envelope {
        Envelope::AudioAnalysis(self.audio_result(path))
    }

    pub fn analyze_video_blocking(&self, path: &Path) -> Envelope {
        Envelope::VideoAnalysis(self.video_result(path))
    }

    pub fn analyze_frame_image_blocking(&self, bytes: &[u8]) -> Envelope {
        let Some(analyzer) = self.inner.analyzers.video.get() else {
            return Envelope::error(Modality::Video, VIDEO_UNAVAILABLE);
        };

        let verdict = match image::load_from_memory(bytes) {
            Ok(image) => check_frame(analyzer.as_ref(), &Frame::from_image(0, &image)),
            Err(e) => {
                debug!(error = %e, "undecodable frame image");
                FrameVerdict::invalid_frame()
            }
        };

        Envelope::VideoAnalysis(VideoResult::Analysis(VideoAnalysis {
            frame_checks: vec![verdict],
            audio_analysis: None,
        }))
    }

    fn text_result(&self, text: &str) -> TextResult {
        let Some(analyzer) = self.inner.analyzers.text.get() else {
            return TextResult::error(TEXT_UNAVAILABLE);
        };

        match guarded(|| analyzer.predict(text)) {
            Ok(verdict) => TextResult::Verdict(verdict),
            Err(e) => {
                warn!(analyzer = analyzer.name(), error = %e, "text analysis failed");
                TextResult::error(e.to_string())
            }
        }
    }

    fn audio_result(&self, path: &Path) -> AudioResult {
        let analyzers = &self.inner.analyzers;
        let (Some(audio), true) = (analyzers.audio.get(), analyzers.text.is_available()) else {
            return AudioResult::error(AUDIO_UNAVAILABLE);
        };

        let waveform = match guarded(|| audio.decode(path)) {
            Ok(waveform) => waveform,
            Err(AnalyzerError::InputNotFound(_)) => return AudioResult::error(AUDIO_NOT_FOUND),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "audio decode failed");
                return AudioResult::error(format!("Failed to process audio: {}", e));
            }
        };

        let transcription = match guarded(|| audio.transcribe(&waveform)) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "transcription failed");
                return AudioResult::error(format!("Failed to process audio: {}", e));
            }
        };

        debug!(
            seconds = waveform.duration_secs(),
            chars = transcription.len(),
            "transcribed audio"
        );

        let scam_analysis = self.text_result(&transcription);
        AudioResult::Analysis(AudioAnalysis {
            transcription,
            scam_analysis,
        })
    }

    fn video_result(&self, path: &Path) -> VideoResult {
        let Some(analyzer) = self.inner.analyzers.video.get() else {
            return VideoResult::error(VIDEO_UNAVAILABLE);
        };
        if !path.exists() {
            return VideoResult::error(VIDEO_NOT_FOUND);
        }

        // Holds the demuxed audio until this analysis returns.
        let scratch = match tempfile::Builder::new().prefix("scamwatch-").tempdir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(error = %e, "no scratch directory for audio extraction");
                None
            }
        };
        let audio_path = scratch
            .as_ref()
            .and_then(|dir| self.extract_audio(path, dir.path()));

        let frames = self.sample_frames(path);
        let frame_checks: Vec<FrameVerdict> = frames
            .par_iter()
            .map(|frame| check_frame(analyzer.as_ref(), frame))
            .collect();

        let audio_analysis = audio_path.map(|audio| self.audio_result(&audio));

        info!(
            path = %path.display(),
            frames = frame_checks.len(),
            deepfake_frames = frame_checks.iter().filter(|v| v.is_deepfake()).count(),
            audio = audio_analysis.is_some(),
            "video analyzed"
        );

        VideoResult::Analysis(VideoAnalysis {
            frame_checks,
            audio_analysis,
        })
    }

    /// Demux the audio track into `dir`; `None` when there is none to analyze
    fn extract_audio(&self, video: &Path, dir: &Path) -> Option<PathBuf> {
        let dest = dir.join("audio.wav");
        match self
            .inner
            .demuxer
            .extract_audio(video, &dest, self.inner.settings.extract_sample_rate)
        {
            Ok(()) => Some(dest),
            Err(e) => {
                debug!(video = %video.display(), error = %e, "no audio track extracted, continuing with frames only");
                None
            }
        }
    }

    /// Decode up to the sample cap from the start of the stream.
    ///
    /// A read failure ends sampling like end of stream does: the frames read
    /// so far are kept, possibly none, and the audio path is unaffected. The
    /// decode handle is dropped before returning, whatever the outcome.
    fn sample_frames(&self, path: &Path) -> Vec<Frame> {
        let cap = self.inner.settings.frame_sample_cap;
        let mut source = match self.inner.demuxer.open_frames(path, cap) {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open video frames");
                return Vec::new();
            }
        };

        let mut frames = Vec::with_capacity(cap);
        while frames.len() < cap {
            match source.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), sampled = frames.len(), error = %e, "frame decoding stopped");
                    break;
                }
            }
        }

        frames
    }
}

/// Run one analyzer call; a panic becomes an internal error
fn guarded<T>(call: impl FnOnce() -> AnalyzerResult<T>) -> AnalyzerResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(AnalyzerError::Internal(format!(
            "panicked: {}",
            panic_message(&*payload)
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn check_frame(analyzer: &dyn VideoFrameAnalyzer, frame: &Frame) -> FrameVerdict {
    match guarded(|| analyzer.analyze_frame(frame)) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(analyzer = analyzer.name(), frame = frame.index, error = %e, "frame analysis failed");
            FrameVerdict::failed(e.to_string())
        }
    }
}

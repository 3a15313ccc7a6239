//! Fixtures for gateway tests: a frame analyzer and demuxer that need no
//! ffmpeg or model, so alert routing can be exercised end to end.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use scamwatch_core::{
    AnalyzerResult, AnalyzerSet, Availability, BroadcastHub, Frame, FrameSource, FrameVerdict,
    MediaDemuxer, MediaError, MediaResult, Orchestrator, OrchestratorSettings,
    VideoFrameAnalyzer,
};

use super::AppState;

/// Sees a face in every frame; a bright red first pixel reads as fake.
struct RedMeansFake;

impl VideoFrameAnalyzer for RedMeansFake {
    fn name(&self) -> &str {
        "red_means_fake"
    }

    fn analyze_frame(&self, frame: &Frame) -> AnalyzerResult<FrameVerdict> {
        let red = frame.rgb.first().copied().unwrap_or(0);
        Ok(FrameVerdict {
            face_detected: true,
            is_real: Some(red < 200),
            confidence: Some(0.9),
            error: None,
        })
    }
}

/// Turns each uploaded chunk into a single frame: red when the chunk starts
/// with `deepfake`, black otherwise. No chunk has an audio track.
struct ChunkDemuxer;

struct OneFrame(Option<Frame>);

impl FrameSource for OneFrame {
    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        Ok(self.0.take())
    }
}

impl MediaDemuxer for ChunkDemuxer {
    fn extract_audio(&self, _video: &Path, _dest: &Path, _rate: u32) -> MediaResult<()> {
        Err(MediaError::Ffmpeg("Stream map 'a' matches no streams".to_string()))
    }

    fn open_frames(&self, video: &Path, _limit: usize) -> MediaResult<Box<dyn FrameSource>> {
        let red = if std::fs::read(video)?.starts_with(b"deepfake") {
            255
        } else {
            0
        };
        Ok(Box::new(OneFrame(Some(Frame {
            index: 0,
            width: 1,
            height: 1,
            rgb: vec![red, 0, 0],
        }))))
    }
}

/// Gateway state with a working video path and nothing else
pub fn frame_state() -> AppState {
    let mut analyzers = AnalyzerSet::none();
    analyzers.video = Availability::Available(Arc::new(RedMeansFake) as Arc<dyn VideoFrameAnalyzer>);

    AppState::new(
        Orchestrator::new(
            analyzers,
            Arc::new(ChunkDemuxer),
            OrchestratorSettings::default(),
        ),
        Arc::new(BroadcastHub::default()),
    )
}

/// A 2x2 PNG filled with `red`
pub fn png(red: u8) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(2, 2, image::Rgb([red, 0, 0]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

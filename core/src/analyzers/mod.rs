//! Analyzers module - injected per-modality detection capabilities

mod registry;
mod r#trait;

pub use registry::{Availability, AnalyzerSet, AvailabilityReport, ModalityStatus};
pub use r#trait::{
    AnalyzerError, AnalyzerResult, AudioAnalyzer, FrameVerdict, TextAnalyzer, TextVerdict,
    VideoFrameAnalyzer, Waveform,
};

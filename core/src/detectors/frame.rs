//! Command Frame Analyzer
//!
//! Delegates the face/deepfake check to an external program. Each call
//! spawns `<command> <args…>`, writes the frame to its stdin as a binary PPM
//! and parses a JSON `FrameVerdict` from its stdout, e.g.
//!
//! ```json
//! {"face_detected": true, "is_real": false, "confidence": 0.93}
//! ```
//!
//! Calls share no state, so concurrent invocation is safe. A checker that
//! outlives its timeout is killed and the frame gets an error verdict.

use super::{resolve_command, CommandRun};
use crate::analyzers::{AnalyzerError, AnalyzerResult, FrameVerdict, VideoFrameAnalyzer};
use crate::config::CommandConfig;
use crate::media::Frame;
use std::path::PathBuf;
use std::time::Duration;

pub struct CommandFrameAnalyzer {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFrameAnalyzer {
    pub fn from_config(config: &CommandConfig) -> AnalyzerResult<Self> {
        let command = resolve_command(config, "frame analyzer")?;
        Ok(Self {
            command,
            args: config.args.clone(),
            timeout: config.timeout(),
        })
    }
}

impl VideoFrameAnalyzer for CommandFrameAnalyzer {
    fn name(&self) -> &str {
        "command_frame_analyzer"
    }

    fn analyze_frame(&self, frame: &Frame) -> AnalyzerResult<FrameVerdict> {
        let output = CommandRun {
            program: &self.command,
            args: &self.args,
            trailing: None,
            input: Some(frame.to_ppm()),
            timeout: self.timeout,
        }
        .run()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Internal(format!(
                "frame analyzer exited with {} on frame {}: {}",
                output.status,
                frame.index,
                stderr.trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

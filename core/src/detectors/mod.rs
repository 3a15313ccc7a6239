//! Built-in analyzer implementations

pub mod audio;
pub mod frame;
pub mod text;

pub use audio::{CommandTranscriber, WavAudioAnalyzer};
pub use frame::CommandFrameAnalyzer;
pub use text::KeywordTextAnalyzer;

use crate::analyzers::{AnalyzerError, AnalyzerResult};
use crate::config::CommandConfig;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Locate a configured external command, on `PATH` or as a path
pub(crate) fn resolve_command(config: &CommandConfig, purpose: &str) -> AnalyzerResult<PathBuf> {
    let command = config
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AnalyzerError::ModelUnavailable(format!("no {} command configured", purpose)))?;

    which::which(command).map_err(|e| {
        AnalyzerError::ModelUnavailable(format!(
            "{} command {:?} not found: {}",
            purpose, command, e
        ))
    })
}

/// An external analyzer invocation: program, leading args, optional stdin
/// payload and a wall-clock limit.
pub(crate) struct CommandRun<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    pub trailing: Option<&'a Path>,
    pub input: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl CommandRun<'_> {
    /// Run to completion or kill at the deadline.
    ///
    /// stdin is fed and stdout/stderr are drained on their own threads, so a
    /// child that logs heavily before reading its input cannot wedge the pipes.
    pub fn run(self) -> AnalyzerResult<Output> {
        let mut command = Command::new(self.program);
        command.args(self.args);
        if let Some(arg) = self.trailing {
            command.arg(arg);
        }

        let mut child = command
            .stdin(if self.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let writer = match (self.input, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => Some(thread::spawn(move || {
                match stdin.write_all(&bytes) {
                    // The child closed its input early; its exit status decides.
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            })),
            _ => None,
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(program = %self.program.display(), "external command timed out");
                    return Err(AnalyzerError::Internal(format!(
                        "{} timed out after {}s",
                        self.program.display(),
                        self.timeout.as_secs_f32()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        };

        if let Some(writer) = writer {
            match writer.join() {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AnalyzerError::Internal(
                        "stdin writer thread panicked".to_string(),
                    ))
                }
            }
        }

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

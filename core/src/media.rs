//! Media plumbing: demuxing audio out of video and streaming decoded frames.
//!
//! Decoding is done by an `ffmpeg` child process. Frames travel over a pipe
//! as binary PPM (P6) images, which keeps the parser trivial and avoids
//! linking a video codec library.

use image::DynamicImage;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("ffmpeg process exited with error: {0}")]
    Ffmpeg(String),

    #[error("Malformed frame stream: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// One decoded RGB8 frame, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in capture order, starting at 0
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl Frame {
    pub fn from_image(index: usize, image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        Self {
            index,
            width: rgb.width(),
            height: rgb.height(),
            rgb: rgb.into_raw(),
        }
    }

    /// Encode as a binary PPM (P6) image
    pub fn to_ppm(&self) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.rgb.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.rgb);
        out
    }
}

/// A scoped decode handle yielding frames in capture order.
///
/// Dropping the source releases the underlying decoder.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// Splits a video artifact into its audio track and its frames
pub trait MediaDemuxer: Send + Sync {
    /// Write the audio track of `video` to `dest` as mono PCM WAV at `sample_rate`
    fn extract_audio(&self, video: &Path, dest: &Path, sample_rate: u32) -> MediaResult<()>;

    /// Open a frame stream over at most `limit` frames from the start of `video`
    fn open_frames(&self, video: &Path, limit: usize) -> MediaResult<Box<dyn FrameSource>>;
}

/// Demuxer backed by the `ffmpeg` binary
pub struct FfmpegDemuxer {
    ffmpeg: PathBuf,
}

impl FfmpegDemuxer {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for FfmpegDemuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaDemuxer for FfmpegDemuxer {
    fn extract_audio(&self, video: &Path, dest: &Path, sample_rate: u32) -> MediaResult<()> {
        if !video.exists() {
            return Err(MediaError::InputNotFound(video.display().to_string()));
        }

        let output = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(video)
            .args(["-vn", "-map", "a", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-c:a", "pcm_s16le", "-y"])
            .arg(dest)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Ffmpeg(stderr.trim().to_string()));
        }

        debug!(video = %video.display(), dest = %dest.display(), "extracted audio track");
        Ok(())
    }

    fn open_frames(&self, video: &Path, limit: usize) -> MediaResult<Box<dyn FrameSource>> {
        if !video.exists() {
            return Err(MediaError::InputNotFound(video.display().to_string()));
        }

        let mut child = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(video)
            .arg("-frames:v")
            .arg(limit.to_string())
            .args(["-f", "image2pipe", "-vcodec", "ppm", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Ffmpeg("ffmpeg stdout was not captured".to_string()))?;

        Ok(Box::new(FfmpegFrames {
            child,
            reader: BufReader::new(stdout),
            next_index: 0,
            yielded_any: false,
        }))
    }
}

/// Frames read from a running ffmpeg process
struct FfmpegFrames {
    child: Child,
    reader: BufReader<ChildStdout>,
    next_index: usize,
    yielded_any: bool,
}

impl FrameSource for FfmpegFrames {
    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        match read_ppm(&mut self.reader, self.next_index)? {
            Some(frame) => {
                self.next_index += 1;
                self.yielded_any = true;
                Ok(Some(frame))
            }
            None => {
                // An empty stream from a failed decode is an error, not a zero-frame video.
                if !self.yielded_any {
                    if let Some(status) = self.child.wait().ok().filter(|s| !s.success()) {
                        return Err(MediaError::Ffmpeg(format!(
                            "could not decode video ({})",
                            status
                        )));
                    }
                }
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            // InvalidInput means the process already exited.
            if e.kind() != io::ErrorKind::InvalidInput {
                warn!(error = %e, "failed to stop ffmpeg decoder");
            }
        }
        let _ = self.child.wait();
    }
}

/// Read one binary PPM image. Returns `None` on a clean end of stream.
pub fn read_ppm<R: BufRead>(reader: &mut R, index: usize) -> MediaResult<Option<Frame>> {
    if reader.fill_buf()?.is_empty() {
        return Ok(None);
    }

    let magic = read_token(reader)?;
    if magic != "P6" {
        return Err(MediaError::Malformed(format!(
            "expected P6 magic, found {:?}",
            magic
        )));
    }

    let width = parse_header_number(reader, "width")?;
    let height = parse_header_number(reader, "height")?;
    let max_value = parse_header_number(reader, "maxval")?;
    if max_value == 0 || max_value > 255 {
        return Err(MediaError::Malformed(format!(
            "unsupported maxval {}",
            max_value
        )));
    }

    let len = width as usize * height as usize * 3;
    let mut rgb = vec![0u8; len];
    reader.read_exact(&mut rgb).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MediaError::Malformed(format!("truncated frame {}", index))
        } else {
            MediaError::Io(e)
        }
    })?;

    Ok(Some(Frame {
        index,
        width,
        height,
        rgb,
    }))
}

fn parse_header_number<R: BufRead>(reader: &mut R, field: &str) -> MediaResult<u32> {
    let token = read_token(reader)?;
    token
        .parse()
        .map_err(|_| MediaError::Malformed(format!("bad {} {:?}", field, token)))
}

/// Read a whitespace-delimited header token, skipping `#` comments.
/// Consumes exactly one whitespace byte after the token.
fn read_token<R: BufRead>(reader: &mut R) -> MediaResult<String> {
    let mut token = String::new();
    let mut byte = [0u8; 1];

    loop {
        if reader.read(&mut byte)? == 0 {
            return Err(MediaError::Malformed("unexpected end of header".to_string()));
        }
        match byte[0] {
            b'#' if token.is_empty() => {
                let mut comment = Vec::new();
                reader.read_until(b'\n', &mut comment)?;
            }
            b if b.is_ascii_whitespace() => {
                if !token.is_empty() {
                    return Ok(token);
                }
            }
            b => token.push(b as char),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(index: usize, width: u32, height: u32, fill: u8) -> Frame {
        Frame {
            index,
            width,
            height,
            rgb: vec![fill; (width * height * 3) as usize],
        }
    }

    #[test]
    fn test_reads_consecutive_frames() {
        let mut stream = frame(0, 2, 2, 10).to_ppm();
        stream.extend(frame(1, 3, 1, 200).to_ppm());
        let mut reader = Cursor::new(stream);

        let first = read_ppm(&mut reader, 0).unwrap().unwrap();
        let second = read_ppm(&mut reader, 1).unwrap().unwrap();

        assert_eq!(first, frame(0, 2, 2, 10));
        assert_eq!(second.width, 3);
        assert_eq!(second.index, 1);
        assert!(read_ppm(&mut reader, 2).unwrap().is_none());
    }

    #[test]
    fn test_skips_header_comments() {
        let mut bytes = b"P6\n# made by hand\n1 1\n255\n".to_vec();
        bytes.extend([1, 2, 3]);

        let parsed = read_ppm(&mut Cursor::new(bytes), 0).unwrap().unwrap();
        assert_eq!(parsed.rgb, vec![1, 2, 3]);
    }

    #[test]
    fn test_truncated_frame_is_malformed() {
        let mut bytes = frame(0, 4, 4, 0).to_ppm();
        bytes.truncate(bytes.len() - 5);

        let err = read_ppm(&mut Cursor::new(bytes), 0).unwrap_err();
        assert!(matches!(err, MediaError::Malformed(_)));
    }

    #[test]
    fn test_wrong_magic_is_malformed() {
        let err = read_ppm(&mut Cursor::new(b"P3\n1 1\n255\n0 0 0".to_vec()), 0).unwrap_err();
        assert!(err.to_string().contains("P6"));
    }

    #[test]
    fn test_frame_from_image() {
        let image = DynamicImage::new_rgb8(4, 3);
        let frame = Frame::from_image(7, &image);

        assert_eq!(frame.index, 7);
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(frame.rgb.len(), 36);
    }

    #[test]
    fn test_ffmpeg_missing_input() {
        let demuxer = FfmpegDemuxer::default();
        let missing = Path::new("/nonexistent/clip.mp4");

        assert!(matches!(
            demuxer.extract_audio(missing, Path::new("/tmp/out.wav"), 16_000),
            Err(MediaError::InputNotFound(_))
        ));
        assert!(matches!(
            demuxer.open_frames(missing, 5),
            Err(MediaError::InputNotFound(_))
        ));
    }
}

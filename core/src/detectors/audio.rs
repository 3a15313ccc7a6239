//! WAV Audio Analyzer
//!
//! Front end for speech-to-text:
//! - Decodes PCM/float WAV files
//! - Converts other containers (mp3, ogg, m4a, ...) to WAV through the demuxer
//! - Downmixes any channel layout to mono
//! - Resamples to the transcriber's rate (16 kHz by default)
//! - Hands the waveform to an external transcription command

use super::{resolve_command, CommandRun};
use crate::analyzers::{AnalyzerError, AnalyzerResult, AudioAnalyzer, Waveform};
use crate::config::{CommandConfig, Config};
use crate::media::{FfmpegDemuxer, MediaDemuxer};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs `<command> <args…> <wav-path>` and reads the transcript from stdout
pub struct CommandTranscriber {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTranscriber {
    pub fn from_config(config: &CommandConfig) -> AnalyzerResult<Self> {
        let command = resolve_command(config, "transcription")?;
        Ok(Self {
            command,
            args: config.args.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn transcribe_file(&self, wav: &Path) -> AnalyzerResult<String> {
        let output = CommandRun {
            program: &self.command,
            args: &self.args,
            trailing: Some(wav),
            input: None,
            timeout: self.timeout,
        }
        .run()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Internal(format!(
                "transcriber exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

pub struct WavAudioAnalyzer {
    target_sample_rate: u32,
    transcriber: Option<CommandTranscriber>,
    converter: Option<Arc<dyn MediaDemuxer>>,
}

impl WavAudioAnalyzer {
    /// WAV-only decoder; `transcribe` fails until a transcriber is attached
    pub fn decoder(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            transcriber: None,
            converter: None,
        }
    }

    pub fn with_transcriber(mut self, transcriber: CommandTranscriber) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Fall back to `converter` for inputs hound cannot open
    pub fn with_converter(mut self, converter: Arc<dyn MediaDemuxer>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Requires a resolvable transcription command
    pub fn from_config(config: &Config) -> AnalyzerResult<Self> {
        let transcriber = CommandTranscriber::from_config(&config.transcriber)?;
        Ok(Self::decoder(config.target_sample_rate)
            .with_transcriber(transcriber)
            .with_converter(Arc::new(FfmpegDemuxer::new(&config.ffmpeg_path))))
    }

    fn waveform<R: std::io::Read>(&self, reader: WavReader<R>) -> AnalyzerResult<Waveform> {
        let spec = reader.spec();
        let interleaved = read_samples(reader, spec)?;
        let mono = downmix(&interleaved, spec.channels);
        let samples = resample_linear(&mono, spec.sample_rate, self.target_sample_rate);

        debug!(
            channels = spec.channels,
            source_rate = spec.sample_rate,
            samples = samples.len(),
            "decoded audio"
        );

        Ok(Waveform {
            samples,
            sample_rate: self.target_sample_rate,
        })
    }

    /// Transcode a non-WAV input to mono WAV at the target rate, then decode it
    fn decode_converted(
        &self,
        converter: &dyn MediaDemuxer,
        path: &Path,
        wav_error: hound::Error,
    ) -> AnalyzerResult<Waveform> {
        let scratch = tempfile::Builder::new()
            .prefix("scamwatch-convert-")
            .tempdir()?;
        let dest = scratch.path().join("converted.wav");

        converter
            .extract_audio(path, &dest, self.target_sample_rate)
            .map_err(|e| {
                AnalyzerError::DecodeFailure(format!(
                    "Not a WAV file ({}) and conversion failed: {}",
                    wav_error, e
                ))
            })?;
        debug!(path = %path.display(), "converted audio to WAV");

        let reader = WavReader::open(&dest).map_err(|e| {
            AnalyzerError::DecodeFailure(format!("Failed to open converted audio: {}", e))
        })?;
        self.waveform(reader)
    }
}

impl AudioAnalyzer for WavAudioAnalyzer {
    fn name(&self) -> &str {
        "wav_command_transcriber"
    }

    fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    fn decode(&self, path: &Path) -> AnalyzerResult<Waveform> {
        if !path.exists() {
            return Err(AnalyzerError::InputNotFound(path.display().to_string()));
        }

        match (WavReader::open(path), &self.converter) {
            (Ok(reader), _) => self.waveform(reader),
            (Err(e), Some(converter)) => self.decode_converted(converter.as_ref(), path, e),
            (Err(e), None) => Err(AnalyzerError::DecodeFailure(format!(
                "Failed to open WAV file: {}",
                e
            ))),
        }
    }

    fn transcribe(&self, waveform: &Waveform) -> AnalyzerResult<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            AnalyzerError::ModelUnavailable("no transcription command configured".to_string())
        })?;

        let wav = tempfile::Builder::new()
            .prefix("scamwatch-transcribe-")
            .suffix(".wav")
            .tempfile()?;
        write_wav(wav.path(), waveform)?;

        transcriber.transcribe_file(wav.path())
    }
}

fn read_samples<R: std::io::Read>(reader: WavReader<R>, spec: WavSpec) -> AnalyzerResult<Vec<f32>> {
    let decode_err = |e: hound::Error| AnalyzerError::DecodeFailure(e.to_string());

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_err),
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)
        }
        (format, bits) => Err(AnalyzerError::DecodeFailure(format!(
            "Unsupported WAV format: {:?} {} bits",
            format, bits
        ))),
    }
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let left = (pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let frac = (pos - left as f64) as f32;
            samples[left] + (samples[right] - samples[left]) * frac
        })
        .collect()
}

fn write_wav(path: &Path, waveform: &Waveform) -> AnalyzerResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let internal = |e: hound::Error| AnalyzerError::Internal(format!("Failed to write WAV: {}", e));

    let mut writer = WavWriter::create(path, spec).map_err(internal)?;
    for &sample in &waveform.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(internal)?;
    }
    writer.finalize().map_err(internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FrameSource, MediaError, MediaResult};
    use tempfile::TempDir;

    /// Stands in for ffmpeg: "converts" by writing a 1 s, 8 kHz mono WAV,
    /// or fails when `fail` is set.
    struct FixtureConverter {
        fail: bool,
    }

    impl MediaDemuxer for FixtureConverter {
        fn extract_audio(&self, _input: &Path, dest: &Path, _rate: u32) -> MediaResult<()> {
            if self.fail {
                return Err(MediaError::Ffmpeg("Invalid data found when processing input".to_string()));
            }
            write_fixture(dest, 1, 8_000, 8_000);
            Ok(())
        }

        fn open_frames(&self, _video: &Path, _limit: usize) -> MediaResult<Box<dyn FrameSource>> {
            Err(MediaError::Malformed("audio only".to_string()))
        }
    }

    fn write_fixture(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let sample = if ch == 0 { 16_384 } else { 0 };
                writer.write_sample(sample as i16 + (i % 2) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_missing_file() {
        let analyzer = WavAudioAnalyzer::decoder(16_000);
        let err = analyzer.decode(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AnalyzerError::InputNotFound(_)));
    }

    #[test]
    fn test_decode_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let err = WavAudioAnalyzer::decoder(16_000).decode(&path).unwrap_err();
        assert!(matches!(err, AnalyzerError::DecodeFailure(_)));
    }

    #[test]
    fn test_decode_downmixes_and_resamples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        // one second of 44.1 kHz stereo
        write_fixture(&path, 2, 44_100, 44_100);

        let waveform = WavAudioAnalyzer::decoder(16_000).decode(&path).unwrap();

        assert_eq!(waveform.sample_rate, 16_000);
        assert_eq!(waveform.samples.len(), 16_000);
        // left at 0.5, right at 0.0 -> mono around 0.25
        assert!(waveform.samples.iter().all(|s| (s - 0.25).abs() < 0.01));
        assert!((waveform.duration_secs() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_wav_input_is_converted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("voicemail.mp3");
        std::fs::write(&path, b"ID3\x04 not a riff header").unwrap();

        let waveform = WavAudioAnalyzer::decoder(16_000)
            .with_converter(Arc::new(FixtureConverter { fail: false }))
            .decode(&path)
            .unwrap();

        assert_eq!(waveform.sample_rate, 16_000);
        assert_eq!(waveform.samples.len(), 16_000);
    }

    #[test]
    fn test_failed_conversion_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ogg");
        std::fs::write(&path, b"garbage").unwrap();

        let err = WavAudioAnalyzer::decoder(16_000)
            .with_converter(Arc::new(FixtureConverter { fail: true }))
            .decode(&path)
            .unwrap_err();

        assert!(matches!(err, AnalyzerError::DecodeFailure(_)));
        assert!(err.to_string().contains("conversion failed"));
    }

    #[test]
    fn test_decode_keeps_matching_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mono.wav");
        write_fixture(&path, 1, 16_000, 1_600);

        let waveform = WavAudioAnalyzer::decoder(16_000).decode(&path).unwrap();
        assert_eq!(waveform.samples.len(), 1_600);
    }

    #[test]
    fn test_transcribe_without_command() {
        let waveform = Waveform {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
        };
        let err = WavAudioAnalyzer::decoder(16_000)
            .transcribe(&waveform)
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::ModelUnavailable(_)));
    }

    #[test]
    fn test_from_config_requires_transcriber() {
        let err = WavAudioAnalyzer::from_config(&Config::default()).err().unwrap();
        assert!(matches!(err, AnalyzerError::ModelUnavailable(_)));
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 32_000, 16_000);

        assert_eq!(out.len(), 50);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[10], 20.0);
    }

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transcriber_reads_stdout() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("speech.wav");
        write_fixture(&wav, 1, 16_000, 160);

        let mut config = CommandConfig::new("sh");
        config.args = vec!["-c".to_string(), "echo '  hello  '".to_string()];
        let transcriber = CommandTranscriber::from_config(&config).unwrap();

        assert_eq!(transcriber.transcribe_file(&wav).unwrap(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_transcriber_times_out() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("speech.wav");
        write_fixture(&wav, 1, 16_000, 160);

        let mut config = CommandConfig::new("sh");
        config.args = vec!["-c".to_string(), "sleep 30".to_string()];
        config.timeout_secs = 1;
        let transcriber = CommandTranscriber::from_config(&config).unwrap();

        let err = transcriber.transcribe_file(&wav).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}

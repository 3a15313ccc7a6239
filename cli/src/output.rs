//! Terminal rendering for envelopes and analyzer status.

use colored::{ColoredString, Colorize};
use scamwatch_core::{
    AudioResult, AvailabilityReport, Envelope, FrameVerdict, ModalityStatus, TextResult,
    VideoResult,
};

fn label_color(label: &str) -> ColoredString {
    match label {
        "scam" => "SCAM".red().bold(),
        "suspicious" => "SUSPICIOUS".yellow(),
        "legitimate" => "LEGITIMATE".green(),
        other => other.to_uppercase().white(),
    }
}

pub fn print_envelope(envelope: &Envelope) {
    println!();
    match envelope {
        Envelope::TextAnalysis(result) => {
            println!("{}", "Text analysis".cyan().bold());
            print_text(result, "  ");
        }
        Envelope::AudioAnalysis(result) => {
            println!("{}", "Audio analysis".cyan().bold());
            print_audio(result, "  ");
        }
        Envelope::VideoAnalysis(result) => {
            println!("{}", "Video analysis".cyan().bold());
            print_video(result);
        }
    }
    println!();
}

fn print_error(message: &str, indent: &str) {
    println!("{}{}: {}", indent, "Error".red(), message);
}

fn print_text(result: &TextResult, indent: &str) {
    match result {
        TextResult::Verdict(verdict) => {
            println!(
                "{}[{}] scam probability {:.0}%",
                indent,
                label_color(&verdict.label),
                verdict.scam_probability * 100.0
            );
            if let Some(details) = &verdict.details {
                println!("{}{}", indent, details.dimmed());
            }
        }
        TextResult::Error(body) => print_error(&body.error, indent),
    }
}

fn print_audio(result: &AudioResult, indent: &str) {
    match result {
        AudioResult::Analysis(audio) => {
            let transcript = if audio.transcription.is_empty() {
                "(silence)".to_string()
            } else {
                format!("\"{}\"", audio.transcription)
            };
            println!("{}Transcription: {}", indent, transcript.white());
            print_text(&audio.scam_analysis, indent);
        }
        AudioResult::Error(body) => print_error(&body.error, indent),
    }
}

fn print_video(result: &VideoResult) {
    let analysis = match result {
        VideoResult::Analysis(analysis) => analysis,
        VideoResult::Error(body) => return print_error(&body.error, "  "),
    };

    println!(
        "  Sampled {} {}:",
        analysis.frame_checks.len().to_string().yellow().bold(),
        if analysis.frame_checks.len() == 1 {
            "frame"
        } else {
            "frames"
        }
    );
    for (index, verdict) in analysis.frame_checks.iter().enumerate() {
        println!("    #{} {}", index, frame_summary(verdict));
    }

    match &analysis.audio_analysis {
        Some(audio) => {
            println!("  {}", "Audio track:".white().bold());
            print_audio(audio, "    ");
        }
        None => println!("  {}", "No audio track analyzed".dimmed()),
    }

    let fakes = analysis
        .frame_checks
        .iter()
        .filter(|v| v.is_deepfake())
        .count();
    if fakes > 0 {
        println!();
        println!(
            "{}",
            format!("⚠ {} frame(s) show a face judged not real", fakes)
                .red()
                .bold()
        );
    }
}

fn frame_summary(verdict: &FrameVerdict) -> String {
    if let Some(error) = &verdict.error {
        return format!("{} {}", "error".red(), error);
    }
    if !verdict.face_detected {
        return "no face".dimmed().to_string();
    }

    let judgement = match verdict.is_real {
        Some(true) => "real face".green(),
        Some(false) => "DEEPFAKE".red().bold(),
        None => "face, undecided".yellow(),
    };
    match verdict.confidence {
        Some(confidence) => format!("{} ({:.0}%)", judgement, confidence * 100.0),
        None => judgement.to_string(),
    }
}

pub fn print_availability(report: &AvailabilityReport, verbose: bool) {
    println!();
    println!("{}", "Analyzers:".green().bold());
    println!();

    for (modality, status) in [
        ("text", &report.text),
        ("audio", &report.audio),
        ("video", &report.video),
    ] {
        print_status(modality, status, verbose);
    }

    if !verbose {
        println!();
        println!("Use --verbose for failure reasons");
    }
}

fn print_status(modality: &str, status: &ModalityStatus, verbose: bool) {
    let marker = if status.available {
        "●".green()
    } else {
        "●".red()
    };
    let name = status.analyzer.as_deref().unwrap_or("unavailable");
    println!("  {} {:<6} {}", marker, modality.white().bold(), name);

    if verbose {
        if let Some(reason) = &status.reason {
            println!("    {}", reason.dimmed());
        }
    }
}

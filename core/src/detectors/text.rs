//! Keyword Text Analyzer
//!
//! Scores text for common scam tactics:
//! - Urgency and pressure ("act now", "final notice")
//! - Payment requests through untraceable channels (gift cards, crypto, wires)
//! - Credential phishing (passwords, one-time codes, SSNs)
//! - Prize and lottery bait
//! - Impersonation of banks, tax offices, support desks
//! - Threats of account closure or legal action
//! - Links and click-bait calls to action
//!
//! Each matched tactic contributes an independent probability; the combined
//! score is `1 - Π(1 - weight)` over the tactics present.

use crate::analyzers::{AnalyzerError, AnalyzerResult, TextAnalyzer, TextVerdict};
use crate::config::TextConfig;
use regex::Regex;

struct Tactic {
    name: &'static str,
    regex: Regex,
    weight: f32,
}

const TACTICS: &[(&str, &str, f32)] = &[
    (
        "urgency",
        r"(?i)\b(act now|urgent(ly)?|immediately|right away|limited time|expires? (today|soon)|final notice|last chance|click now)\b",
        0.35,
    ),
    (
        "payment_request",
        r"(?i)\b(wire transfer|gift ?cards?|bitcoin|crypto(currency)?|western union|moneygram|bank transfer|processing fee|pay(ment)? (now|immediately))\b",
        0.45,
    ),
    (
        "credential_phishing",
        r"(?i)\b(verify your (account|identity)|password|social security|ssn|pin number|login details|bank account (number|details)|one[- ]time (code|password)|otp)\b",
        0.45,
    ),
    (
        "prize_bait",
        r"(?i)\b(you('ve| have)? won|winner|lottery|prize|free (money|gift|iphone|vacation)|claim your|congratulations|inheritance|cash reward)\b",
        0.4,
    ),
    (
        "impersonation",
        r"(?i)\b(irs|tax office|customer support|tech support|microsoft support|your bank|police|arrest warrant)\b",
        0.3,
    ),
    (
        "threat",
        r"(?i)\b(account (will be )?(closed|locked|suspended)|legal action|lawsuit|deport(ed|ation)?|penalt(y|ies))\b",
        0.35,
    ),
    (
        "suspicious_link",
        r"(?i)(https?://\S+|\bwww\.\S+|\bbit\.ly/|\btinyurl\.com/|\bclick (here|the link|now)\b)",
        0.25,
    ),
];

pub struct KeywordTextAnalyzer {
    tactics: Vec<Tactic>,
    scam_threshold: f32,
    suspicious_threshold: f32,
}

impl KeywordTextAnalyzer {
    pub fn new() -> AnalyzerResult<Self> {
        Self::from_config(&TextConfig::default())
    }

    pub fn from_config(config: &TextConfig) -> AnalyzerResult<Self> {
        let tactics = TACTICS
            .iter()
            .map(|&(name, pattern, weight)| {
                Regex::new(pattern)
                    .map(|regex| Tactic {
                        name,
                        regex,
                        weight,
                    })
                    .map_err(|e| {
                        AnalyzerError::ModelUnavailable(format!("bad pattern for {}: {}", name, e))
                    })
            })
            .collect::<AnalyzerResult<Vec<_>>>()?;

        Ok(Self {
            tactics,
            scam_threshold: config.scam_threshold,
            suspicious_threshold: config.suspicious_threshold,
        })
    }

    fn label(&self, probability: f32) -> &'static str {
        if probability >= self.scam_threshold {
            "scam"
        } else if probability >= self.suspicious_threshold {
            "suspicious"
        } else {
            "legitimate"
        }
    }
}

impl TextAnalyzer for KeywordTextAnalyzer {
    fn name(&self) -> &str {
        "keyword_text"
    }

    fn predict(&self, text: &str) -> AnalyzerResult<TextVerdict> {
        let mut clean = 1.0f32;
        let mut matched = Vec::new();

        for tactic in &self.tactics {
            let hits: Vec<&str> = tactic.regex.find_iter(text).map(|m| m.as_str()).collect();
            if !hits.is_empty() {
                clean *= 1.0 - tactic.weight;
                matched.push(format!("{} ({})", tactic.name, hits.join(", ")));
            }
        }

        let scam_probability = (1.0 - clean).clamp(0.0, 1.0);
        let details = if matched.is_empty() {
            None
        } else {
            Some(format!("Matched tactics: {}", matched.join("; ")))
        };

        Ok(TextVerdict {
            scam_probability,
            label: self.label(scam_probability).to_string(),
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> KeywordTextAnalyzer {
        KeywordTextAnalyzer::new().unwrap()
    }

    #[test]
    fn test_flags_prize_and_urgency() {
        let verdict = analyzer().predict("free money click now").unwrap();

        assert!(verdict.scam_probability >= 0.7);
        assert_eq!(verdict.label, "scam");
        let details = verdict.details.unwrap();
        assert!(details.contains("prize_bait"));
        assert!(details.contains("urgency"));
    }

    #[test]
    fn test_benign_text_is_legitimate() {
        let verdict = analyzer().predict("hello, see you at lunch tomorrow").unwrap();

        assert_eq!(verdict.scam_probability, 0.0);
        assert_eq!(verdict.label, "legitimate");
        assert!(verdict.details.is_none());
    }

    #[test]
    fn test_single_tactic_is_suspicious() {
        let verdict = analyzer()
            .predict("Please buy two gift cards for the office party")
            .unwrap();

        assert!((verdict.scam_probability - 0.45).abs() < 1e-6);
        assert_eq!(verdict.label, "suspicious");
    }

    #[test]
    fn test_empty_text_is_not_an_error() {
        let verdict = analyzer().predict("   ").unwrap();
        assert_eq!(verdict.label, "legitimate");
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = KeywordTextAnalyzer::from_config(&TextConfig {
            scam_threshold: 0.25,
            suspicious_threshold: 0.1,
        })
        .unwrap();

        let verdict = strict.predict("Your bank needs you to call us").unwrap();
        assert_eq!(verdict.label, "scam");
    }

    #[test]
    fn test_probability_stays_in_range() {
        let verdict = analyzer()
            .predict(
                "URGENT final notice from the IRS: you have won a prize! Verify your account \
                 password and pay the processing fee by gift card or bitcoin at http://x.co \
                 or your account will be suspended and legal action follows.",
            )
            .unwrap();

        assert!(verdict.scam_probability <= 1.0);
        assert!(verdict.scam_probability > 0.95);
    }
}

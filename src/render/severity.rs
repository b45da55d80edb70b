//! Keyword-based severity tagging of finished text lines.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual severity of a line. Declared in priority order: when a line
/// mentions keywords of several categories the first one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warn,
    Notice,
    Success,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warn,
        Severity::Notice,
        Severity::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Notice => "notice",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword lists per severity, as found in `[render.severity]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityKeywords {
    pub critical: Vec<String>,
    pub error: Vec<String>,
    pub warn: Vec<String>,
    pub notice: Vec<String>,
    pub success: Vec<String>,
}

impl Default for SeverityKeywords {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|w| w.to_string()).collect()
        }
        Self {
            critical: words(&["critical", "fatal"]),
            error: words(&["error"]),
            warn: words(&["warn", "warning"]),
            notice: words(&["notice"]),
            success: words(&["success", "good"]),
        }
    }
}

impl SeverityKeywords {
    fn for_severity(&self, severity: Severity) -> &[String] {
        match severity {
            Severity::Critical => &self.critical,
            Severity::Error => &self.error,
            Severity::Warn => &self.warn,
            Severity::Notice => &self.notice,
            Severity::Success => &self.success,
        }
    }
}

/// Compiled keyword matcher. Matching is case-insensitive on whole words.
#[derive(Debug, Clone)]
pub struct SeverityPolicy {
    rules: Vec<(Severity, Regex)>,
}

static DEFAULT_POLICY: Lazy<SeverityPolicy> = Lazy::new(|| {
    SeverityPolicy::new(&SeverityKeywords::default()).expect("Invalid default severity keywords")
});

impl SeverityPolicy {
    pub fn new(keywords: &SeverityKeywords) -> Result<Self, regex::Error> {
        let mut rules = Vec::new();
        for severity in Severity::ALL {
            let words: Vec<String> = keywords
                .for_severity(severity)
                .iter()
                .map(|w| w.trim())
                .filter(|w| !w.is_empty())
                .map(regex::escape)
                .collect();
            if words.is_empty() {
                continue;
            }
            let pattern = format!(r"(?i)\b(?:{})\b", words.join("|"));
            rules.push((severity, Regex::new(&pattern)?));
        }
        Ok(Self { rules })
    }

    /// Severity of a finished line's text, if any keyword matches.
    pub fn classify(&self, text: &str) -> Option<Severity> {
        self.rules
            .iter()
            .find(|(_, regex)| regex.is_match(text))
            .map(|(severity, _)| *severity)
    }
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

//! Metainfo validation.
//!
//! The validator is a pluggable seam: the built-in implementation does
//! structural checks, a heavier external validator can be slotted in
//! behind the same trait. Instances are pooled and indexed by worker so
//! that each one is reused without being shared between threads, and
//! their lifetimes end with the pool instead of with a thread-local.

use asgen_model::hints::{self, HintSeverity};
use asgen_model::metainfo;
use std::sync::Mutex;

/// One issue reported by a validator. The tag is registered (prefixed
/// with `asv-`) so severities resolve through the normal hint registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorIssue {
    pub tag: String,
    pub severity: HintSeverity,
    pub explanation: String,
    pub line: Option<u32>,
}

pub trait MetainfoValidator: Send {
    fn validate(&mut self, data: &[u8]) -> Vec<ValidatorIssue>;
}

/// Structural checks that do not need the full AppStream spec machinery.
#[derive(Default)]
pub struct BasicValidator;

impl MetainfoValidator for BasicValidator {
    fn validate(&mut self, data: &[u8]) -> Vec<ValidatorIssue> {
        let mut issues = Vec::new();
        let Ok(parsed) = metainfo::parse_metainfo(data) else {
            // Parse failures surface through their own hint; nothing to
            // validate here.
            return issues;
        };
        let cpt = parsed.component;
        let text = String::from_utf8_lossy(data);

        if cpt.id.split('.').count() < 3 {
            issues.push(ValidatorIssue {
                tag: "cid-missing-rdns".to_string(),
                severity: HintSeverity::Info,
                explanation: "The component id should use a reverse-DNS scheme, e.g. org.example.App.".to_string(),
                line: line_of(&text, "<id>"),
            });
        }
        if cpt
            .id
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
        {
            issues.push(ValidatorIssue {
                tag: "cid-has-number-prefix".to_string(),
                severity: HintSeverity::Info,
                explanation: "The component id starts with a digit, which some tools mishandle.".to_string(),
                line: line_of(&text, "<id>"),
            });
        }
        if let Some(summary) = cpt.summary.get("C") {
            if summary.len() > 90 {
                issues.push(ValidatorIssue {
                    tag: "summary-too-long".to_string(),
                    severity: HintSeverity::Info,
                    explanation: "Summaries over 90 characters are truncated by software centers.".to_string(),
                    line: line_of(&text, "<summary>"),
                });
            }
            if summary.ends_with('.') {
                issues.push(ValidatorIssue {
                    tag: "summary-ends-in-dot".to_string(),
                    severity: HintSeverity::Pedantic,
                    explanation: "The summary should not end with a full stop.".to_string(),
                    line: line_of(&text, "<summary>"),
                });
            }
        }
        if !cpt.releases.is_empty() {
            let sorted_desc = cpt.releases.windows(2).all(|pair| {
                asgen_model::vercmp::compare_versions(&pair[0].version, &pair[1].version)
                    != std::cmp::Ordering::Less
            });
            if !sorted_desc {
                issues.push(ValidatorIssue {
                    tag: "releases-not-in-order".to_string(),
                    severity: HintSeverity::Warning,
                    explanation: "Release entries are not sorted newest-first.".to_string(),
                    line: line_of(&text, "<releases>"),
                });
            }
        }

        issues
    }
}

/// A small pool of validator instances keyed by worker index.
pub struct ValidatorPool {
    validators: Vec<Mutex<Box<dyn MetainfoValidator>>>,
}

impl ValidatorPool {
    pub fn new(workers: usize) -> ValidatorPool {
        let count = workers.max(1);
        ValidatorPool {
            validators: (0..count)
                .map(|_| {
                    Mutex::new(Box::new(BasicValidator) as Box<dyn MetainfoValidator>)
                })
                .collect(),
        }
    }

    /// Validate with the instance belonging to `worker_index`, and make
    /// sure all reported tags are known to the registry under their
    /// `asv-` name.
    pub fn validate(&self, worker_index: usize, data: &[u8]) -> Vec<ValidatorIssue> {
        let slot = worker_index % self.validators.len();
        let mut validator = self.validators[slot].lock().expect("validator poisoned");
        let mut issues = validator.validate(data);
        for issue in &mut issues {
            issue.tag = format!("asv-{}", issue.tag);
            hints::register_tag(&issue.tag, issue.severity, &issue.explanation);
        }
        issues
    }
}

fn line_of(text: &str, needle: &str) -> Option<u32> {
    let pos = text.find(needle)?;
    Some(text[..pos].bytes().filter(|b| *b == b'\n').count() as u32 + 1)
}

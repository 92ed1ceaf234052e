//! Release-label extraction from commit comments.
//!
//! A commit message may carry one `@LABEL_NAME` token (upper-case letters,
//! digits and underscores). The first token of each message names a label to
//! attach to every version checked in by the push; the token itself is removed
//! from the text that becomes the ClearCase comment.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::debug;

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@[A-Z_0-9]+").expect("label pattern is valid"))
}

/// Label found in a single comment, plus the comment with the token removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedComment {
    pub label: Option<String>,
    pub stripped: String,
}

/// Scan one comment for its first label token.
pub fn scan_comment(comment: &str) -> ScannedComment {
    match label_pattern().find(comment) {
        Some(m) => {
            let label = m.as_str()[1..].to_string();
            let mut stripped = String::with_capacity(comment.len());
            stripped.push_str(&comment[..m.start()]);
            stripped.push_str(&comment[m.end()..]);
            debug!(label = %label, "label token found");
            ScannedComment {
                label: Some(label),
                stripped,
            }
        }
        None => ScannedComment {
            label: None,
            stripped: comment.to_string(),
        },
    }
}

/// Labels and cleaned comments for a whole push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelScan {
    /// Distinct label names, sorted.
    pub labels: BTreeSet<String>,
    /// Input comments in the same order, label tokens removed.
    pub stripped_comments: Vec<String>,
}

impl LabelScan {
    pub fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }
}

/// Scan every comment of a push.
pub fn extract<S: AsRef<str>>(comments: &[S]) -> LabelScan {
    let mut scan = LabelScan::default();
    for comment in comments {
        let scanned = scan_comment(comment.as_ref());
        if let Some(label) = scanned.label {
            scan.labels.insert(label);
        }
        scan.stripped_comments.push(scanned.stripped);
    }
    scan
}

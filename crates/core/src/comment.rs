//! ClearCase comment formatting.

use crate::config::CommentConfig;

/// Formats the comments passed to `cleartool` using configurable templates.
#[derive(Debug, Clone)]
pub struct CommentFormatter {
    checkout_template: String,
    new_directory: String,
    directory_change: String,
    new_file: String,
}

impl CommentFormatter {
    pub fn new(config: &CommentConfig) -> Self {
        Self {
            checkout_template: config.checkout.clone(),
            new_directory: config.new_directory.clone(),
            directory_change: config.directory_change.clone(),
            new_file: config.new_file.clone(),
        }
    }

    /// Checkout comment for a modified file: committer plus every commit
    /// comment of the push (label tokens already removed), one per line.
    pub fn checkout_comment<S: AsRef<str>>(&self, committer: &str, comments: &[S]) -> String {
        let body = comments
            .iter()
            .map(|c| c.as_ref().trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        self.checkout_template
            .replace("{committer}", committer.trim())
            .replace("{comments}", &body)
    }

    pub fn new_directory(&self) -> &str {
        &self.new_directory
    }

    pub fn directory_change(&self) -> &str {
        &self.directory_change
    }

    pub fn new_file(&self) -> &str {
        &self.new_file
    }
}

impl Default for CommentFormatter {
    fn default() -> Self {
        Self::new(&CommentConfig::default())
    }
}

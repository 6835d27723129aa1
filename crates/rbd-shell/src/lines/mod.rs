//! Line filters over captured command output.
//!
//! Lines are split on `\n` with a trailing `\r` removed, so a match never
//! spans two lines. Neither filter returns an error: an unusable pattern is
//! logged and yields an empty result.

use regex::{Captures, Regex};
use tracing::error;

use crate::error::PatternError;

/// Tracing target for line filtering.
const LINES_TARGET: &str = "rbd_shell::lines";

/// A line accepted by [`regexp_lines`], decomposed into capture groups.
///
/// Group 0 is the whole match; groups that did not participate in the match
/// are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedLine<'a> {
    groups: Vec<&'a str>,
}

impl<'a> MatchedLine<'a> {
    fn from_captures(captures: &Captures<'a>) -> Self {
        let groups = captures
            .iter()
            .map(|group| group.map_or("", |found| found.as_str()))
            .collect();
        Self { groups }
    }

    /// Text matched by the whole pattern.
    #[must_use]
    pub fn full_match(&self) -> &'a str {
        self.groups.first().copied().unwrap_or_default()
    }

    /// Capture group `index`, where 0 is the whole match.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&'a str> {
        self.groups.get(index).copied()
    }

    /// All groups in pattern order.
    #[must_use]
    pub fn groups(&self) -> &[&'a str] {
        &self.groups
    }

    /// Consumes the match, returning the groups.
    #[must_use]
    pub fn into_groups(self) -> Vec<&'a str> {
        self.groups
    }
}

/// Returns, in order, every line of `text` containing `pattern` literally.
///
/// An empty `pattern` is logged and yields no lines.
#[must_use]
pub fn grep_lines<'a>(text: &'a str, pattern: &str) -> Vec<&'a str> {
    if pattern.is_empty() {
        error!(target: LINES_TARGET, error = %PatternError::Empty, "line filter skipped");
        return Vec::new();
    }
    text.lines().filter(|line| line.contains(pattern)).collect()
}

/// Returns the capture groups of every line of `text` matching `pattern`.
///
/// A pattern that fails to compile is logged and yields no matches.
#[must_use]
pub fn regexp_lines<'a>(text: &'a str, pattern: &str) -> Vec<MatchedLine<'a>> {
    let regex = match compile(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            error!(target: LINES_TARGET, error = %err, "line filter skipped");
            return Vec::new();
        }
    };
    text.lines()
        .filter_map(|line| regex.captures(line))
        .map(|captures| MatchedLine::from_captures(&captures))
        .collect()
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Invalid {
        pattern: pattern.to_owned(),
        source,
    })
}

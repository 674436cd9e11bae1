//! Glob matching of staged files against configured patterns.
//!
//! Patterns support brace alternatives (`*.{js,ts}`), which are expanded
//! before being handed to [`glob::Pattern`]. A pattern without a `/` matches
//! file names in any directory. Files outside the configuration directory
//! are only considered by patterns starting with `../`.

use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};
use thiserror::Error;

use crate::git::StagedFile;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Unbalanced braces in pattern `{pattern}`")]
    UnbalancedBraces { pattern: String },

    #[error("Invalid pattern `{pattern}`: {message}")]
    InvalidGlob { pattern: String, message: String },
}

impl PatternError {
    pub fn pattern(&self) -> &str {
        match self {
            PatternError::UnbalancedBraces { pattern } | PatternError::InvalidGlob { pattern, .. } => {
                pattern
            }
        }
    }
}

fn check_balanced(pattern: &str) -> Result<(), PatternError> {
    let mut depth = 0usize;
    for c in pattern.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| PatternError::UnbalancedBraces {
                    pattern: pattern.to_string(),
                })?
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PatternError::UnbalancedBraces {
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// Split the inside of a brace group on commas that are not nested deeper
fn split_alternatives(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

fn expand_balanced(pattern: &str, out: &mut Vec<String>) {
    let Some(open) = pattern.find('{') else {
        if !out.iter().any(|existing| existing == pattern) {
            out.push(pattern.to_string());
        }
        return;
    };

    let mut depth = 0usize;
    let mut close = pattern.len();
    for (i, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = open + i;
                    break;
                }
            }
            _ => {}
        }
    }

    let prefix = &pattern[..open];
    let inner = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];
    for alternative in split_alternatives(inner) {
        expand_balanced(&format!("{prefix}{alternative}{suffix}"), out);
    }
}

/// Expand brace alternatives, keeping the first occurrence of duplicates
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, PatternError> {
    check_balanced(pattern)?;
    let mut out = Vec::new();
    expand_balanced(pattern, &mut out);
    Ok(out)
}

/// Path of `file` relative to `dir`, with forward slashes
pub fn relative_path(dir: &Path, file: &Path) -> String {
    let from: Vec<Component> = dir.components().collect();
    let to: Vec<Component> = file.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = std::iter::repeat("..".to_string())
        .take(from.len() - common)
        .collect();
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// A compiled configuration pattern
#[derive(Debug, Clone)]
pub struct FileMatcher {
    pattern: String,
    globs: Vec<Pattern>,
    match_base: bool,
    parent_dir: bool,
}

impl FileMatcher {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let globs = expand_braces(pattern)?
            .iter()
            .map(|expanded| {
                Pattern::new(expanded).map_err(|e| PatternError::InvalidGlob {
                    pattern: pattern.to_string(),
                    message: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pattern: pattern.to_string(),
            globs,
            match_base: !pattern.contains('/'),
            parent_dir: pattern.starts_with("../"),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a path relative to the configuration directory
    pub fn is_match(&self, relative: &str) -> bool {
        if !self.parent_dir && (relative.starts_with("..") || Path::new(relative).is_absolute()) {
            return false;
        }

        let candidate = if self.match_base {
            relative.rsplit('/').next().unwrap_or(relative)
        } else {
            relative
        };

        self.globs
            .iter()
            .any(|glob| glob.matches_with(candidate, MATCH_OPTIONS))
    }
}

/// Staged files under `dir` matching `pattern`, in their original order
pub fn match_files(
    dir: &Path,
    pattern: &str,
    files: &[StagedFile],
) -> Result<Vec<StagedFile>, PatternError> {
    let matcher = FileMatcher::new(pattern)?;
    Ok(files
        .iter()
        .filter(|file| matcher.is_match(&relative_path(dir, Path::new(&file.path))))
        .cloned()
        .collect())
}

//! Policy location parsing and file-pattern expansion.
//!
//! A location of the form `file://DIR/*SUFFIX` expands to the regular
//! files under `DIR` whose name ends with `SUFFIX`. A sequence of leading
//! wildcards sets the directory depth searched: `file://DIR/*.xml` stays
//! in `DIR`, `file://DIR/**.xml` descends one level of subdirectories,
//! and so on. Anything else is passed through as a URL for the host's
//! resource loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::error::ProviderError;

const FILE_URL_PREFIX: &str = "file://";

/// `**…*SUFFIX`: the leading wildcard run is the search depth, the
/// remainder (wildcard-free) the filename suffix.
fn wildcard_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\*+)([^*]*)$").expect("hard-coded pattern compiles"))
}

/// A parsed policy location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyLocation {
    /// A file pattern to expand against the filesystem.
    FilePattern {
        /// The directory to search.
        directory: PathBuf,
        /// How many directory levels to search (1 = the directory
        /// itself).
        max_depth: usize,
        /// Required filename suffix; may be empty.
        suffix: String,
    },
    /// Any other location, handed to the host's resource loader.
    Url(String),
}

impl PolicyLocation {
    /// Parses a location string.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InvalidLocation`] for malformed file patterns.
    pub fn parse(location: &str) -> Result<Self, ProviderError> {
        let Some(after_scheme) = location.strip_prefix(FILE_URL_PREFIX) else {
            return Ok(Self::Url(location.to_string()));
        };
        if location.ends_with('/') {
            return Err(ProviderError::InvalidLocation {
                location: location.to_string(),
                reason: "trailing '/'".to_string(),
            });
        }

        let Some(index) = after_scheme.find("/*") else {
            // A plain file URL, no pattern to expand.
            return Ok(Self::Url(location.to_string()));
        };
        if index == 0 {
            return Err(ProviderError::InvalidLocation {
                location: location.to_string(),
                reason: "empty directory part".to_string(),
            });
        }

        let directory = &after_scheme[..index];
        let file_pattern = &after_scheme[index + 1..];
        let captures = wildcard_prefix_pattern().captures(file_pattern).ok_or_else(|| {
            ProviderError::InvalidLocation {
                location: location.to_string(),
                reason: format!(
                    "pattern part '{file_pattern}' must be wildcards followed by a suffix"
                ),
            }
        })?;

        let max_depth = captures.get(1).map_or(0, |m| m.as_str().len());
        let suffix = captures.get(2).map_or("", |m| m.as_str()).to_string();
        Ok(Self::FilePattern {
            directory: PathBuf::from(directory),
            max_depth,
            suffix,
        })
    }

    /// Expands a file pattern to matching file paths, sorted for
    /// deterministic load order. URLs expand to themselves.
    ///
    /// # Errors
    ///
    /// [`ProviderError::LocationIo`] when directory listing fails.
    pub fn expand(&self) -> Result<Vec<PathBuf>, ProviderError> {
        match self {
            Self::Url(url) => Ok(vec![PathBuf::from(url)]),
            Self::FilePattern { directory, max_depth, suffix } => {
                let mut files = Vec::new();
                collect_files(directory, *max_depth, suffix, &mut files).map_err(|source| {
                    ProviderError::LocationIo {
                        location: format!("{}", directory.display()),
                        source,
                    }
                })?;
                files.sort();
                Ok(files)
            }
        }
    }
}

fn collect_files(
    directory: &Path,
    remaining_depth: usize,
    suffix: &str,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    if remaining_depth == 0 {
        return Ok(());
    }
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_file() {
            let name_matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix));
            if name_matches {
                out.push(path);
            }
        } else if file_type.is_dir() {
            collect_files(&path, remaining_depth - 1, suffix, out)?;
        }
    }
    Ok(())
}

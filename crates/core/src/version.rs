//! Lenient dotted version numbers (`1.80`, `1.91.0`, `1.93.0-nightly`).
//!
//! Missing trailing segments compare as zero, so `1.80` equals `1.80.0`.
//! A pre-release tag sorts before the release it precedes.

use std::{cmp::Ordering, fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        input.parse()
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre.is_some()
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        // build metadata never takes part in ordering
        let without_build = trimmed.split('+').next().unwrap_or(trimmed);
        let (release, pre) = match without_build.split_once('-') {
            Some((release, pre)) if !pre.is_empty() => (release, Some(pre.to_string())),
            Some(_) => {
                return Err(VersionError::Invalid {
                    input: trimmed.to_string(),
                })
            }
            None => (without_build, None),
        };

        let segments = release
            .split('.')
            .map(|segment| {
                segment.parse::<u64>().map_err(|_| VersionError::InvalidSegment {
                    input: trimmed.to_string(),
                    segment: segment.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments, pre })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for index in 0..len {
            match self.segment(index).cmp(&other.segment(index)) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .segments
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre {
            Some(pre) => write!(f, "{release}-{pre}"),
            None => f.write_str(&release),
        }
    }
}

/// Errors emitted when a version string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,
    #[error("malformed version `{input}`")]
    Invalid { input: String },
    #[error("malformed version `{input}`: segment `{segment}` is not a number")]
    InvalidSegment { input: String, segment: String },
}

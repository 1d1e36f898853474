//! Dotted `major.minor.patch` version identifiers.
//!
//! Release versions are read from a small text file (e.g. `2.4.9\n`) and
//! split into numeric components that feed the rewrite rules.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while parsing a version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid version '{value}': expected 3 dot-separated segments, found {found}")]
    SegmentCount { value: String, found: usize },

    #[error("invalid version '{value}': segment '{segment}' is not a non-negative integer")]
    InvalidSegment { value: String, segment: String },
}

/// Errors while reading a version file.
#[derive(Error, Debug)]
pub enum VersionFileError {
    #[error("failed to read version file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} contains a malformed version: {source}", path.display())]
    Format { path: PathBuf, source: FormatError },
}

/// A release version with exactly three numeric components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionIdentifier {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionIdentifier {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::str::FromStr for VersionIdentifier {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

/// Parse a dotted version string such as `"2.4.9"`.
///
/// Surrounding whitespace (a trailing newline from a version file) is
/// ignored. Anything other than three plain decimal segments is rejected.
///
/// # Examples
///
/// ```
/// use release_patcher::version::parse_version;
///
/// let v = parse_version("2.4.10\n").unwrap();
/// assert_eq!((v.major, v.minor, v.patch), (2, 4, 10));
/// assert_eq!(v.to_string(), "2.4.10");
///
/// assert!(parse_version("2.4").is_err());
/// assert!(parse_version("2.4.x").is_err());
/// ```
pub fn parse_version(text: &str) -> Result<VersionIdentifier, FormatError> {
    let value = text.trim();
    let segments: Vec<&str> = value.split('.').collect();

    if segments.len() != 3 {
        return Err(FormatError::SegmentCount {
            value: value.to_string(),
            found: segments.len(),
        });
    }

    let parse_segment = |segment: &str| -> Result<u64, FormatError> {
        // u64::from_str accepts a leading '+', which is not a version digit
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormatError::InvalidSegment {
                value: value.to_string(),
                segment: segment.to_string(),
            });
        }
        segment.parse().map_err(|_| FormatError::InvalidSegment {
            value: value.to_string(),
            segment: segment.to_string(),
        })
    };

    Ok(VersionIdentifier {
        major: parse_segment(segments[0])?,
        minor: parse_segment(segments[1])?,
        patch: parse_segment(segments[2])?,
    })
}

/// Read and parse the version file at `path`.
pub fn read_version_file(path: impl AsRef<Path>) -> Result<VersionIdentifier, VersionFileError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| VersionFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_version(&contents).map_err(|source| VersionFileError::Format {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let v = parse_version("2.4.9").unwrap();
        assert_eq!(v, VersionIdentifier::new(2, 4, 9));
        assert_eq!(v.to_string(), "2.4.9");
    }

    #[test]
    fn test_parse_trailing_whitespace() {
        assert_eq!(
            parse_version("1.0.0\n").unwrap(),
            VersionIdentifier::new(1, 0, 0)
        );
        assert_eq!(
            parse_version("  3.10.200 \r\n").unwrap(),
            VersionIdentifier::new(3, 10, 200)
        );
    }

    #[test]
    fn test_segment_count() {
        for bad in ["2.4", "2", "2.4.9.1", "", "..."] {
            let err = parse_version(bad).unwrap_err();
            assert!(
                matches!(err, FormatError::SegmentCount { .. }),
                "{bad:?} -> {err:?}"
            );
        }
    }

    #[test]
    fn test_invalid_segment() {
        for bad in ["2.4.x", "a.b.c", "2..9", "2.-4.9", "2.+4.9", "2.4.9-rc1", "2. 4.9"] {
            let err = parse_version(bad).unwrap_err();
            assert!(
                matches!(err, FormatError::InvalidSegment { .. }),
                "{bad:?} -> {err:?}"
            );
        }
    }

    #[test]
    fn test_overflowing_segment() {
        let err = parse_version("99999999999999999999999.0.0").unwrap_err();
        assert!(matches!(err, FormatError::InvalidSegment { .. }));
    }

    #[test]
    fn test_ordering() {
        assert!(parse_version("2.4.10").unwrap() > parse_version("2.4.9").unwrap());
        assert!(parse_version("3.0.0").unwrap() > parse_version("2.99.99").unwrap());
    }

    #[test]
    fn test_read_version_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.txt");
        fs::write(&path, "2.4.9\n").unwrap();
        assert_eq!(
            read_version_file(&path).unwrap(),
            VersionIdentifier::new(2, 4, 9)
        );

        let missing = read_version_file(dir.path().join("nope.txt"));
        assert!(matches!(missing, Err(VersionFileError::Io { .. })));

        fs::write(&path, "two.four.nine").unwrap();
        assert!(matches!(
            read_version_file(&path),
            Err(VersionFileError::Format { .. })
        ));
    }
}

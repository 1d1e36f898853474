//! Whole-file text documents.
//!
//! A [`TextDocument`] is read fully into memory, rewritten line by line with
//! [`apply_rules`](crate::rules::apply_rules), and written back in one atomic
//! step. Each line keeps its own terminator so untouched lines survive
//! byte for byte.

use crate::rules::{apply_rules, first_match, RewriteRule};
use crate::version::VersionIdentifier;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("replacement for line {line} of {} contains a line break", path.display())]
    MultilineReplacement { path: PathBuf, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Final line without a terminator.
    None,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::None => "",
        }
    }
}

/// An in-memory text file split into lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    path: PathBuf,
    lines: Vec<String>,
    endings: Vec<LineEnding>,
}

/// Result of patching a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// At least one line changed; `lines_matched` counts every marker hit.
    Rewritten {
        file: PathBuf,
        lines_matched: usize,
        lines_changed: usize,
    },
    /// Markers were found but already held the generated content.
    Unchanged { file: PathBuf, lines_matched: usize },
    /// No line matched any rule.
    NoMarkers { file: PathBuf },
}

impl PatchOutcome {
    pub fn file(&self) -> &Path {
        match self {
            PatchOutcome::Rewritten { file, .. }
            | PatchOutcome::Unchanged { file, .. }
            | PatchOutcome::NoMarkers { file } => file,
        }
    }
}

impl TextDocument {
    /// Split `contents` into lines; `path` is only recorded.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();

        for raw in contents.split_inclusive('\n') {
            let (text, ending) = if let Some(text) = raw.strip_suffix("\r\n") {
                (text, LineEnding::CrLf)
            } else if let Some(text) = raw.strip_suffix('\n') {
                (text, LineEnding::Lf)
            } else {
                (raw, LineEnding::None)
            };
            lines.push(text.to_string());
            endings.push(ending);
        }

        Self {
            path: path.into(),
            lines,
            endings,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let contents = String::from_utf8(bytes).map_err(|_| DocumentError::InvalidUtf8 {
            path: path.to_path_buf(),
        })?;
        Ok(Self::parse(path, &contents))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines any rule would match.
    pub fn count_markers(&self, rules: &[RewriteRule]) -> usize {
        self.lines
            .iter()
            .filter(|line| first_match(line, rules).is_some())
            .count()
    }

    /// Rewrite marker lines in place and report what happened.
    ///
    /// Replacements may not contain line breaks; that would break the
    /// one-line-for-one-line guarantee.
    pub fn apply(
        &mut self,
        version: &VersionIdentifier,
        rules: &[RewriteRule],
    ) -> Result<PatchOutcome, DocumentError> {
        let lines_matched = self.count_markers(rules);
        if lines_matched == 0 {
            return Ok(PatchOutcome::NoMarkers {
                file: self.path.clone(),
            });
        }

        let rewritten = apply_rules(&self.lines, version, rules);
        // Untouched lines may hold a stray '\r'; only generated ones are checked.
        if let Some(idx) = self.lines.iter().zip(&rewritten).position(|(before, after)| {
            first_match(before, rules).is_some() && (after.contains('\n') || after.contains('\r'))
        }) {
            return Err(DocumentError::MultilineReplacement {
                path: self.path.clone(),
                line: idx + 1,
            });
        }

        let lines_changed = self
            .lines
            .iter()
            .zip(&rewritten)
            .filter(|(before, after)| before != after)
            .count();
        self.lines = rewritten;

        if lines_changed == 0 {
            Ok(PatchOutcome::Unchanged {
                file: self.path.clone(),
                lines_matched,
            })
        } else {
            Ok(PatchOutcome::Rewritten {
                file: self.path.clone(),
                lines_matched,
                lines_changed,
            })
        }
    }

    /// Join lines back together with their original terminators.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (line, ending) in self.lines.iter().zip(&self.endings) {
            out.push_str(line);
            out.push_str(ending.as_str());
        }
        out
    }

    /// Write the document back to its own path atomically.
    pub fn save(&self) -> Result<(), DocumentError> {
        write_atomic(&self.path, self.render().as_bytes())
    }
}

/// Read, rewrite and (unless `dry_run`) write back a document.
///
/// Returns the outcome plus the before/after text for diff display.
pub fn patch_file(
    path: &Path,
    version: &VersionIdentifier,
    rules: &[RewriteRule],
    dry_run: bool,
) -> Result<(PatchOutcome, String, String), DocumentError> {
    let mut doc = TextDocument::read(path)?;
    let before = doc.render();
    let outcome = doc.apply(version, rules)?;
    let after = doc.render();

    if !dry_run && matches!(outcome, PatchOutcome::Rewritten { .. }) {
        doc.save()?;
    }
    Ok((outcome, before, after))
}

/// Atomic file write: tempfile in the same directory, fsync, rename, then
/// bump the mtime.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), DocumentError> {
    let io_err = |source: std::io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Create tempfile in same directory to ensure same filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    filetime::set_file_mtime(path, filetime::FileTime::now()).map_err(io_err)?;
    Ok(())
}

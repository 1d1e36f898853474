//! External tool invocation: the HTML doc generator and the permalink
//! service client.
//!
//! Neither call has a timeout. A hung tool blocks the run until the
//! operator interrupts it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubprocessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}{}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' produced non UTF-8 output")]
    InvalidUtf8 { program: String },

    #[error("'{program}' returned an invalid permalink: '{output}'")]
    InvalidPermalink { program: String, output: String },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// A program plus fixed positional arguments, run from `workdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Shell-like rendering for progress output.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, extra: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args(extra);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run with inherited stdout/stderr; fail on non-zero exit.
    pub fn run(&self) -> Result<(), SubprocessError> {
        let status = self
            .command(&[])
            .stdin(Stdio::null())
            .status()
            .map_err(|source| SubprocessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SubprocessError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    /// Run with `extra` appended to the arguments and return trimmed stdout.
    pub fn capture(&self, extra: &[&str]) -> Result<String, SubprocessError> {
        let output = self
            .command(extra)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SubprocessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SubprocessError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| SubprocessError::InvalidUtf8 {
            program: self.program.clone(),
        })?;
        Ok(stdout.trim().to_string())
    }
}

/// True for a single-line `http://` or `https://` URL with no whitespace.
pub fn is_valid_permalink(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(rest) if !rest.is_empty()) && !url.chars().any(char::is_whitespace)
}

/// Ask the permalink service for a runnable-snippet URL for `sample`.
///
/// The sample path is appended to the command's arguments. Output is
/// trimmed and must be a plain http(s) URL.
pub fn fetch_permalink(
    command: &ExternalCommand,
    sample: &Path,
) -> Result<String, SubprocessError> {
    let sample = sample.to_string_lossy();
    let output = command.capture(&[sample.as_ref()])?;

    if !is_valid_permalink(&output) {
        return Err(SubprocessError::InvalidPermalink {
            program: command.program.clone(),
            output,
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permalink_validation() {
        assert!(is_valid_permalink("http://example.com/abc"));
        assert!(is_valid_permalink("https://wandbox.org/permlink/xyz"));
        assert!(!is_valid_permalink(""));
        assert!(!is_valid_permalink("https://"));
        assert!(!is_valid_permalink("error: rate limited"));
        assert!(!is_valid_permalink("ftp://example.com"));
        assert!(!is_valid_permalink("http://a.com\nhttp://b.com"));
        assert!(!is_valid_permalink("http://a b"));
    }

    #[test]
    fn test_display() {
        let cmd = ExternalCommand::new("python").args(["send.py", "../doctest/"]);
        assert_eq!(cmd.display(), "python send.py ../doctest/");
    }

    #[test]
    fn test_spawn_failure() {
        let cmd = ExternalCommand::new("definitely-not-a-real-program-xyz");
        assert!(matches!(cmd.run(), Err(SubprocessError::Spawn { .. })));
        assert!(matches!(
            cmd.capture(&[]),
            Err(SubprocessError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_trims_output() {
        let cmd = ExternalCommand::new("sh").args(["-c", "printf '  http://example.com/abc \\n\\n'"]);
        assert_eq!(cmd.capture(&[]).unwrap(), "http://example.com/abc");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit() {
        let cmd = ExternalCommand::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        match cmd.capture(&[]) {
            Err(SubprocessError::Failed { stderr, .. }) => assert!(stderr.contains("boom")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(cmd.run(), Err(SubprocessError::Failed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_fetch_permalink_appends_sample() {
        // `sh -c script name arg` sets $0 = name, $1 = arg
        let cmd = ExternalCommand::new("sh").args(["-c", "echo \"http://example.com/$1\"", "sh"]);
        let url = fetch_permalink(&cmd, Path::new("main.cpp")).unwrap();
        assert_eq!(url, "http://example.com/main.cpp");
    }

    #[cfg(unix)]
    #[test]
    fn test_fetch_permalink_rejects_garbage() {
        let cmd = ExternalCommand::new("sh").args(["-c", "echo 'Traceback (most recent call last)'"]);
        assert!(matches!(
            fetch_permalink(&cmd, Path::new("main.cpp")),
            Err(SubprocessError::InvalidPermalink { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("url.txt"), "https://example.com/x\n").unwrap();
        let cmd = ExternalCommand::new("cat").arg("url.txt").workdir(dir.path());
        assert_eq!(cmd.capture(&[]).unwrap(), "https://example.com/x");
    }
}

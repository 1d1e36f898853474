use crate::config::schema::{ReleaseConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up at the project root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "release.toml";

/// Configuration for the stock doctest layout, used when the project has no
/// `release.toml`.
pub const DEFAULT_CONFIG: &str = r##"[meta]
name = "doctest"
description = "Release maintenance for the doctest header library"
version_file = "scripts/version.txt"

[[targets]]
id = "header-version"
file = "doctest/parts/doctest_fwd.h"

[[targets.rules]]
prefix = "#define DOCTEST_VERSION_MAJOR "
template = "#define DOCTEST_VERSION_MAJOR {major}"

[[targets.rules]]
prefix = "#define DOCTEST_VERSION_MINOR "
template = "#define DOCTEST_VERSION_MINOR {minor}"

[[targets.rules]]
prefix = "#define DOCTEST_VERSION_PATCH "
template = "#define DOCTEST_VERSION_PATCH {patch}"

[[targets.rules]]
prefix = "#define DOCTEST_VERSION_STR "
template = "#define DOCTEST_VERSION_STR \"{version}\""

[[targets]]
id = "readme-badge"
file = "README.md"

[[targets.rules]]
prefix = "[![Try it online]"
template = "[![Try it online](https://img.shields.io/badge/try%20it-online-orange.svg)]({permalink})"

[docs]
program = "python"
args = ["generate_html.py"]
workdir = "scripts"

[permalink]
program = "python"
args = ["send_to_wandbox.py", "../doctest/"]
workdir = "scripts"
sample = "examples/hello_world/main.cpp"

[example_badges]
enabled = false
dir = "examples"
extension = "cpp"
skip = ["multiprocess"]
"##;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read release config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("release config{} is not valid TOML: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    #[error("invalid release config{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

/// Deserialize and validate; `path` only labels errors.
fn parse(input: &str, path: Option<&Path>) -> Result<ReleaseConfig, ConfigError> {
    let path = path.map(Path::to_path_buf);
    let config: ReleaseConfig = match toml_edit::de::from_str(input) {
        Ok(config) => config,
        Err(source) => return Err(ConfigError::Toml { path, source }),
    };
    if let Err(source) = config.validate() {
        return Err(ConfigError::Validation { path, source });
    }
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<ReleaseConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ReleaseConfig, ConfigError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => parse(&contents, Some(path)),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn default_config() -> Result<ReleaseConfig, ConfigError> {
    load_from_str(DEFAULT_CONFIG)
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::BuiltIn => write!(f, "built-in doctest layout"),
        }
    }
}

/// Load `explicit` if given, else `<root>/release.toml` if it exists, else
/// the built-in configuration.
pub fn resolve_config(
    project_root: &Path,
    explicit: Option<&Path>,
) -> Result<(ReleaseConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_from_path(path)?, ConfigSource::File(path.to_path_buf())));
    }

    let candidate = project_root.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        return Ok((load_from_path(&candidate)?, ConfigSource::File(candidate)));
    }

    Ok((default_config()?, ConfigSource::BuiltIn))
}

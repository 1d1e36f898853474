//! Release Patcher: release maintenance for header-library projects
//!
//! Reads the release version from a small version file, rewrites version
//! macros in a header, runs the HTML doc generator, and refreshes the
//! "try it online" badge permalink in the README.
//!
//! # Architecture
//!
//! Every file rewrite compiles down to one primitive: an ordered list of
//! [`RewriteRule`]s applied line by line by [`apply_rules`]. A rule matches a
//! literal line prefix and produces the full replacement line from the
//! [`VersionIdentifier`]. The rest of the crate is plumbing around that core:
//! configuration, external tools, and atomic file writes.
//!
//! # Safety
//!
//! - The version and every target path are checked before the first write
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement
//! - Permalink output validated before it is embedded
//! - Idempotent reruns
//!
//! # Example
//!
//! ```
//! use release_patcher::{apply_rules, parse_version, RewriteRule};
//!
//! let version = parse_version("2.4.9").unwrap();
//! let rules = vec![RewriteRule::new("#define DOCTEST_VERSION_MINOR ", |v| {
//!     format!("#define DOCTEST_VERSION_MINOR {}", v.minor)
//! })];
//!
//! let lines = ["#define DOCTEST_VERSION_MINOR 0", "// unrelated"];
//! let out = apply_rules(&lines, &version, &rules);
//! assert_eq!(out, ["#define DOCTEST_VERSION_MINOR 4", "// unrelated"]);
//! ```

pub mod config;
pub mod document;
pub mod process;
pub mod release;
pub mod rules;
pub mod safety;
pub mod version;

// Re-exports
pub use config::{load_from_path, load_from_str, resolve_config, ConfigError, ReleaseConfig};
pub use document::{DocumentError, PatchOutcome, TextDocument};
pub use process::{ExternalCommand, SubprocessError};
pub use release::{
    check_status, run_bump, run_release, ReleaseError, ReleaseEvent, ReleaseSummary, Reporter,
    RunOptions, TargetStatus,
};
pub use rules::{apply_rules, RewriteRule, Template, TemplateError};
pub use safety::{ProjectGuard, SafetyError};
pub use version::{parse_version, FormatError, VersionIdentifier};

//! The release pipeline.
//!
//! Steps run strictly in order, each to completion before the next:
//!
//! 1. read and parse the version file
//! 2. rewrite version-only targets (header macros)
//! 3. run the HTML doc generator
//! 4. fetch the main permalink
//! 5. rewrite permalink targets (README badge)
//! 6. optionally write per-example badge READMEs
//!
//! Every error aborts the run. Paths and the version are checked before the
//! first write so a bad input never leaves a half-patched tree behind.

use crate::config::{ExampleBadges, ReleaseConfig, TargetDefinition};
use crate::document::{patch_file, write_atomic, DocumentError, PatchOutcome, TextDocument};
use crate::process::{fetch_permalink, SubprocessError};
use crate::rules::{RenderContext, Template, TemplateError};
use crate::safety::{ProjectGuard, SafetyError};
use crate::version::{read_version_file, VersionFileError, VersionIdentifier};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error(transparent)]
    Version(#[from] VersionFileError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("target '{id}': file not found: {}", path.display())]
    MissingTarget { id: String, path: PathBuf },

    #[error("no [permalink] section configured")]
    NoPermalinkCommand,

    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Switches shared by the `release` and `bump` commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute everything, write nothing, run no external tool.
    pub dry_run: bool,
    pub skip_docs: bool,
    pub skip_permalink: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeResult {
    Written { readme: PathBuf, url: String },
    Unchanged { readme: PathBuf },
    Skipped { reason: String },
}

/// Progress notifications emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseEvent {
    Version {
        version: VersionIdentifier,
        source: PathBuf,
    },
    Target {
        id: String,
        outcome: PatchOutcome,
        before: String,
        after: String,
        dry_run: bool,
    },
    DocsStarted {
        command: String,
    },
    DocsFinished,
    Permalink {
        url: String,
    },
    Skipped {
        step: String,
        reason: String,
    },
    Badge {
        example: String,
        result: BadgeResult,
    },
}

/// Receives [`ReleaseEvent`]s as they happen.
pub trait Reporter {
    fn event(&mut self, event: ReleaseEvent);
}

impl Reporter for Vec<ReleaseEvent> {
    fn event(&mut self, event: ReleaseEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    pub version: Option<VersionIdentifier>,
    pub rewritten: usize,
    pub unchanged: usize,
    pub no_markers: usize,
    pub skipped: usize,
    pub badges_written: usize,
}

impl ReleaseSummary {
    fn record(&mut self, outcome: &PatchOutcome) {
        match outcome {
            PatchOutcome::Rewritten { .. } => self.rewritten += 1,
            PatchOutcome::Unchanged { .. } => self.unchanged += 1,
            PatchOutcome::NoMarkers { .. } => self.no_markers += 1,
        }
    }
}

/// Read the configured version file.
pub fn read_version(
    config: &ReleaseConfig,
    guard: &ProjectGuard,
) -> Result<(VersionIdentifier, PathBuf), ReleaseError> {
    let path = guard.resolve(&config.meta.version_file)?;
    let version = read_version_file(&path)?;
    Ok((version, path))
}

/// Resolve every target path and make sure it exists.
pub fn preflight<'a>(
    targets: impl IntoIterator<Item = &'a TargetDefinition>,
    guard: &ProjectGuard,
) -> Result<Vec<(&'a TargetDefinition, PathBuf)>, ReleaseError> {
    targets
        .into_iter()
        .map(|target| {
            let path = guard.resolve(&target.file)?;
            if !path.is_file() {
                return Err(ReleaseError::MissingTarget {
                    id: target.id.clone(),
                    path,
                });
            }
            Ok((target, path))
        })
        .collect()
}

/// Rewrite one target's marker lines.
pub fn patch_target(
    target: &TargetDefinition,
    path: &Path,
    version: &VersionIdentifier,
    permalink: Option<&str>,
    dry_run: bool,
    reporter: &mut dyn Reporter,
) -> Result<PatchOutcome, ReleaseError> {
    let rules = target.build_rules(permalink)?;
    let (outcome, before, after) = patch_file(path, version, &rules, dry_run)?;
    reporter.event(ReleaseEvent::Target {
        id: target.id.clone(),
        outcome: outcome.clone(),
        before,
        after,
        dry_run,
    });
    Ok(outcome)
}

/// Version-only targets: the `bump` command.
pub fn run_bump(
    config: &ReleaseConfig,
    guard: &ProjectGuard,
    options: RunOptions,
    reporter: &mut dyn Reporter,
) -> Result<ReleaseSummary, ReleaseError> {
    let (version, source) = read_version(config, guard)?;
    reporter.event(ReleaseEvent::Version { version, source });

    let targets = preflight(config.version_targets(), guard)?;
    let mut summary = ReleaseSummary {
        version: Some(version),
        ..Default::default()
    };
    for (target, path) in targets {
        let outcome = patch_target(target, &path, &version, None, options.dry_run, reporter)?;
        summary.record(&outcome);
    }
    Ok(summary)
}

/// The full pipeline: the `release` command.
pub fn run_release(
    config: &ReleaseConfig,
    guard: &ProjectGuard,
    options: RunOptions,
    reporter: &mut dyn Reporter,
) -> Result<ReleaseSummary, ReleaseError> {
    let (version, source) = read_version(config, guard)?;
    reporter.event(ReleaseEvent::Version { version, source });

    let version_targets = preflight(config.version_targets(), guard)?;
    let permalink_targets = preflight(config.permalink_targets(), guard)?;

    let mut summary = ReleaseSummary {
        version: Some(version),
        ..Default::default()
    };

    for (target, path) in version_targets {
        let outcome = patch_target(target, &path, &version, None, options.dry_run, reporter)?;
        summary.record(&outcome);
    }

    match &config.docs {
        None => {}
        Some(_) if options.dry_run || options.skip_docs => {
            skip(reporter, &mut summary, "docs", skip_reason(options, "--skip-docs"));
        }
        Some(docs) => {
            let command = docs.to_command(guard.project_root());
            reporter.event(ReleaseEvent::DocsStarted {
                command: command.display(),
            });
            command.run()?;
            reporter.event(ReleaseEvent::DocsFinished);
        }
    }

    let needs_permalink = !permalink_targets.is_empty() || config.badges_enabled();
    if !needs_permalink {
        return Ok(summary);
    }
    if options.dry_run || options.skip_permalink {
        let reason = skip_reason(options, "--skip-permalink");
        for (target, _) in &permalink_targets {
            skip(reporter, &mut summary, &target.id, reason);
        }
        if config.badges_enabled() {
            skip(reporter, &mut summary, "example badges", reason);
        }
        return Ok(summary);
    }

    if !permalink_targets.is_empty() {
        let url = fetch_main_permalink(config, guard)?;
        reporter.event(ReleaseEvent::Permalink { url: url.clone() });

        for (target, path) in permalink_targets {
            let outcome =
                patch_target(target, &path, &version, Some(&url), options.dry_run, reporter)?;
            summary.record(&outcome);
        }
    }

    if let Some(badges) = config.example_badges.as_ref().filter(|b| b.enabled) {
        let (written, skipped) = write_example_badges(config, badges, guard, &version, reporter)?;
        summary.badges_written += written;
        summary.skipped += skipped;
    }

    Ok(summary)
}

fn skip_reason(options: RunOptions, flag: &'static str) -> &'static str {
    if options.dry_run {
        "dry run"
    } else {
        flag
    }
}

fn skip(reporter: &mut dyn Reporter, summary: &mut ReleaseSummary, step: &str, reason: &str) {
    summary.skipped += 1;
    reporter.event(ReleaseEvent::Skipped {
        step: step.to_string(),
        reason: reason.to_string(),
    });
}

/// Run the permalink command for the configured main sample.
pub fn fetch_main_permalink(
    config: &ReleaseConfig,
    guard: &ProjectGuard,
) -> Result<String, ReleaseError> {
    let permalink = config
        .permalink
        .as_ref()
        .ok_or(ReleaseError::NoPermalinkCommand)?;
    let sample = guard.resolve(&permalink.sample)?;
    let command = permalink.command.to_command(guard.project_root());
    Ok(fetch_permalink(&command, &sample)?)
}

fn scan_error(path: &Path) -> impl FnOnce(walkdir::Error) -> ReleaseError {
    let path = path.to_path_buf();
    move |source| ReleaseError::Scan { path, source }
}

/// Example directories that qualify for a badge README, with their single
/// source file. Other directories come back with a skip reason.
pub fn scan_examples(
    examples_dir: &Path,
    badges: &ExampleBadges,
) -> Result<Vec<(String, Result<PathBuf, String>)>, ReleaseError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(examples_dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(scan_error(examples_dir))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();

        if badges.skip.iter().any(|s| s == &name) {
            found.push((name, Err("listed in skip".to_string())));
            continue;
        }

        let mut sources = Vec::new();
        for file in WalkDir::new(entry.path())
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let file = file.map_err(scan_error(entry.path()))?;
            let extension = file.path().extension().and_then(|e| e.to_str());
            if file.file_type().is_file() && extension == Some(badges.extension.as_str()) {
                sources.push(file.into_path());
            }
        }

        let result = match sources.len() {
            0 => Err(format!("no .{} source file", badges.extension)),
            1 => Ok(sources.remove(0)),
            n => Err(format!("{n} .{} source files", badges.extension)),
        };
        found.push((name, result));
    }
    Ok(found)
}

/// Write a badge README into every qualifying example directory.
///
/// Returns `(written, skipped)`. An example whose permalink comes back
/// malformed is skipped rather than aborting the run.
pub fn write_example_badges(
    config: &ReleaseConfig,
    badges: &ExampleBadges,
    guard: &ProjectGuard,
    version: &VersionIdentifier,
    reporter: &mut dyn Reporter,
) -> Result<(usize, usize), ReleaseError> {
    let permalink = config
        .permalink
        .as_ref()
        .ok_or(ReleaseError::NoPermalinkCommand)?;
    let command = permalink.command.to_command(guard.project_root());
    let template = Template::parse(&badges.template)?;
    let examples_dir = guard.resolve(&badges.dir)?;

    let mut written = 0;
    let mut skipped = 0;
    for (example, source) in scan_examples(&examples_dir, badges)? {
        let result = match source {
            Err(reason) => BadgeResult::Skipped { reason },
            Ok(source) => match fetch_permalink(&command, &source) {
                Err(SubprocessError::InvalidPermalink { output, .. }) => BadgeResult::Skipped {
                    reason: format!("bad permalink '{output}'"),
                },
                Err(e) => return Err(e.into()),
                Ok(url) => {
                    let readme = guard.resolve(examples_dir.join(&example).join(&badges.readme))?;
                    let line = template.render(&RenderContext {
                        version,
                        permalink: Some(&url),
                    })?;
                    write_badge_readme(&readme, &line, url)?
                }
            },
        };

        match result {
            BadgeResult::Written { .. } => written += 1,
            BadgeResult::Skipped { .. } => skipped += 1,
            BadgeResult::Unchanged { .. } => {}
        }
        reporter.event(ReleaseEvent::Badge { example, result });
    }
    Ok((written, skipped))
}

fn write_badge_readme(readme: &Path, line: &str, url: String) -> Result<BadgeResult, ReleaseError> {
    let contents = format!("{line}\n");
    if fs::read_to_string(readme).is_ok_and(|existing| existing == contents) {
        return Ok(BadgeResult::Unchanged {
            readme: readme.to_path_buf(),
        });
    }
    write_atomic(readme, contents.as_bytes())?;
    Ok(BadgeResult::Written {
        readme: readme.to_path_buf(),
        url,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    UpToDate,
    Stale { lines_changed: usize },
    /// Permalink targets: the marker exists, content is not checked.
    MarkerPresent { lines_matched: usize },
    MissingMarkers,
    MissingFile,
}

impl TargetStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TargetStatus::UpToDate | TargetStatus::MarkerPresent { .. })
    }
}

/// Compare every target against the version file without writing.
pub fn check_status(
    config: &ReleaseConfig,
    guard: &ProjectGuard,
) -> Result<(VersionIdentifier, Vec<(String, TargetStatus)>), ReleaseError> {
    let (version, _) = read_version(config, guard)?;
    let mut statuses = Vec::with_capacity(config.targets.len());

    for target in &config.targets {
        let path = guard.resolve(&target.file)?;
        if !path.is_file() {
            statuses.push((target.id.clone(), TargetStatus::MissingFile));
            continue;
        }
        let mut doc = TextDocument::read(&path)?;

        let status = if target.needs_permalink() {
            let rules = target.build_rules(Some(""))?;
            match doc.count_markers(&rules) {
                0 => TargetStatus::MissingMarkers,
                n => TargetStatus::MarkerPresent { lines_matched: n },
            }
        } else {
            let rules = target.build_rules(None)?;
            match doc.apply(&version, &rules)? {
                PatchOutcome::Unchanged { .. } => TargetStatus::UpToDate,
                PatchOutcome::Rewritten { lines_changed, .. } => {
                    TargetStatus::Stale { lines_changed }
                }
                PatchOutcome::NoMarkers { .. } => TargetStatus::MissingMarkers,
            }
        };
        statuses.push((target.id.clone(), status));
    }

    Ok((version, statuses))
}

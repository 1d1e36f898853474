use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use release_patcher::config::{
    resolve_config, ConfigSource, ReleaseConfig, CONFIG_FILE_NAME, DEFAULT_CONFIG,
};
use release_patcher::release::{
    check_status, run_bump, run_release, write_example_badges, BadgeResult, ReleaseEvent,
    ReleaseSummary, Reporter, RunOptions, TargetStatus,
};
use release_patcher::{PatchOutcome, ProjectGuard};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "release-patcher")]
#[command(about = "Release maintenance: version macros, docs and try-it-online badges", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to project root (auto-detected if not specified)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Release config file (defaults to <root>/release.toml, then the built-in layout)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full release pipeline
    Release {
        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Do not run the HTML documentation generator
        #[arg(long)]
        skip_docs: bool,

        /// Do not fetch permalinks (README badge and example badges are left alone)
        #[arg(long)]
        skip_permalink: bool,
    },

    /// Rewrite version macros only
    Bump {
        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Write try-it-online badge READMEs for single-source examples
    Badges,

    /// Check whether targets match the version file
    Status,

    /// Write the built-in configuration to release.toml
    Init {
        /// Overwrite an existing release.toml
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Release {
            dry_run,
            diff,
            skip_docs,
            skip_permalink,
        } => cmd_release(
            &resolve_project_root(cli.root)?,
            config,
            RunOptions {
                dry_run,
                skip_docs,
                skip_permalink,
            },
            diff,
        ),

        Commands::Bump { dry_run, diff } => cmd_bump(
            &resolve_project_root(cli.root)?,
            config,
            RunOptions {
                dry_run,
                ..Default::default()
            },
            diff,
        ),

        Commands::Badges => cmd_badges(&resolve_project_root(cli.root)?, config),

        Commands::Status => cmd_status(&resolve_project_root(cli.root)?, config),

        Commands::Init { force } => cmd_init(cli.root, force),
    }
}

/// Resolve project root using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. RELEASE_PATCHER_ROOT environment variable
/// 3. Nearest ancestor with a release.toml
/// 4. Nearest ancestor with the built-in version file (scripts/version.txt)
fn resolve_project_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("project root {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var("RELEASE_PATCHER_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: RELEASE_PATCHER_ROOT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let current = env::current_dir()?;
    for marker in [CONFIG_FILE_NAME, "scripts/version.txt"] {
        if let Some(found) = current.ancestors().find(|dir| dir.join(marker).is_file()) {
            println!(
                "{}",
                format!("Auto-detected project root: {}", found.display()).dimmed()
            );
            return Ok(found.to_path_buf());
        }
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find the project root.".red(),
        "Try one of:".bold(),
        "1. cd into the project: cd /path/to/project && release-patcher release",
        "2. Specify explicitly: release-patcher --root /path/to/project release",
        "3. Set environment variable: export RELEASE_PATCHER_ROOT=/path/to/project"
    )
}

fn load(root: &Path, config: Option<&Path>) -> Result<(ReleaseConfig, ProjectGuard)> {
    let (config, source) = resolve_config(root, config)?;
    let guard = ProjectGuard::new(root)?;

    println!("Project: {}", guard.project_root().display());
    match source {
        ConfigSource::BuiltIn => println!("Config: {}", source.to_string().dimmed()),
        ConfigSource::File(_) => println!("Config: {}", source),
    }
    Ok((config, guard))
}

/// Prints pipeline progress as it happens.
struct ConsoleReporter {
    show_diff: bool,
}

impl Reporter for ConsoleReporter {
    fn event(&mut self, event: ReleaseEvent) {
        match event {
            ReleaseEvent::Version { version, source } => {
                println!("Version: {} ({})", version.to_string().bold(), source.display());
                println!();
            }
            ReleaseEvent::Target {
                id,
                outcome,
                before,
                after,
                dry_run,
            } => match &outcome {
                PatchOutcome::Rewritten {
                    file,
                    lines_matched,
                    lines_changed,
                } => {
                    let verb = if dry_run { "Would rewrite" } else { "Rewrote" };
                    println!(
                        "{} {}: {} {} of {} marker line(s) in {}",
                        "✓".green(),
                        id,
                        verb,
                        lines_changed,
                        lines_matched,
                        file.display()
                    );
                    if self.show_diff {
                        display_diff(file, &before, &after);
                    }
                }
                PatchOutcome::Unchanged {
                    file,
                    lines_matched,
                } => {
                    println!(
                        "{} {}: Already up to date ({} marker line(s) in {})",
                        "⊙".yellow(),
                        id,
                        lines_matched,
                        file.display()
                    );
                }
                PatchOutcome::NoMarkers { file } => {
                    eprintln!(
                        "{} {}: No marker lines found in {}",
                        "⚠".yellow(),
                        id,
                        file.display()
                    );
                }
            },
            ReleaseEvent::DocsStarted { command } => {
                println!("Generating HTML documentation: {}", command.dimmed());
            }
            ReleaseEvent::DocsFinished => {
                println!("{} docs: Generated", "✓".green());
            }
            ReleaseEvent::Permalink { url } => {
                println!("Permalink: {}", url.cyan());
            }
            ReleaseEvent::Skipped { step, reason } => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), step, reason);
            }
            ReleaseEvent::Badge { example, result } => match result {
                BadgeResult::Written { readme, url } => {
                    println!(
                        "{} {}: Wrote {} ({})",
                        "✓".green(),
                        example,
                        readme.display(),
                        url.dimmed()
                    );
                }
                BadgeResult::Unchanged { readme } => {
                    println!(
                        "{} {}: Already up to date ({})",
                        "⊙".yellow(),
                        example,
                        readme.display()
                    );
                }
                BadgeResult::Skipped { reason } => {
                    println!("{} {}: Skipped ({})", "⊘".cyan(), example, reason);
                }
            },
        }
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for hunk in diff.unified_diff().context_radius(2).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{}", change).red(),
                ChangeTag::Insert => format!("+{}", change).green(),
                ChangeTag::Equal => format!(" {}", change).normal(),
            };
            print!("{}", line);
            if change.missing_newline() {
                println!();
            }
        }
    }
    println!();
}

fn print_summary(summary: &ReleaseSummary) {
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", summary.rewritten).green());
    println!(
        "  {} already up to date",
        format!("{}", summary.unchanged).yellow()
    );
    if summary.no_markers > 0 {
        println!(
            "  {} without marker lines",
            format!("{}", summary.no_markers).red()
        );
    }
    println!("  {} skipped", format!("{}", summary.skipped).cyan());
    if summary.badges_written > 0 {
        println!(
            "  {} example badges written",
            format!("{}", summary.badges_written).green()
        );
    }
}

fn cmd_release(
    root: &Path,
    config: Option<&Path>,
    options: RunOptions,
    show_diff: bool,
) -> Result<()> {
    let (config, guard) = load(root, config)?;
    if options.dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }

    let mut reporter = ConsoleReporter { show_diff };
    let summary = run_release(&config, &guard, options, &mut reporter)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_bump(root: &Path, config: Option<&Path>, options: RunOptions, show_diff: bool) -> Result<()> {
    let (config, guard) = load(root, config)?;
    if options.dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }

    let mut reporter = ConsoleReporter { show_diff };
    let summary = run_bump(&config, &guard, options, &mut reporter)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_badges(root: &Path, config: Option<&Path>) -> Result<()> {
    let (config, guard) = load(root, config)?;
    let badges = config
        .example_badges
        .as_ref()
        .context("no [example_badges] section configured")?;

    let (version, _) = release_patcher::release::read_version(&config, &guard)?;
    let mut reporter = ConsoleReporter { show_diff: false };
    let (written, skipped) =
        write_example_badges(&config, badges, &guard, &version, &mut reporter)?;

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} written", format!("{}", written).green());
    println!("  {} skipped", format!("{}", skipped).cyan());
    Ok(())
}

fn cmd_status(root: &Path, config: Option<&Path>) -> Result<()> {
    let (config, guard) = load(root, config)?;
    let (version, statuses) = check_status(&config, &guard)?;

    println!("Version: {}", version.to_string().bold());
    println!();
    println!("{}", "Target Status Report".bold());

    let mut stale = 0;
    for (id, status) in &statuses {
        match status {
            TargetStatus::UpToDate => println!("{} {}: Up to date", "✓".green(), id),
            TargetStatus::MarkerPresent { lines_matched } => println!(
                "{} {}: Marker present ({} line(s), permalink not checked)",
                "✓".green(),
                id,
                lines_matched
            ),
            TargetStatus::Stale { lines_changed } => println!(
                "{} {}: {} ({} line(s) differ from {})",
                "✗".red(),
                id,
                "STALE".red().bold(),
                lines_changed,
                version
            ),
            TargetStatus::MissingMarkers => {
                println!("{} {}: No marker lines found", "✗".red(), id)
            }
            TargetStatus::MissingFile => println!("{} {}: File not found", "✗".red(), id),
        }
        if !status.is_ok() {
            stale += 1;
        }
    }

    if stale > 0 {
        println!();
        eprintln!("{} target(s) need attention", stale);
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_init(root: Option<PathBuf>, force: bool) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => env::current_dir()?,
    };
    let path = root.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}

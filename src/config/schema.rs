use crate::process::ExternalCommand;
use crate::rules::{RewriteRule, Template, TemplateError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

pub const DEFAULT_BADGE_TEMPLATE: &str =
    "[![Try it online](https://img.shields.io/badge/try%20it-online-orange.svg)]({permalink})";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub targets: Vec<TargetDefinition>,
    #[serde(default)]
    pub docs: Option<CommandDefinition>,
    #[serde(default)]
    pub permalink: Option<PermalinkDefinition>,
    #[serde(default)]
    pub example_badges: Option<ExampleBadges>,
}

impl ReleaseConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.meta.version_file.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                target_id: None,
                field: "meta.version_file",
            });
        }

        if self.targets.is_empty() {
            issues.push(ValidationIssue::EmptyTargetList);
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "id",
                });
            } else if !seen.insert(target.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    target_id: target.id.clone(),
                });
            }
            if target.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: Some(target.id.clone()),
                    field: "file",
                });
            }
            if target.rules.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: Some(target.id.clone()),
                    field: "rules",
                });
            }

            for rule in &target.rules {
                if rule.prefix.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        target_id: Some(target.id.clone()),
                        field: "rules.prefix",
                    });
                }
                match Template::parse(&rule.template) {
                    Ok(template) => {
                        if template.needs_permalink() && self.permalink.is_none() {
                            issues.push(ValidationIssue::InvalidCombo {
                                target_id: Some(target.id.clone()),
                                message: "{permalink} template requires a [permalink] section"
                                    .to_string(),
                            });
                        }
                    }
                    Err(e) => issues.push(ValidationIssue::InvalidTemplate {
                        target_id: Some(target.id.clone()),
                        message: e.to_string(),
                    }),
                }
            }
        }

        if let Some(docs) = &self.docs {
            if docs.program.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "docs.program",
                });
            }
        }

        if let Some(permalink) = &self.permalink {
            if permalink.command.program.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "permalink.program",
                });
            }
            if permalink.sample.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "permalink.sample",
                });
            }
        }

        if let Some(badges) = self.example_badges.as_ref().filter(|b| b.enabled) {
            if self.permalink.is_none() {
                issues.push(ValidationIssue::InvalidCombo {
                    target_id: None,
                    message: "example_badges requires a [permalink] section".to_string(),
                });
            }
            if badges.dir.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target_id: None,
                    field: "example_badges.dir",
                });
            }
            if let Err(e) = Template::parse(&badges.template) {
                issues.push(ValidationIssue::InvalidTemplate {
                    target_id: None,
                    message: e.to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Targets that only need the version, in declaration order.
    pub fn version_targets(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.targets.iter().filter(|t| !t.needs_permalink())
    }

    /// Targets that embed a fetched permalink, in declaration order.
    pub fn permalink_targets(&self) -> impl Iterator<Item = &TargetDefinition> {
        self.targets.iter().filter(|t| t.needs_permalink())
    }

    pub fn badges_enabled(&self) -> bool {
        self.example_badges.as_ref().is_some_and(|b| b.enabled)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Version file, relative to the project root.
    #[serde(default)]
    pub version_file: String,
}

/// A file plus the ordered marker rules applied to it.
#[derive(Debug, Deserialize, Clone)]
pub struct TargetDefinition {
    pub id: String,
    pub file: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl TargetDefinition {
    pub fn needs_permalink(&self) -> bool {
        self.rules.iter().any(|rule| {
            Template::parse(&rule.template)
                .map(|t| t.needs_permalink())
                .unwrap_or(false)
        })
    }

    /// Compile the rule definitions into rewrite rules.
    pub fn build_rules(&self, permalink: Option<&str>) -> Result<Vec<RewriteRule>, TemplateError> {
        self.rules
            .iter()
            .map(|rule| {
                RewriteRule::from_template(
                    rule.prefix.clone(),
                    Template::parse(&rule.template)?,
                    permalink,
                )
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDefinition {
    pub prefix: String,
    pub template: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandDefinition {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory, relative to the project root.
    #[serde(default)]
    pub workdir: Option<String>,
}

impl CommandDefinition {
    pub fn to_command(&self, project_root: &Path) -> ExternalCommand {
        let workdir = match &self.workdir {
            Some(dir) => project_root.join(dir),
            None => project_root.to_path_buf(),
        };
        ExternalCommand::new(self.program.clone())
            .args(self.args.iter().cloned())
            .workdir(workdir)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PermalinkDefinition {
    #[serde(flatten)]
    pub command: CommandDefinition,
    /// Source file sent for the main README badge, relative to the project root.
    pub sample: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExampleBadges {
    #[serde(default)]
    pub enabled: bool,
    pub dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default = "default_readme")]
    pub readme: String,
    #[serde(default = "default_badge_template")]
    pub template: String,
}

fn default_extension() -> String {
    "cpp".to_string()
}

fn default_readme() -> String {
    "README.md".to_string()
}

fn default_badge_template() -> String {
    DEFAULT_BADGE_TEMPLATE.to_string()
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyTargetList,
    MissingField {
        target_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        target_id: String,
    },
    InvalidTemplate {
        target_id: Option<String>,
        message: String,
    },
    InvalidCombo {
        target_id: Option<String>,
        message: String,
    },
}

fn scope(target_id: &Option<String>) -> String {
    match target_id {
        Some(id) => format!("target '{id}'"),
        None => "config".to_string(),
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTargetList => write!(f, "config contains no targets"),
            ValidationIssue::MissingField { target_id, field } => {
                write!(f, "{}: missing or empty field '{field}'", scope(target_id))
            }
            ValidationIssue::DuplicateId { target_id } => {
                write!(f, "duplicate target id '{target_id}'")
            }
            ValidationIssue::InvalidTemplate { target_id, message } => {
                write!(f, "{}: {message}", scope(target_id))
            }
            ValidationIssue::InvalidCombo { target_id, message } => {
                write!(f, "{}: {message}", scope(target_id))
            }
        }
    }
}

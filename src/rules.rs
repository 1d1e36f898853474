//! Prefix-matched line rewrite rules.
//!
//! A [`RewriteRule`] pairs a literal line prefix with a generator that
//! produces the replacement line from a [`VersionIdentifier`]. Rules are
//! tried in order and the first prefix that matches wins. Matching is purely
//! syntactic: every line sharing a prefix is rewritten the same way.

use crate::version::VersionIdentifier;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{name}}}' in template '{template}'")]
    UnknownPlaceholder { template: String, name: String },

    #[error("unterminated placeholder in template '{template}'")]
    Unterminated { template: String },

    #[error("unmatched '}}' in template '{template}'")]
    UnmatchedClose { template: String },

    #[error("template '{template}' needs a permalink but none was provided")]
    MissingPermalink { template: String },
}

/// Values a template can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Major,
    Minor,
    Patch,
    Version,
    Permalink,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            "version" => Some(Self::Version),
            "permalink" => Some(Self::Permalink),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// A replacement line with `{major}`, `{minor}`, `{patch}`, `{version}` and
/// `{permalink}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Inputs for [`Template::render`].
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub version: &'a VersionIdentifier,
    pub permalink: Option<&'a str>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unterminated {
                            template: source.to_string(),
                        });
                    }
                    let placeholder = Placeholder::from_name(name.trim()).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder {
                            template: source.to_string(),
                            name: name.clone(),
                        }
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Value(placeholder));
                }
                '}' => {
                    return Err(TemplateError::UnmatchedClose {
                        template: source.to_string(),
                    })
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if rendering requires a fetched permalink.
    pub fn needs_permalink(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Value(Placeholder::Permalink)))
    }

    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, TemplateError> {
        match ctx.permalink {
            Some(permalink) => Ok(self.expand(ctx.version, permalink)),
            None if self.needs_permalink() => Err(TemplateError::MissingPermalink {
                template: self.source.clone(),
            }),
            None => Ok(self.expand(ctx.version, "")),
        }
    }

    fn expand(&self, version: &VersionIdentifier, permalink: &str) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Value(Placeholder::Major) => out.push_str(&version.major.to_string()),
                Segment::Value(Placeholder::Minor) => out.push_str(&version.minor.to_string()),
                Segment::Value(Placeholder::Patch) => out.push_str(&version.patch.to_string()),
                Segment::Value(Placeholder::Version) => out.push_str(&version.to_string()),
                Segment::Value(Placeholder::Permalink) => out.push_str(permalink),
            }
        }
        out
    }
}

type Generator = Box<dyn Fn(&VersionIdentifier) -> String>;

/// A literal line prefix and the generator for its replacement line.
pub struct RewriteRule {
    prefix: String,
    generator: Generator,
}

impl RewriteRule {
    pub fn new(
        prefix: impl Into<String>,
        generator: impl Fn(&VersionIdentifier) -> String + 'static,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            generator: Box::new(generator),
        }
    }

    /// Build a rule that renders `template`.
    ///
    /// Fails up front if the template needs a permalink and none is given,
    /// so the generator itself never fails.
    pub fn from_template(
        prefix: impl Into<String>,
        template: Template,
        permalink: Option<&str>,
    ) -> Result<Self, TemplateError> {
        if template.needs_permalink() && permalink.is_none() {
            return Err(TemplateError::MissingPermalink {
                template: template.source,
            });
        }
        let permalink = permalink.unwrap_or_default().to_string();
        Ok(Self::new(prefix, move |version| {
            template.expand(version, &permalink)
        }))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, line: &str) -> bool {
        line.starts_with(&self.prefix)
    }

    pub fn generate(&self, version: &VersionIdentifier) -> String {
        (self.generator)(version)
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Index of the first rule whose prefix matches `line`.
pub fn first_match(line: &str, rules: &[RewriteRule]) -> Option<usize> {
    rules.iter().position(|rule| rule.matches(line))
}

/// Rewrite every line that starts with a rule prefix; keep the rest.
///
/// Lines are given without their terminators. The output always has the
/// same length as the input.
///
/// # Examples
///
/// ```
/// use release_patcher::rules::{apply_rules, RewriteRule};
/// use release_patcher::version::parse_version;
///
/// let rules = vec![RewriteRule::new("#define VERSION_MAJOR ", |v| {
///     format!("#define VERSION_MAJOR {}", v.major)
/// })];
/// let lines = ["#define VERSION_MAJOR 2", "int x;"];
/// let out = apply_rules(&lines, &parse_version("3.0.0").unwrap(), &rules);
/// assert_eq!(out, vec!["#define VERSION_MAJOR 3", "int x;"]);
/// ```
pub fn apply_rules<S: AsRef<str>>(
    lines: &[S],
    version: &VersionIdentifier,
    rules: &[RewriteRule],
) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            match first_match(line, rules) {
                Some(idx) => rules[idx].generate(version),
                None => line.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::parse_version;

    const BADGE: &str =
        "[![Try it online](https://img.shields.io/badge/try%20it-online-orange.svg)]({permalink})";

    fn header_rules() -> Vec<RewriteRule> {
        [
            ("#define DOCTEST_VERSION_MAJOR ", "#define DOCTEST_VERSION_MAJOR {major}"),
            ("#define DOCTEST_VERSION_MINOR ", "#define DOCTEST_VERSION_MINOR {minor}"),
            ("#define DOCTEST_VERSION_PATCH ", "#define DOCTEST_VERSION_PATCH {patch}"),
            ("#define DOCTEST_VERSION_STR ", "#define DOCTEST_VERSION_STR \"{version}\""),
        ]
        .into_iter()
        .map(|(prefix, template)| {
            RewriteRule::from_template(prefix, Template::parse(template).unwrap(), None).unwrap()
        })
        .collect()
    }

    #[test]
    fn test_template_parse_and_render() {
        let t = Template::parse("v{major}.{minor}.{patch} ({version})").unwrap();
        let v = parse_version("2.4.10").unwrap();
        let out = t
            .render(&RenderContext {
                version: &v,
                permalink: None,
            })
            .unwrap();
        assert_eq!(out, "v2.4.10 (2.4.10)");
        assert!(!t.needs_permalink());
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            Template::parse("{bogus}"),
            Err(TemplateError::UnknownPlaceholder { .. })
        ));
        assert!(matches!(
            Template::parse("x {major"),
            Err(TemplateError::Unterminated { .. })
        ));
        assert!(matches!(
            Template::parse("x major}"),
            Err(TemplateError::UnmatchedClose { .. })
        ));
    }

    #[test]
    fn test_template_missing_permalink() {
        let t = Template::parse(BADGE).unwrap();
        assert!(t.needs_permalink());
        let v = parse_version("1.0.0").unwrap();
        assert!(matches!(
            t.render(&RenderContext {
                version: &v,
                permalink: None
            }),
            Err(TemplateError::MissingPermalink { .. })
        ));
        assert!(matches!(
            RewriteRule::from_template("[![Try it online]", t, None),
            Err(TemplateError::MissingPermalink { .. })
        ));
    }

    #[test]
    fn test_major_unchanged_and_bumped() {
        let rules = header_rules();
        let lines = ["#define DOCTEST_VERSION_MAJOR 2"];

        let same = apply_rules(&lines, &parse_version("2.4.10").unwrap(), &rules);
        assert_eq!(same, vec!["#define DOCTEST_VERSION_MAJOR 2"]);

        let bumped = apply_rules(&lines, &parse_version("3.0.0").unwrap(), &rules);
        assert_eq!(bumped, vec!["#define DOCTEST_VERSION_MAJOR 3"]);
    }

    #[test]
    fn test_header_block() {
        let lines = [
            "#pragma once",
            "#define DOCTEST_VERSION_MAJOR 1",
            "#define DOCTEST_VERSION_MINOR 0",
            "#define DOCTEST_VERSION_PATCH 0",
            "#define DOCTEST_VERSION_STR \"1.0.0\"",
            "#define DOCTEST_VERSION \\",
        ];
        let out = apply_rules(&lines, &parse_version("2.4.9").unwrap(), &header_rules());
        assert_eq!(
            out,
            vec![
                "#pragma once",
                "#define DOCTEST_VERSION_MAJOR 2",
                "#define DOCTEST_VERSION_MINOR 4",
                "#define DOCTEST_VERSION_PATCH 9",
                "#define DOCTEST_VERSION_STR \"2.4.9\"",
                "#define DOCTEST_VERSION \\",
            ]
        );
    }

    #[test]
    fn test_badge_rewrite_ignores_old_url() {
        let rule = RewriteRule::from_template(
            "[![Try it online]",
            Template::parse(BADGE).unwrap(),
            Some("http://example.com/abc"),
        )
        .unwrap();
        let lines = ["# Title", "[![Try it online](old_url)", "text"];
        let out = apply_rules(&lines, &parse_version("1.0.0").unwrap(), &[rule]);
        assert_eq!(
            out[1],
            "[![Try it online](https://img.shields.io/badge/try%20it-online-orange.svg)](http://example.com/abc)"
        );
        assert_eq!(out[0], "# Title");
        assert_eq!(out[2], "text");
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = vec![
            RewriteRule::new("#define A", |_| "first".to_string()),
            RewriteRule::new("#define AB", |_| "second".to_string()),
        ];
        let out = apply_rules(&["#define AB 1"], &parse_version("1.2.3").unwrap(), &rules);
        assert_eq!(out, vec!["first"]);
        assert_eq!(first_match("#define AB 1", &rules), Some(0));
        assert_eq!(first_match("int main()", &rules), None);
    }

    #[test]
    fn test_all_lines_sharing_prefix_rewritten() {
        let rules = header_rules();
        let lines = [
            "#define DOCTEST_VERSION_PATCH 0",
            "// gap",
            "#define DOCTEST_VERSION_PATCH 7",
        ];
        let out = apply_rules(&lines, &parse_version("1.2.3").unwrap(), &rules);
        assert_eq!(out[0], "#define DOCTEST_VERSION_PATCH 3");
        assert_eq!(out[2], "#define DOCTEST_VERSION_PATCH 3");
    }

    #[test]
    fn test_prefix_requires_exact_start() {
        let rules = header_rules();
        let lines = ["  #define DOCTEST_VERSION_MAJOR 1", "#define DOCTEST_VERSION_MAJORX 1"];
        let out = apply_rules(&lines, &parse_version("9.9.9").unwrap(), &rules);
        assert_eq!(out, lines);
    }
}

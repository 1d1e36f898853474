use std::path::{Path, PathBuf};
use thiserror::Error;

/// Project boundary checks so configured targets cannot escape the project
/// root or touch repository metadata.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Absolute path to project root
    project_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

impl ProjectGuard {
    /// Create a new guard rooted at `project_root`.
    ///
    /// The root is canonicalized to handle symlinks correctly.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = canonicalize(project_root.as_ref())?;

        let mut forbidden_paths = Vec::new();
        if let Ok(git_dir) = project_root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Resolve `path` (relative paths against the project root) and check it.
    ///
    /// The file itself may not exist yet (example READMEs are created), but
    /// its parent directory must.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let canonical = if absolute.exists() {
            canonicalize(&absolute)?
        } else {
            match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => canonicalize(parent)?.join(name),
                _ => {
                    return Err(SafetyError::Canonicalize {
                        path: absolute.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "path has no file name",
                        ),
                    })
                }
            }
        };

        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: canonical.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_inside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = ProjectGuard::new(root).unwrap();

        let file = root.join("doctest/parts/doctest_fwd.h");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.resolve(&file).is_ok());
        assert!(guard.resolve("doctest/parts/doctest_fwd.h").is_ok());
    }

    #[test]
    fn test_resolve_new_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("examples/hello")).unwrap();
        let guard = ProjectGuard::new(root).unwrap();

        let resolved = guard.resolve("examples/hello/README.md").unwrap();
        assert!(resolved.ends_with("examples/hello/README.md"));
        assert!(guard.resolve("examples/missing-dir/README.md").is_err());
    }

    #[test]
    fn test_resolve_outside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("project");
        fs::create_dir_all(&root).unwrap();
        let guard = ProjectGuard::new(&root).unwrap();

        let outside = temp_dir.path().join("README.md");
        fs::write(&outside, b"").unwrap();

        assert!(matches!(
            guard.resolve(&outside),
            Err(SafetyError::OutsideProject { .. })
        ));
        assert!(matches!(
            guard.resolve("../README.md"),
            Err(SafetyError::OutsideProject { .. })
        ));
    }

    #[test]
    fn test_resolve_git_dir_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), b"ref: refs/heads/main\n").unwrap();
        let guard = ProjectGuard::new(root).unwrap();

        assert!(matches!(
            guard.resolve(".git/HEAD"),
            Err(SafetyError::ForbiddenPath { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("project");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("outside.h");
        fs::write(&outside, b"").unwrap();
        symlink(&outside, root.join("escape.h")).unwrap();

        let guard = ProjectGuard::new(&root).unwrap();
        assert!(matches!(
            guard.resolve("escape.h"),
            Err(SafetyError::OutsideProject { .. })
        ));
    }
}

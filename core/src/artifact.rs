use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Whether a path is read by a command or expected to be created by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Input,
    Output,
}

/// A file referenced by a command.
///
/// Identity is the canonical (absolute, symlink-resolved) path: two artifacts
/// naming the same file through different spellings compare equal, whatever
/// their role.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    canonical: PathBuf,
    role: Role,
}

impl Artifact {
    pub fn new(path: impl AsRef<Path>, role: Role) -> Self {
        let path = absolute(path.as_ref());
        let canonical = canonicalize_lenient(&path);
        Self {
            path,
            canonical,
            role,
        }
    }

    pub fn input(path: impl AsRef<Path>) -> Self {
        Self::new(path, Role::Input)
    }

    pub fn output(path: impl AsRef<Path>) -> Self {
        Self::new(path, Role::Output)
    }

    /// Absolute path as rendered on command lines.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_output(&self) -> bool {
        self.role == Role::Output
    }

    /// Directory the file lives in.
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }

    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }

    /// True when the artifact exists as a regular file right now.
    pub fn exists(&self) -> bool {
        self.canonical.is_file()
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Joins relative paths onto the working directory. The caller's spelling
/// is otherwise kept: `..` after a symlink means the link target's parent.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolves the longest existing ancestor of `path` through the filesystem,
/// then folds `.` and `..` in the components that do not exist yet. Those
/// cannot be symlinks, so lexical folding is exact there.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if let Ok(resolved) = std::fs::canonicalize(ancestor) {
            return match path.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => {
                    normalize_lexically(&resolved.join(rest))
                }
                _ => resolved,
            };
        }
    }
    normalize_lexically(path)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_role_and_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let a = Artifact::output(dir.path().join("sub/../out.mnc"));
        let b = Artifact::input(dir.path().join("./out.mnc"));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[cfg(unix)]
    #[test]
    fn equality_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let via_link = Artifact::output(link.join("brain.mnc"));
        let direct = Artifact::output(real.join("brain.mnc"));
        assert_eq!(via_link, direct);
        // The rendered path keeps the caller's spelling.
        assert!(via_link.path().starts_with(&link));
    }

    #[cfg(unix)]
    #[test]
    fn parent_of_a_symlink_is_the_target_parent() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("sub")).unwrap();
        std::fs::write(real.join("x.img"), b"").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(real.join("sub"), &link).unwrap();

        // link/.. is real/, not the temp dir.
        let existing = Artifact::output(link.join("../x.img"));
        assert!(existing.exists());
        assert_eq!(existing, Artifact::output(real.join("x.img")));
        assert_eq!(existing.path(), link.join("../x.img").as_path());

        let missing = Artifact::output(link.join("../new.img"));
        assert!(!missing.exists());
        assert_eq!(missing, Artifact::output(real.join("new.img")));
        assert_ne!(missing, Artifact::output(dir.path().join("new.img")));
    }

    #[test]
    fn exists_only_for_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.img");
        assert!(!Artifact::output(&file).exists());

        std::fs::write(&file, b"x").unwrap();
        assert!(Artifact::output(&file).exists());
        assert!(!Artifact::output(dir.path()).exists());
    }

    #[test]
    fn accessors() {
        let artifact = Artifact::output("/out/nuc/subject1.mnc");
        assert_eq!(artifact.stem(), Some("subject1"));
        assert_eq!(artifact.file_name(), Some("subject1.mnc"));
        assert_eq!(artifact.parent(), Some(Path::new("/out/nuc")));
        assert!(artifact.is_output());
    }
}

//! Configuration utility functions.

use std::path::{Component, Path, PathBuf};

/// Find config file by searching upward from the current directory.
///
/// ```text
/// /home/user/site/styles/vendor/  ← cwd
/// /home/user/site/cssurl.toml     ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(config_name, &cwd)
}

/// Same as [`find_config_file`], starting at `start`.
pub fn find_config_file_from(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Expand `~` and make `path` absolute against `root`, without touching the
/// filesystem.
pub fn expand_path(path: &Path, root: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    let full = if path.is_relative() { root.join(path) } else { path };
    clean(&full)
}

/// Lexically drop `.` and fold `..` components.
fn clean(path: &Path) -> PathBuf {
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
    use std::fs;

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("styles/vendor");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("cssurl.toml"), "").unwrap();

        let found = find_config_file_from(Path::new("cssurl.toml"), &nested).unwrap();
        assert_eq!(found, dir.path().join("cssurl.toml"));
        assert!(find_config_file_from(Path::new("missing.toml"), &nested).is_none());
    }

    #[test]
    fn test_find_config_file_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cssurl.toml")).unwrap();
        let found = find_config_file_from(Path::new("cssurl.toml"), dir.path());
        assert_ne!(found.as_deref(), Some(dir.path().join("cssurl.toml").as_path()));
    }

    #[test]
    fn test_expand_path() {
        let root = Path::new("/site");
        assert_eq!(expand_path(Path::new("public"), root), PathBuf::from("/site/public"));
        assert_eq!(expand_path(Path::new("./a/../b"), root), PathBuf::from("/site/b"));
        assert_eq!(expand_path(Path::new("/abs/dir"), root), PathBuf::from("/abs/dir"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_path(Path::new("~/dist"), root),
                clean(&PathBuf::from(home).join("dist"))
            );
        }
    }
}

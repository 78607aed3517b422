//! Remote path utilities.
//!
//! Remote drive paths are always POSIX-style and absolute ("/backup/a.txt").

use crate::error::PathError;

/// Lexically normalize a remote path.
///
/// Collapses repeated separators, removes `.` components and resolves `..`
/// components without ever climbing above the root.
///
/// # Arguments
/// * `path` - Absolute remote path
///
/// # Returns
/// Normalized absolute path, `/` for the root.
pub fn clean_remote_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    format!("/{}", components.join("/"))
}

/// Split a remote save path into its parent directory and file name.
///
/// # Arguments
/// * `save_path` - Absolute remote destination path of a file
///
/// # Returns
/// `(parent_dir, file_name)`; `parent_dir` is `/` for top-level files.
///
/// # Errors
/// Returns error if the path is relative or names no file.
pub fn split_save_path(save_path: &str) -> Result<(String, String), PathError> {
    if !save_path.starts_with('/') {
        return Err(PathError::NotAbsolute {
            path: save_path.to_string(),
        });
    }

    let cleaned: String = clean_remote_path(save_path);
    match cleaned.rsplit_once('/') {
        Some((_, "")) | None => Err(PathError::InvalidPath {
            path: save_path.to_string(),
        }),
        Some(("", file)) => Ok(("/".to_string(), file.to_string())),
        Some((dir, file)) => Ok((dir.to_string(), file.to_string())),
    }
}

/// Split a remote directory path into its folder names.
///
/// # Arguments
/// * `dir` - Absolute remote directory path
///
/// # Returns
/// Folder names from the root down; empty for the root itself.
pub fn path_segments(dir: &str) -> Vec<String> {
    clean_remote_path(dir)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check whether a remote directory path is the drive root.
pub fn is_root(dir: &str) -> bool {
    clean_remote_path(dir) == "/"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_dot_and_duplicate_slashes() {
        assert_eq!(clean_remote_path("/a/./b//c/"), "/a/b/c");
    }

    #[test]
    fn test_clean_resolves_dotdot() {
        assert_eq!(clean_remote_path("/a/b/../c"), "/a/c");
    }

    #[test]
    fn test_clean_never_climbs_above_root() {
        assert_eq!(clean_remote_path("/../../b"), "/b");
        assert_eq!(clean_remote_path("/"), "/");
    }

    #[test]
    fn test_split_nested_path() {
        let (dir, file) = split_save_path("/backup/photos/a.jpg").unwrap();
        assert_eq!(dir, "/backup/photos");
        assert_eq!(file, "a.jpg");
    }

    #[test]
    fn test_split_top_level_path() {
        let (dir, file) = split_save_path("/a.jpg").unwrap();
        assert_eq!(dir, "/");
        assert_eq!(file, "a.jpg");
    }

    #[test]
    fn test_split_rejects_relative_path() {
        assert!(matches!(
            split_save_path("backup/a.jpg"),
            Err(PathError::NotAbsolute { .. })
        ));
    }

    #[test]
    fn test_split_rejects_root() {
        assert!(matches!(
            split_save_path("/"),
            Err(PathError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(path_segments("/backup/photos"), vec!["backup", "photos"]);
        assert!(path_segments("/").is_empty());
    }

    #[test]
    fn test_is_root() {
        assert!(is_root("/"));
        assert!(is_root("/a/.."));
        assert!(!is_root("/a"));
    }
}

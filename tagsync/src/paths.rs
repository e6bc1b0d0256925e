use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("home directory is unavailable")]
    MissingHome,
    #[error("environment variable `{0}` referenced by path is not set")]
    MissingVar(String),
}

/// Expands a friendly path (`~/notes/$HOST.md`) into a real local path.
/// Only a leading tilde and `$VAR` segments are interpreted; friendly paths
/// are the stable identity used as state keys and remote paths, so expansion
/// must be deterministic for a given environment.
pub fn expand(friendly: &str) -> Result<PathBuf, PathError> {
    if friendly.is_empty() {
        return Err(PathError::Empty);
    }
    let with_vars = expand_vars(friendly)?;
    if with_vars == "~" {
        return dirs::home_dir().ok_or(PathError::MissingHome);
    }
    if let Some(rest) = with_vars.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or(PathError::MissingHome)?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(with_vars))
}

fn expand_vars(value: &str) -> Result<String, PathError> {
    if !value.contains('$') {
        return Ok(value.to_string());
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push('$');
            continue;
        }
        match std::env::var(&name) {
            Ok(val) => out.push_str(&val),
            Err(_) => return Err(PathError::MissingVar(name)),
        }
    }
    Ok(out)
}

/// Segment-boundary prefix test on friendly paths: `~/a/b` is under `~/a`
/// but `~/ab` is not.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// True when either path is under the other. A remote file may be a
/// descendant of a configured directory, or a configured directory may not
/// exist remotely yet while one of its future ancestors does.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    path_has_prefix(a, b) || path_has_prefix(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~").unwrap(), home);
        assert_eq!(expand("~/notes/a.md").unwrap(), home.join("notes/a.md"));
    }

    #[test]
    fn leaves_absolute_paths_alone() {
        assert_eq!(expand("/tmp/x").unwrap(), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn expands_environment_variables() {
        unsafe { std::env::set_var("TAGSYNC_TEST_DIR", "docs") };
        assert_eq!(
            expand("/srv/$TAGSYNC_TEST_DIR/a").unwrap(),
            PathBuf::from("/srv/docs/a")
        );
    }

    #[test]
    fn missing_variable_is_an_error() {
        assert!(matches!(
            expand("/srv/$TAGSYNC_UNSET_VAR/a"),
            Err(PathError::MissingVar(name)) if name == "TAGSYNC_UNSET_VAR"
        ));
    }

    #[test]
    fn empty_path_is_an_error() {
        assert!(matches!(expand(""), Err(PathError::Empty)));
    }

    #[test]
    fn prefix_respects_segment_boundaries() {
        assert!(path_has_prefix("~/a/b", "~/a"));
        assert!(path_has_prefix("~/a", "~/a"));
        assert!(path_has_prefix("~/a/b", "~/a/"));
        assert!(!path_has_prefix("~/ab", "~/a"));
        assert!(!path_has_prefix("~/a", "~/a/b"));
    }

    #[test]
    fn overlap_matches_both_directions() {
        assert!(paths_overlap("~/a/b/c.txt", "~/a"));
        assert!(paths_overlap("~/a", "~/a/b/c.txt"));
        assert!(!paths_overlap("~/a/bc", "~/a/b"));
    }
}

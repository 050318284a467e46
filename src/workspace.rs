use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Error;
use crate::error::Result;

/// Join an optional relative path onto the workspace root.
///
/// The path is normalized lexically; absolute paths and paths that climb out of
/// the workspace are rejected.
pub fn resolve_safe_child_path(workspace: &Path, relative: Option<&str>) -> Result<PathBuf> {
    let Some(relative) = relative.filter(|r| !r.trim().is_empty()) else {
        return Ok(workspace.to_path_buf());
    };

    let unsafe_path = || Error::UnsafePath {
        workspace: workspace.to_path_buf(),
        path: PathBuf::from(relative),
    };

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(unsafe_path());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
        }
    }

    Ok(workspace.join(normalized))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::none(None, "/work")]
    #[case::blank(Some(""), "/work")]
    #[case::child(Some("skeleton"), "/work/skeleton")]
    #[case::nested(Some("./a/b/../c"), "/work/a/c")]
    fn test_resolves_inside_workspace(#[case] relative: Option<&str>, #[case] expected: &str) {
        let path = resolve_safe_child_path(Path::new("/work"), relative).unwrap();
        assert_eq!(path, PathBuf::from(expected));
    }

    #[rstest]
    #[case::parent("..")]
    #[case::climb_out("a/../../etc")]
    #[case::absolute("/etc/passwd")]
    fn test_rejects_escape(#[case] relative: &str) {
        let err = resolve_safe_child_path(Path::new("/work"), Some(relative)).unwrap_err();
        assert!(matches!(err, Error::UnsafePath { .. }));
    }
}

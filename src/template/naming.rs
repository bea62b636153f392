//! Generated method names derived from template paths

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and resolve `.` and `..` lexically
///
/// Relative paths are taken against the current directory. Symlinks are left
/// alone, so the file does not have to exist.
pub fn expand_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` stays at the root
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Method name for the template at `path`
///
/// Every character of the expanded path outside `[.a-zA-Z0-9]` becomes `__`
/// and every `.` becomes `_`.
pub fn template_name(path: &Path) -> String {
    mangle(&expand_path(path).to_string_lossy())
}

fn mangle(path: &str) -> String {
    let mut name = String::with_capacity(path.len() * 2);
    for c in path.chars() {
        match c {
            '.' => name.push('_'),
            c if c.is_ascii_alphanumeric() => name.push(c),
            _ => name.push_str("__"),
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mangle() {
        assert_eq!(
            mangle("/app/views/index.html.erb"),
            "__app__views__index_html_erb"
        );
        assert_eq!(mangle("/a-b/c d"), "__a__b__c__d");
    }

    #[test]
    fn test_expand_normalizes() {
        assert_eq!(
            expand_path(Path::new("/app/./views/../views/x.erb")),
            PathBuf::from("/app/views/x.erb")
        );
        assert_eq!(expand_path(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_relative_paths_expand_to_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path(Path::new("views/x.erb")), cwd.join("views/x.erb"));
        assert_eq!(
            template_name(Path::new("./views/x.erb")),
            template_name(&cwd.join("views").join("x.erb"))
        );
    }

    #[test]
    fn test_name_is_idempotent() {
        let path = Path::new("/srv/app/views/layout.html.erb");
        assert_eq!(template_name(path), template_name(path));
        assert_eq!(
            template_name(path),
            template_name(Path::new("/srv/app/views/../views/layout.html.erb"))
        );
    }

    #[test]
    fn test_name_is_identifier_safe() {
        let name = template_name(Path::new("/tmp/wëird-näme (1).erb"));
        assert!(name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()));
    }
}

//! Path splitting for filesystem operations.
//!
//! Paths arrive as plain text. These helpers separate a path into the
//! directory that must already exist and the single leaf name to act on.

use crate::error::OpError;

/// Split a path into `(parent, leaf)`, anchoring it at the root.
///
/// A missing leading `/` is added, so the result never depends on a
/// working directory. An empty parent becomes `/`.
///
/// # Errors
///
/// Returns `MalformedInput` when the path ends in `/` (empty leaf).
pub fn split_rooted(path: &str) -> Result<(String, String), OpError> {
    let rooted = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    // rooted always contains '/'
    let idx = rooted.rfind('/').unwrap_or(0);
    let (parent, leaf) = (&rooted[..idx], &rooted[idx + 1..]);

    if leaf.is_empty() {
        return Err(OpError::malformed(format!("'{}' has no final name", path)));
    }

    let parent = if parent.is_empty() { "/" } else { parent };
    Ok((parent.to_string(), leaf.to_string()))
}

/// Split a path into `(parent, leaf)` at its last `/`.
///
/// # Errors
///
/// Returns `InvalidArgument` when the path has no directory component.
pub fn split_parent(path: &str) -> Result<(&str, &str), OpError> {
    let idx = path
        .rfind('/')
        .ok_or_else(|| OpError::invalid_argument(format!("'{}' has no directory component", path)))?;

    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Ok((parent, &path[idx + 1..]))
}

/// Validate a name that must stay inside its parent directory.
pub fn validate_leaf_name(name: &str) -> Result<(), OpError> {
    if name.is_empty() {
        return Err(OpError::malformed("empty name"));
    }
    if name == "." || name == ".." {
        return Err(OpError::malformed(format!("'{}' is not a valid name", name)));
    }
    if name.contains('/') {
        return Err(OpError::malformed(format!(
            "'{}' must be a single path component",
            name
        )));
    }
    if name.contains('\0') {
        return Err(OpError::malformed("name contains a NUL byte"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rooted() {
        assert_eq!(
            split_rooted("/tmp/a").unwrap(),
            ("/tmp".to_string(), "a".to_string())
        );
        assert_eq!(
            split_rooted("newdir").unwrap(),
            ("/".to_string(), "newdir".to_string())
        );
        assert_eq!(
            split_rooted("/top").unwrap(),
            ("/".to_string(), "top".to_string())
        );
        assert_eq!(
            split_rooted("var/www/site").unwrap(),
            ("/var/www".to_string(), "site".to_string())
        );
    }

    #[test]
    fn test_split_rooted_trailing_slash() {
        assert!(matches!(
            split_rooted("/tmp/"),
            Err(OpError::MalformedInput { .. })
        ));
        assert!(split_rooted("/").is_err());
    }

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/tmp/a.txt").unwrap(), ("/tmp", "a.txt"));
        assert_eq!(split_parent("/a.txt").unwrap(), ("/", "a.txt"));
        assert_eq!(split_parent("rel/a.txt").unwrap(), ("rel", "a.txt"));
        assert!(matches!(
            split_parent("a.txt"),
            Err(OpError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_validate_leaf_name() {
        assert!(validate_leaf_name("b.txt").is_ok());
        assert!(validate_leaf_name(".hidden").is_ok());
        assert!(validate_leaf_name("").is_err());
        assert!(validate_leaf_name("..").is_err());
        assert!(validate_leaf_name("sub/b.txt").is_err());
    }
}

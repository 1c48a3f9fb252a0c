//! Result code translation.
//!
//! An operation result becomes a single signed integer: the success count
//! when non-negative, a negated POSIX errno otherwise.

use std::io;

use nix::errno::Errno;

use crate::commands::OperationResult;
use crate::error::OpError;

/// POSIX errno reported for an operation failure.
pub fn errno_for(err: &OpError) -> Errno {
    match err {
        OpError::MalformedInput { .. } | OpError::InvalidArgument { .. } => Errno::EINVAL,
        OpError::NotFound { .. } => Errno::ENOENT,
        OpError::NotADirectory { .. } => Errno::ENOTDIR,
        OpError::NotAFile { .. } => Errno::EISDIR,
        OpError::PermissionDenied { source, .. } => {
            if source.raw_os_error() == Some(Errno::EPERM as i32) {
                Errno::EPERM
            } else {
                Errno::EACCES
            }
        }
        OpError::NotEmpty { .. } => Errno::ENOTEMPTY,
        OpError::AlreadyExists { .. } => Errno::EEXIST,
        OpError::ResourceExhausted { .. } => Errno::ENOMEM,
        OpError::Io { source, .. } => errno_for_io(source),
    }
}

/// Errno carried by an I/O error, or the closest match for its kind.
fn errno_for_io(err: &io::Error) -> Errno {
    if let Some(raw) = err.raw_os_error() {
        return Errno::from_raw(raw);
    }

    match err.kind() {
        io::ErrorKind::NotFound => Errno::ENOENT,
        io::ErrorKind::PermissionDenied => Errno::EACCES,
        io::ErrorKind::AlreadyExists => Errno::EEXIST,
        io::ErrorKind::NotADirectory => Errno::ENOTDIR,
        io::ErrorKind::IsADirectory => Errno::EISDIR,
        io::ErrorKind::DirectoryNotEmpty => Errno::ENOTEMPTY,
        io::ErrorKind::InvalidInput => Errno::EINVAL,
        io::ErrorKind::OutOfMemory => Errno::ENOMEM,
        io::ErrorKind::StorageFull => Errno::ENOSPC,
        _ => Errno::EIO,
    }
}

/// Result code sent back to the caller.
pub fn result_code(result: &OperationResult) -> i64 {
    match result {
        Ok(count) => i64::try_from(*count).unwrap_or(i64::MAX),
        Err(e) => -(errno_for(e) as i64),
    }
}

/// Human-readable form of a result code, e.g. `-2 (ENOENT: No such file or directory)`.
pub fn describe_result(code: i64) -> String {
    if code >= 0 {
        return code.to_string();
    }

    match i32::try_from(-code) {
        Ok(raw) => {
            let errno = Errno::from_raw(raw);
            format!("{} ({:?}: {})", code, errno, errno.desc())
        }
        Err(_) => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_codes() {
        assert_eq!(result_code(&Ok(5)), 5);
        assert_eq!(result_code(&Ok(0)), 0);
        assert_eq!(result_code(&Ok(u64::MAX)), i64::MAX);
    }

    #[test]
    fn test_error_codes() {
        let code = |err: OpError| result_code(&Err(err));

        assert_eq!(code(OpError::malformed("x")), -(libc_like::EINVAL));
        assert_eq!(code(OpError::NotFound { path: "/a".into() }), -(libc_like::ENOENT));
        assert_eq!(code(OpError::NotAFile { path: "/a".into() }), -(libc_like::EISDIR));
        assert_eq!(code(OpError::NotEmpty { path: "/a".into() }), -(libc_like::ENOTEMPTY));
        assert_eq!(
            code(OpError::ResourceExhausted {
                message: "payload".into()
            }),
            -(libc_like::ENOMEM)
        );
    }

    #[test]
    fn test_permission_denied_keeps_eperm() {
        let err = OpError::PermissionDenied {
            path: "/a".into(),
            source: io::Error::from_raw_os_error(Errno::EPERM as i32),
        };
        assert_eq!(errno_for(&err), Errno::EPERM);

        let err = OpError::PermissionDenied {
            path: "/a".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(errno_for(&err), Errno::EACCES);
    }

    #[test]
    fn test_io_error_codes() {
        let err = OpError::io("/a", io::Error::from_raw_os_error(Errno::ENOSPC as i32));
        assert_eq!(errno_for(&err), Errno::ENOSPC);

        let err = OpError::io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(errno_for(&err), Errno::ENOENT);

        let err = OpError::io("/a", io::Error::other("weird"));
        assert_eq!(errno_for(&err), Errno::EIO);
    }

    #[test]
    fn test_describe_result() {
        assert_eq!(describe_result(5), "5");
        assert!(describe_result(-(Errno::ENOENT as i64)).contains("ENOENT"));
    }

    /// Linux errno values, spelled out so the mapping is pinned.
    mod libc_like {
        pub const ENOENT: i64 = 2;
        pub const ENOMEM: i64 = 12;
        pub const EISDIR: i64 = 21;
        pub const EINVAL: i64 = 22;
        pub const ENOTEMPTY: i64 = 39;
    }
}

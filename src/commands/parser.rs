//! Command payload parsing.
//!
//! Grammars, one per verb, with no quoting or escaping:
//!
//! | verb | payload |
//! |------|---------|
//! | `create` | `<path>\n<content>` |
//! | `delete-file`, `delete-folder`, `create-folder` | `<path>` |
//! | `rename-file`, `rename-folder` | `<path>\n<new_leaf_name>` |
//! | `update` | `<path>\|<content>\|<flag>` |
//!
//! Content in `update` therefore cannot contain `|`.

use crate::error::OpError;
use crate::validation::validate_leaf_name;

use super::types::{Command, Verb};

/// Parse a raw payload received on `verb`'s endpoint.
pub fn parse_command(verb: Verb, payload: &[u8]) -> Result<Command, OpError> {
    match verb {
        Verb::Create => {
            let (path, content) = split_once(payload, b'\n')
                .ok_or_else(|| OpError::malformed("missing newline after path"))?;
            Ok(Command::Create {
                target_path: path_field(path)?,
                content: content.to_vec(),
            })
        }
        Verb::DeleteFile => Ok(Command::DeleteFile {
            target_path: path_field(payload)?,
        }),
        Verb::DeleteFolder => Ok(Command::DeleteFolder {
            target_path: path_field(payload)?,
        }),
        Verb::CreateFolder => Ok(Command::CreateFolder {
            target_path: path_field(payload)?,
        }),
        Verb::RenameFile => {
            let (current_path, new_leaf_name) = parse_rename(payload)?;
            Ok(Command::RenameFile {
                current_path,
                new_leaf_name,
            })
        }
        Verb::RenameFolder => {
            let (current_path, new_leaf_name) = parse_rename(payload)?;
            Ok(Command::RenameFolder {
                current_path,
                new_leaf_name,
            })
        }
        Verb::Update => parse_update(payload),
    }
}

fn parse_rename(payload: &[u8]) -> Result<(String, String), OpError> {
    let (path, leaf) = split_once(payload, b'\n')
        .ok_or_else(|| OpError::malformed("missing newline between path and new name"))?;

    // exactly one trailing newline
    let leaf = leaf.strip_suffix(b"\n").unwrap_or(leaf);
    let leaf = text_field("new name", leaf)?;
    validate_leaf_name(&leaf)?;

    Ok((path_field(path)?, leaf))
}

fn parse_update(payload: &[u8]) -> Result<Command, OpError> {
    let (path, rest) = split_once(payload, b'|')
        .ok_or_else(|| OpError::malformed("missing '|' after path"))?;
    let (content, flag) = split_once(rest, b'|')
        .ok_or_else(|| OpError::malformed("missing '|' before overwrite flag"))?;

    let flag = flag.strip_suffix(b"\n").unwrap_or(flag);
    let flag = std::str::from_utf8(flag)
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| {
            OpError::malformed(format!(
                "overwrite flag '{}' is not an integer",
                String::from_utf8_lossy(flag)
            ))
        })?;

    Ok(Command::Update {
        target_path: path_field(path)?,
        content: content.to_vec(),
        overwrite: flag != 0,
    })
}

fn split_once(bytes: &[u8], separator: u8) -> Option<(&[u8], &[u8])> {
    let idx = bytes.iter().position(|&b| b == separator)?;
    Some((&bytes[..idx], &bytes[idx + 1..]))
}

fn path_field(bytes: &[u8]) -> Result<String, OpError> {
    let path = text_field("path", bytes)?;
    if path.contains('\0') {
        return Err(OpError::malformed("path contains a NUL byte"));
    }
    Ok(path)
}

fn text_field(name: &str, bytes: &[u8]) -> Result<String, OpError> {
    if bytes.is_empty() {
        return Err(OpError::malformed(format!("empty {}", name)));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| OpError::malformed(format!("{} is not valid UTF-8", name)))
}

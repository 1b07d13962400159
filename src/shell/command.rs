//! Command definitions
//!
//! Parses one input line into a shell command.

use crate::error::{Result, StoreError};

/// A parsed shell command
///
/// Arguments are kept as raw bytes so keys that are not UTF-8 survive the
/// trip from input line to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value of a key
    Get { key: Vec<u8> },

    /// Store a value (empty when omitted)
    Set { key: Vec<u8>, value: Vec<u8> },

    /// List keys under a prefix
    List { prefix: Vec<u8> },

    /// List keys and values under a prefix
    Find { prefix: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// End the session
    Exit,
}

impl Command {
    /// Parse a line; `Ok(None)` for a blank line
    ///
    /// The line splits on single spaces into at most three parts, so a
    /// `set` value keeps any spaces it contains. Any line starting with
    /// `exit` ends the session.
    pub fn parse(line: &[u8]) -> Result<Option<Command>> {
        let line = trim(line);
        if line.is_empty() {
            return Ok(None);
        }
        if line.starts_with(b"exit") {
            return Ok(Some(Command::Exit));
        }

        let mut parts = line.splitn(3, |&b| b == b' ');
        let verb = parts.next().unwrap_or_default();
        let first = parts.next().map(<[u8]>::to_vec);
        let rest = parts.next().map(<[u8]>::to_vec);

        let command = match verb {
            b"get" => Command::Get {
                key: first.ok_or(StoreError::Usage("missing <key>, usage: get <key>"))?,
            },
            b"set" => Command::Set {
                key: first.ok_or(StoreError::Usage(
                    "missing <key> and [value], usage: set <key> [value]",
                ))?,
                value: rest.unwrap_or_default(),
            },
            b"list" => Command::List {
                prefix: first.unwrap_or_default(),
            },
            b"find" => Command::Find {
                prefix: first.unwrap_or_default(),
            },
            b"del" => Command::Delete {
                key: first.ok_or(StoreError::Usage("missing <key>, usage: del <key>"))?,
            },
            other => {
                return Err(StoreError::UnrecognizedCommand(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        Ok(Some(command))
    }
}

/// Drop leading spaces/tabs and the line terminator
fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    if start >= end {
        &[]
    } else {
        &line[start..end]
    }
}

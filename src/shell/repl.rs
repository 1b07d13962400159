//! Read-eval-print loop
//!
//! Reads commands line by line, runs them against a store and prints the
//! results. Per-command errors are printed and the session continues.
//!
//! Input is read as bytes, so a line that is not UTF-8 is still a command.
//! Keys and values are decoded only when printed.

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::storage::StorageEngine;
use crate::store::Store;

use super::Command;

/// Whether the session should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive session bound to one store
pub struct Repl<'a, E: StorageEngine> {
    store: &'a Store<E>,
    prompt: String,
}

impl<'a, E: StorageEngine> Repl<'a, E> {
    /// Create a session; the prompt is `"<name>> "`
    pub fn new(store: &'a Store<E>, name: &str) -> Self {
        Self {
            store,
            prompt: format!("{}> ", name),
        }
    }

    /// Run until `exit` or end of input
    ///
    /// Returns an error only when reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<()> {
        let mut line = Vec::new();

        loop {
            write!(output, "{}", self.prompt)?;
            output.flush()?;

            line.clear();
            if input.read_until(b'\n', &mut line)? == 0 {
                break;
            }

            let flow = match Command::parse(&line) {
                Ok(Some(command)) => self.execute(command, &mut output)?,
                Ok(None) => Flow::Continue,
                Err(e) => {
                    writeln!(output, "{}", e)?;
                    Flow::Continue
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        // Leave the terminal on a fresh line
        writeln!(output)?;
        Ok(())
    }

    /// Run one command, printing its result or its error
    ///
    /// Store errors are printed; only output failures are returned.
    pub fn execute<W: Write>(&self, command: Command, output: &mut W) -> Result<Flow> {
        tracing::trace!(?command, "executing");

        let result = match command {
            Command::Get { key } => self
                .store
                .get(&key)
                .map(|value| writeln!(output, "{}", String::from_utf8_lossy(&value))),
            Command::Set { key, value } => self.store.set(&key, &value).map(|_| Ok(())),
            Command::List { prefix } => self.store.list(&prefix).map(|keys| {
                keys.iter()
                    .try_for_each(|key| writeln!(output, "- {}", String::from_utf8_lossy(key)))
            }),
            Command::Find { prefix } => self.store.find(&prefix).map(|entries| {
                entries.iter().try_for_each(|kv| {
                    writeln!(output, "- {}: '{}'", kv.key_text(), kv.value_text())
                })
            }),
            Command::Delete { key } => self.store.delete(&key).map(|_| Ok(())),
            Command::Exit => return Ok(Flow::Exit),
        };

        match result {
            Ok(written) => written?,
            Err(e) => writeln!(output, "{}", e)?,
        }
        Ok(Flow::Continue)
    }
}

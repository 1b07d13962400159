//! Shell Module
//!
//! Line-oriented command language over a [`Store`](crate::Store).
//!
//! ## Commands
//! - `get <key>`          print the value
//! - `set <key> [value]`  store a value (rest of the line, may be empty)
//! - `list [prefix]`      print `- <key>` for each matching key
//! - `find [prefix]`      print `- <key>: '<value>'` for each matching key
//! - `del <key>`          delete a key
//! - `exit`               end the session (any line starting with `exit`,
//!                          and end of input)

mod command;
mod repl;

pub use command::Command;
pub use repl::{Flow, Repl};

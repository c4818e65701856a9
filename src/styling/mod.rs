//! Terminal styling for status output.
//!
//! - **stdout**: primary data (backup lists, port tables)
//! - **stderr**: status messages (progress, success, errors, hints, warnings)
//!
//! Use `println!` for primary output and `eprintln!` for status messages.
//! Both are re-exported from anstream, which strips ANSI codes when the
//! stream is not a terminal.

mod constants;
mod suggest;

pub use anstream::{eprint, eprintln, print, println};

pub use constants::*;
pub use suggest::suggest_command;

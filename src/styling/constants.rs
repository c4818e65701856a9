//! Symbols and message formatters for terminal output.
//!
//! Messages are built with `cformat!` HTML-like tags:
//!
//! ```
//! use color_print::cformat;
//! use wtport::styling::success_message;
//!
//! let branch = "feature";
//! let msg = success_message(cformat!("Merged <bold>{branch}</> into main"));
//! assert!(msg.as_str().contains("feature"));
//! ```
//!
//! Errors are red and warnings yellow. Hints are dim, successes green, and
//! commands quoted inside messages bright-black.

use std::fmt;

use color_print::{cformat, cstr};

pub const PROGRESS_SYMBOL: &str = cstr!("<cyan>◎</>");
pub const SUCCESS_SYMBOL: &str = cstr!("<green>✓</>");
pub const ERROR_SYMBOL: &str = cstr!("<red>✗</>");
pub const WARNING_SYMBOL: &str = cstr!("<yellow>▲</>");
pub const HINT_SYMBOL: &str = cstr!("<dim>↳</>");
pub const INFO_SYMBOL: &str = cstr!("<dim>○</>");
/// For questions requiring user input
pub const PROMPT_SYMBOL: &str = cstr!("<cyan>❯</>");

/// A message that has already been formatted with a symbol and styling.
///
/// Message functions take `impl AsRef<str>` and return `FormattedMessage`.
/// Since `FormattedMessage` does not implement `AsRef<str>`, formatting a
/// message twice is a compile error:
///
/// ```compile_fail
/// use wtport::styling::error_message;
///
/// let msg = error_message("first error");
/// let double = error_message(msg);
/// ```
#[derive(Debug, Clone)]
pub struct FormattedMessage(String);

impl FormattedMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormattedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn error_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(cformat!("{ERROR_SYMBOL} <red>{}</>", content.as_ref()))
}

pub fn hint_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(cformat!("{HINT_SYMBOL} <dim>{}</>", content.as_ref()))
}

pub fn warning_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(cformat!("{WARNING_SYMBOL} <yellow>{}</>", content.as_ref()))
}

pub fn success_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(cformat!("{SUCCESS_SYMBOL} <green>{}</>", content.as_ref()))
}

pub fn progress_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(cformat!("{PROGRESS_SYMBOL} <cyan>{}</>", content.as_ref()))
}

/// Neutral status: symbol only, no color on the text
pub fn info_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(format!("{INFO_SYMBOL} {}", content.as_ref()))
}

pub fn prompt_message(content: impl AsRef<str>) -> FormattedMessage {
    FormattedMessage(format!("{PROMPT_SYMBOL} {}", content.as_ref()))
}

/// Format a section heading, optionally followed by a suffix such as a path.
pub fn format_heading(title: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(s) => cformat!("<cyan>{}</>  {}", title, s),
        None => cformat!("<cyan>{}</>", title),
    }
}

//! Copy-pasteable command suggestions for hint messages.
//!
//! ```
//! use wtport::styling::suggest_command;
//!
//! assert_eq!(suggest_command("merge", &["feature"], &["--force"]), "wtp merge feature --force");
//! assert_eq!(suggest_command("merge", &["-wip"], &[]), "wtp merge -- -wip");
//! assert_eq!(suggest_command("backup restore", &["my id"], &[]), "wtp backup restore 'my id'");
//! ```

use shell_escape::escape;
use std::borrow::Cow;

/// Build a suggested `wtp` invocation.
///
/// Positional arguments are shell-escaped; a `--` separator precedes the
/// first argument that starts with `-`. Global flags like `-C` are left out:
/// the user may have changed directory since the hint was printed.
pub fn suggest_command(subcommand: &str, args: &[&str], flags: &[&str]) -> String {
    let mut parts = vec!["wtp".to_string(), subcommand.to_string()];

    let mut separator_inserted = false;
    for arg in args {
        if arg.starts_with('-') && !separator_inserted {
            parts.push("--".to_string());
            separator_inserted = true;
        }
        parts.push(escape(Cow::Borrowed(*arg)).into_owned());
    }

    parts.extend(flags.iter().map(|s| s.to_string()));
    parts.join(" ")
}

//! Subprocess execution with uniform logging.
//!
//! Every external command the crate spawns (today, only `git`) goes through
//! [`run`], so `-v` output shows each command, its context, and its timing in
//! one consistent format.

use std::process::{Command, Output};
use std::time::Instant;

/// Render a command as a single line for logs and error messages.
pub fn command_line(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a command to completion, capturing its output.
///
/// `context` names what the command operates on (usually a worktree or
/// directory name) and is attached to the debug log lines.
pub fn run(cmd: &mut Command, context: Option<&str>) -> std::io::Result<Output> {
    let cmd_str = command_line(cmd);

    match context {
        Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
        None => log::debug!("$ {}", cmd_str),
    }

    let t0 = Instant::now();
    let result = cmd.output();
    let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let ctx = context.map(|c| format!("context={c} ")).unwrap_or_default();
    match &result {
        Ok(output) => log::debug!(
            "[wtp-trace] {}cmd=\"{}\" dur={:.1}ms ok={}",
            ctx,
            cmd_str,
            duration_ms,
            output.status.success()
        ),
        Err(e) => log::debug!(
            "[wtp-trace] {}cmd=\"{}\" dur={:.1}ms err=\"{}\"",
            ctx,
            cmd_str,
            duration_ms,
            e
        ),
    }

    result
}

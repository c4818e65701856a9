use std::io::{self, IsTerminal, Write};
use std::path::Path;

use color_print::cformat;
use wtport::git::{GitError, WtportError};
use wtport::merge::{
    Decision, DecisionRequest, MergeOptions, MergeOutcome, MergeSuccess, merge,
};
use wtport::ports::PortRegistry;
use wtport::predict::ConflictPrediction;
use wtport::styling::{
    eprint, eprintln, error_message, hint_message, info_message, println, prompt_message,
    success_message, suggest_command, warning_message,
};
use wtport::validate::ValidationIssue;

use super::open_repository;
use crate::cli::MergeArgs;

pub(crate) fn handle_merge(cwd: &Path, args: MergeArgs) -> anyhow::Result<()> {
    let (handle, config) = open_repository(cwd)?;
    let ports = PortRegistry::new(&handle.tool_dir());
    let options = MergeOptions {
        force: args.force,
        check: args.check,
        delete: args.delete,
        no_delete: args.no_delete,
        auto_confirm: args.yes,
    };

    let outcome = merge(
        &handle,
        &config,
        &ports,
        args.name.as_deref(),
        Some(cwd),
        options,
        ask,
    );
    render(&outcome);

    match outcome.exit_code() {
        0 => Ok(()),
        exit_code => Err(WtportError::AlreadyDisplayed { exit_code }.into()),
    }
}

/// Answer a pending decision from the terminal. Without a terminal the
/// answer is no; `--yes` approves everything before it gets here.
fn ask(request: &DecisionRequest) -> Decision {
    if let DecisionRequest::PredictedConflicts { predictions, .. } = request {
        eprintln!(
            "{}",
            warning_message(format!("{} file(s) may conflict:", predictions.len()))
        );
        print_predictions(predictions);
    }

    if !io::stdin().is_terminal() {
        eprintln!(
            "{}",
            info_message(cformat!(
                "{} Not a terminal, answering no (pass <bright-black>--yes</> to approve)",
                request.question()
            ))
        );
        return Decision::Decline;
    }

    match prompt_yes_no(&request.question()) {
        Ok(approved) => Decision::from(approved),
        Err(e) => {
            log::warn!("Could not read answer: {e}");
            Decision::Decline
        }
    }
}

fn prompt_yes_no(question: &str) -> io::Result<bool> {
    eprint!(
        "{} ",
        prompt_message(cformat!("{question} <bold>[y/N]</>"))
    );
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let response = input.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

fn print_predictions(predictions: &[ConflictPrediction]) {
    for prediction in predictions {
        println!("{}", prediction.render());
    }
}

fn render(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::Succeeded(success) => render_success(success),

        MergeOutcome::Conflicted {
            branch,
            conflict_count,
            paths,
            snapshot_id,
            state_saved,
        } => {
            match conflict_count {
                Some(_) => eprintln!(
                    "{}",
                    GitError::MergeConflict {
                        branch: branch.clone(),
                        paths: paths.clone(),
                    }
                ),
                None => {
                    eprintln!(
                        "{}",
                        error_message(cformat!("Merging <bold>{branch}</> stopped with conflicts"))
                    );
                    eprintln!(
                        "{}",
                        hint_message(cformat!(
                            "To see them, run <bright-black>git status</> in the main checkout"
                        ))
                    );
                }
            }
            for path in paths {
                println!("{path}");
            }
            if !state_saved {
                eprintln!("{}", warning_message("The merge state could not be recorded"));
            }
            if let Some(id) = snapshot_id {
                let cmd = suggest_command("backup restore", &[id], &[]);
                eprintln!(
                    "{}",
                    hint_message(cformat!("To undo the merge, run <bright-black>{cmd}</>"))
                );
            }
        }

        MergeOutcome::ValidationFailed(issues) => {
            for issue in issues {
                render_issue(issue);
            }
            eprintln!("{}", info_message("Merge not attempted"));
        }

        MergeOutcome::Preview(predictions) => {
            if predictions.is_empty() {
                eprintln!("{}", success_message("No conflicts predicted"));
            } else {
                eprintln!(
                    "{}",
                    warning_message(format!("{} file(s) may conflict", predictions.len()))
                );
                print_predictions(predictions);
            }
        }

        MergeOutcome::Declined(kind) => {
            log::debug!("Declined {kind}");
            eprintln!("{}", info_message("Merge cancelled"));
        }

        MergeOutcome::Error { message, hint, .. } => {
            eprintln!("{}", error_message(message));
            if let Some(hint) = hint {
                eprintln!("{}", hint_message(hint));
            }
        }
    }
}

fn render_success(success: &MergeSuccess) {
    for warning in &success.warnings {
        eprintln!("{}", warning_message(warning));
    }
    let how = if success.fast_forward {
        " (fast-forward)"
    } else {
        ""
    };
    eprintln!(
        "{}",
        success_message(cformat!(
            "Merged <bold>{}</> into <bold>{}</>{how}",
            success.branch,
            success.main_branch
        ))
    );
    if success.cleaned_up {
        eprintln!(
            "{}",
            success_message(cformat!("Removed worktree and branch <bold>{}</>", success.branch))
        );
    }
    if let Some(id) = &success.snapshot_id {
        let cmd = suggest_command("backup restore", &[id], &[]);
        eprintln!(
            "{}",
            hint_message(cformat!("To undo, run <bright-black>{cmd}</>"))
        );
    }
}

fn render_issue(issue: &ValidationIssue) {
    let line = if issue.is_blocking() {
        error_message(&issue.message)
    } else {
        warning_message(&issue.message)
    };
    eprintln!("{line}");
    if let Some(detail) = &issue.detail {
        for path in detail.lines() {
            eprintln!("   {path}");
        }
    }
    if let Some(hint) = &issue.hint {
        eprintln!("{}", hint_message(hint));
    }
}

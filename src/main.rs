use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use wtport::config::set_config_path;
use wtport::git::{EXIT_FAILURE, GitError, exit_code};
use wtport::styling::{INFO_SYMBOL, WARNING_SYMBOL, eprintln, error_message};

mod cli;
mod commands;

use cli::{BackupCommand, Cli, Commands};

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let dim = anstyle::Style::new().dimmed();
            match record.level() {
                log::Level::Error | log::Level::Warn => {
                    writeln!(buf, "{WARNING_SYMBOL} {}", record.args())
                }
                log::Level::Info => writeln!(buf, "{INFO_SYMBOL} {}", record.args()),
                _ => writeln!(buf, "{dim}{}{dim:#}", record.args()),
            }
        })
        .init();
}

/// Directory commands run against: `-C` (relative to the process cwd) or the cwd.
fn working_dir(directory: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    Ok(match directory {
        Some(dir) => wtport::path::resolve_relative(&cwd, &dir),
        None => cwd,
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = working_dir(cli.directory)?;
    let Some(command) = cli.command else {
        return Ok(());
    };
    match command {
        Commands::Merge(args) => commands::handle_merge(&cwd, args),
        Commands::Backup(BackupCommand::List) => commands::handle_backup_list(&cwd),
        Commands::Backup(BackupCommand::Restore { id, keep_changes }) => {
            commands::handle_backup_restore(&cwd, &id, keep_changes)
        }
        Commands::Backup(BackupCommand::Delete { id }) => commands::handle_backup_delete(&cwd, &id),
        Commands::Backup(BackupCommand::Prune { older_than }) => {
            commands::handle_backup_prune(&cwd, older_than)
        }
        Commands::Backup(BackupCommand::State { clear }) => {
            commands::handle_backup_state(&cwd, clear)
        }
        Commands::Ports => commands::handle_ports(&cwd),
    }
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if let Some(path) = cli.config.clone() {
        set_config_path(path);
    }

    if let Err(err) = run(cli) {
        if let Some(code) = exit_code(&err) {
            process::exit(code);
        }
        // GitError renders its own symbol and hint
        if let Some(git_err) = err.downcast_ref::<GitError>() {
            eprintln!("{git_err}");
        } else {
            eprintln!("{}", error_message(format!("{err:#}")));
        }
        process::exit(EXIT_FAILURE);
    }
}

//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::process;

/// Record voice messages from the terminal and drop them where your chat picks them up
#[derive(Parser)]
#[command(name = "micnote")]
#[command(version)]
#[command(long_about = "Record voice messages from the terminal.\n\nThe record button pulses with your voice while recording. When you stop, the\nclip is encoded (Opus in Ogg when available) and written to the attachment\ndirectory, with its file URI copied to the clipboard for pasting into a chat.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXTERNAL TRIGGER:\n    $ pkill -USR1 micnote    # start or stop recording")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/micnote/micnote.toml\n    Logs:               ~/.local/state/micnote/micnote.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record voice messages (default)
    ///
    /// Space or Enter starts and stops a recording; Escape or q quits.
    /// SIGUSR1 toggles recording from outside the terminal.
    #[command(visible_alias = "r")]
    Record,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in micnote.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show which preferred encodings are available
    ///
    /// Probes ffmpeg and prints the preference list from micnote.toml with the
    /// encoding a new recording would use.
    #[command(visible_alias = "e")]
    Encodings,

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   micnote completions bash > micnote.bash
    ///   micnote completions zsh > _micnote
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "micnote", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Record) => commands::handle_record().await?,
        Some(Commands::Encodings) => commands::handle_encodings()?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

fn exit_on_error(result: Result<(), anyhow::Error>) -> Result<(), anyhow::Error> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_records() {
        let cli = Cli::try_parse_from(["micnote"]).unwrap();
        assert!(cli.command.is_none());
        let cli = Cli::try_parse_from(["micnote", "r"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Record)));
        let cli = Cli::try_parse_from(["micnote", "list-devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ListDevices)));
    }
}

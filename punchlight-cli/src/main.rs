//! Punchlight: punch-status light and reminders.
//!
//! # Usage
//!
//! ```text
//! punchlight host
//! punchlight light discover|update <bool>|set <h> <s> <v>|off [--host <ip>]
//! punchlight link update [--no-issues]|set <h> <s> <v>|off|discover
//! punchlight report ingest <path|-> [--no-light]
//! punchlight report status [--json]
//! punchlight remind [--json]
//! punchlight settings show|set [--alert-time HH:MM] [--enabled <bool>]
//! punchlight monitor [--once]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    light::LightArgs, link::LinkArgs, monitor::MonitorArgs, remind::RemindArgs,
    report::ReportCommand, settings::SettingsCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "punchlight",
    version,
    about = "Show punch-clock issues on a smart light",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the native messaging host on stdin/stdout.
    Host,

    /// Drive the light directly, without the native channel.
    Light(LightArgs),

    /// Send one command through the light link to a spawned native host.
    Link(LinkArgs),

    /// Store and inspect punch reports.
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Render the reminder notification.
    Remind(RemindArgs),

    /// Show or change reminder settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Watch for the punch page going unvisited.
    Monitor(MonitorArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Host => commands::host::run(),
        Commands::Light(args) => args.run(),
        Commands::Link(args) => args.run(),
        Commands::Report { command } => commands::report::run(command),
        Commands::Remind(args) => args.run(),
        Commands::Settings { command } => commands::settings::run(command),
        Commands::Monitor(args) => args.run(),
    }
}

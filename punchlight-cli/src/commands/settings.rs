//! `punchlight settings`: reminder time and on/off switch.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Subcommand};

use punchlight_core::reminder::next_alarm_time;
use punchlight_core::{settings, AlertTime, Settings};

use super::{home_dir, parse_bool};

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the current settings.
    Show,
    /// Change one or more settings.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Daily reminder time, `HH:MM`.
    #[arg(long)]
    pub alert_time: Option<AlertTime>,

    /// Turn the daily reminder on or off.
    #[arg(long, value_parser = parse_bool, action = clap::ArgAction::Set)]
    pub enabled: Option<bool>,
}

pub fn run(command: SettingsCommand) -> Result<()> {
    let home = home_dir()?;
    let mut settings = settings::load_at(&home).context("failed to load settings")?;

    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set(args) => {
            if args.alert_time.is_none() && args.enabled.is_none() {
                bail!("nothing to change; pass --alert-time and/or --enabled");
            }
            if let Some(alert_time) = args.alert_time {
                settings.alert_time = alert_time;
            }
            if let Some(enabled) = args.enabled {
                settings.enabled = enabled;
            }
            settings::save_at(&home, &settings).context("failed to save settings")?;
            println!("settings saved");
        }
    }

    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("alert time: {}", settings.alert_time);
    println!("enabled:    {}", settings.enabled);
    if settings.enabled {
        let next = next_alarm_time(settings.alert_time, &Local::now());
        println!("next alarm: {}", next.format("%Y-%m-%d %H:%M"));
    }
}

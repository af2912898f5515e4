//! `punchlight remind`: the daily reminder notification.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use punchlight_core::reminder::{next_alarm_time, reminder_message};
use punchlight_core::settings;

use super::home_dir;

#[derive(Args, Debug)]
pub struct RemindArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ReminderJson {
    title: String,
    message: String,
    enabled: bool,
    next_alarm: Option<DateTime<Local>>,
}

impl RemindArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let settings = settings::load_at(&home).context("failed to load settings")?;
        let reminder = reminder_message(settings.punch_data.as_ref(), settings.last_update);
        let next_alarm = settings
            .enabled
            .then(|| next_alarm_time(settings.alert_time, &Local::now()));

        if self.json {
            let payload = ReminderJson {
                title: reminder.title,
                message: reminder.message,
                enabled: settings.enabled,
                next_alarm,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize reminder JSON")?
            );
            return Ok(());
        }

        println!("{}", reminder.title.bold());
        println!("{}", reminder.message);
        match next_alarm {
            Some(at) => println!("\nnext reminder: {}", at.format("%Y-%m-%d %H:%M")),
            None => println!("\nreminders are disabled"),
        }
        Ok(())
    }
}

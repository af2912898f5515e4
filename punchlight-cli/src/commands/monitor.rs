//! `punchlight monitor`: hourly visit-staleness check.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use punchlight_core::staleness::{check_visit, format_age, CHECK_INTERVAL};
use punchlight_core::{settings, BadgeState, VisitSignal};

use super::{block_on, home_dir};

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Check once and exit.
    #[arg(long)]
    pub once: bool,
}

impl MonitorArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        if self.once {
            punchlight_host::runtime::init_tracing();
            let badge = check_once(&home)?;
            println!("badge: {}", badge_label(&badge));
            return Ok(());
        }
        block_on(watch(home))?
    }
}

async fn watch(home: PathBuf) -> Result<()> {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // A bad settings file is logged and retried on the next tick.
                if let Err(err) = check_once(&home) {
                    let message = format!("{err:#}");
                    tracing::error!(error = %message, "staleness check failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("ctrl-c handler failed")?;
                tracing::info!("monitor stopped");
                return Ok(());
            }
        }
    }
}

fn check_once(home: &std::path::Path) -> Result<BadgeState> {
    let settings = settings::load_at(home).context("failed to load settings")?;
    let visit = check_visit(settings.last_visit_time, Utc::now());
    let badge = BadgeState::evaluate(settings.punch_data.as_ref(), visit);

    match visit {
        VisitSignal::Stale { age } => {
            tracing::warn!(age = %format_age(age), "punch page not visited; showing needs-visit badge");
        }
        VisitSignal::Fresh { age } => {
            tracing::info!(age = %format_age(age), badge = ?badge, "punch page visited recently");
        }
        VisitSignal::NeverVisited => {
            tracing::info!(badge = ?badge, "punch page never visited");
        }
    }
    Ok(badge)
}

fn badge_label(badge: &BadgeState) -> String {
    match badge {
        BadgeState::NoData => "no data".to_string(),
        BadgeState::AllGood => "all good".to_string(),
        BadgeState::Issues { count } => format!("{count} issue(s)"),
        BadgeState::NeedsVisit => format!("needs visit ({})", badge.text()),
    }
}

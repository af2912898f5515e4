//! `punchlight report`: store scraped reports and show where things stand.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use punchlight_core::staleness::{check_visit, format_age, format_datetime_age};
use punchlight_core::{settings, BadgeState, LightCommand, PunchReport, Settings, VisitSignal};

use super::link::{send_and_wait, HostCommandArgs};
use super::{block_on, home_dir};

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Store a report (JSON file, or `-` for stdin) and update the light.
    Ingest(IngestArgs),
    /// Show the stored report, badge and visit freshness.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Report JSON path, or `-` to read stdin.
    pub path: PathBuf,

    /// Store only; leave the light alone.
    #[arg(long)]
    pub no_light: bool,

    #[command(flatten)]
    pub host: HostCommandArgs,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: ReportCommand) -> Result<()> {
    let home = home_dir()?;
    match command {
        ReportCommand::Ingest(args) => ingest(&home, args),
        ReportCommand::Status(args) => status(&home, args),
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

fn ingest(home: &Path, args: IngestArgs) -> Result<()> {
    let raw = read_input(&args.path)?;
    let report: PunchReport =
        serde_json::from_str(&raw).context("report is not valid punch report JSON")?;
    let has_issues = report.has_issues();

    let stored = settings::record_report_at(home, report, Utc::now())
        .context("failed to store report")?;
    let badge = BadgeState::from_report(stored.punch_data.as_ref());
    println!("stored report: {}", badge_summary(&badge));

    if args.no_light {
        return Ok(());
    }

    let connector = args.host.connector()?;
    let command = LightCommand::UpdateLight { has_issues };
    match block_on(send_and_wait(connector, &command, args.host.reply_timeout()))? {
        Ok(reply) if reply.is_ok() => println!("light: updated"),
        Ok(reply) => eprintln!(
            "{} light controller error: {}",
            "warning:".yellow().bold(),
            reply.message.as_deref().unwrap_or("unknown error")
        ),
        Err(err) => eprintln!("{} light not updated: {err:#}", "warning:".yellow().bold()),
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read report from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusJson<'a> {
    badge: BadgeState,
    badge_text: String,
    badge_color: Option<&'static str>,
    icon: &'static str,
    visit: &'static str,
    last_visit_age: Option<String>,
    last_update: Option<DateTime<Utc>>,
    last_visit_time: Option<DateTime<Utc>>,
    report: Option<&'a PunchReport>,
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "issue")]
    description: String,
}

fn status(home: &Path, args: StatusArgs) -> Result<()> {
    let settings = settings::load_at(home).context("failed to load settings")?;
    let now = Utc::now();
    let visit = check_visit(settings.last_visit_time, now);
    let badge = BadgeState::evaluate(settings.punch_data.as_ref(), visit);

    if args.json {
        return print_json(&settings, badge, visit);
    }
    print_table(&settings, badge, visit, now);
    Ok(())
}

fn print_json(settings: &Settings, badge: BadgeState, visit: VisitSignal) -> Result<()> {
    let payload = StatusJson {
        badge,
        badge_text: badge.text(),
        badge_color: badge.color(),
        icon: badge.icon(),
        visit: visit_key(&visit),
        last_visit_age: visit_age(&visit).map(format_age),
        last_update: settings.last_update,
        last_visit_time: settings.last_visit_time,
        report: settings.punch_data.as_ref(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(settings: &Settings, badge: BadgeState, visit: VisitSignal, now: DateTime<Utc>) {
    let last_update = settings
        .last_update
        .map(|at| format!("{} ago", format_datetime_age(at, now)))
        .unwrap_or_else(|| "never".to_string());
    println!(
        "Punchlight v{} | {} | last update {}",
        env!("CARGO_PKG_VERSION"),
        badge_summary(&badge),
        last_update,
    );

    match visit {
        VisitSignal::NeverVisited => println!("Punch page never visited."),
        VisitSignal::Fresh { age } => println!("Punch page visited {} ago.", format_age(age)),
        VisitSignal::Stale { age } => println!(
            "{} punch page not visited for {}; open it to refresh.",
            "!".truecolor(0xff, 0x98, 0x00).bold(),
            format_age(age)
        ),
    }

    let Some(report) = settings.punch_data.as_ref() else {
        println!("No report stored.");
        return;
    };
    if report.issues.is_empty() {
        return;
    }

    let rows: Vec<IssueRow> = report
        .issues
        .iter()
        .map(|issue| IssueRow {
            date: issue.date.to_string(),
            description: issue.description.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn badge_summary(badge: &BadgeState) -> String {
    match badge {
        BadgeState::NoData => "no data".bright_black().to_string(),
        BadgeState::AllGood => "all good".green().bold().to_string(),
        BadgeState::Issues { count } => format!("{count} issue(s)").red().bold().to_string(),
        BadgeState::NeedsVisit => "needs visit".yellow().bold().to_string(),
    }
}

fn visit_key(visit: &VisitSignal) -> &'static str {
    match visit {
        VisitSignal::NeverVisited => "never_visited",
        VisitSignal::Fresh { .. } => "fresh",
        VisitSignal::Stale { .. } => "stale",
    }
}

fn visit_age(visit: &VisitSignal) -> Option<std::time::Duration> {
    match visit {
        VisitSignal::NeverVisited => None,
        VisitSignal::Fresh { age } | VisitSignal::Stale { age } => Some(*age),
    }
}

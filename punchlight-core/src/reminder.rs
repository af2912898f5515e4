//! Daily reminder: alarm scheduling and notification text.

use chrono::{DateTime, Days, Local, TimeZone, Utc};
use serde::Serialize;

use crate::types::{AlertTime, PunchReport};

/// Reminder repeat period in minutes (daily).
pub const ALARM_PERIOD_MINUTES: u32 = 1440;

/// Notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub title: String,
    pub message: String,
}

/// Next moment the reminder fires: today at `alert` if that is still ahead
/// of `now`, otherwise the next day.
pub fn next_alarm_time<Tz: TimeZone>(alert: AlertTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    // A DST gap can swallow the alert time on one day; look one day further.
    for offset in 0..3 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = day
            .and_time(alert.0)
            .and_local_timezone(tz.clone())
            .earliest()
        {
            if candidate > *now {
                return candidate;
            }
        }
    }
    now.clone() + chrono::Duration::minutes(i64::from(ALARM_PERIOD_MINUTES))
}

/// Build the notification from the stored report.
pub fn reminder_message(
    report: Option<&PunchReport>,
    last_update: Option<DateTime<Utc>>,
) -> Reminder {
    match report {
        Some(report) if report.issues.is_empty() => Reminder {
            title: "Punch Status: All Good!".to_string(),
            message: "No punch issues found. Great work!".to_string(),
        },
        Some(report) => Reminder {
            title: format!("Punch Issues Found ({})", report.issues.len()),
            message: report
                .issues
                .iter()
                .map(|issue| format!("{}: {}", issue.date, issue.description))
                .collect::<Vec<_>>()
                .join("\n"),
        },
        None => {
            let mut message = "Time to check your punch status!".to_string();
            if let Some(updated) = last_update {
                let local = updated.with_timezone(&Local);
                message.push_str(&format!(
                    "\nLast updated: {}",
                    local.format("%Y-%m-%d %H:%M")
                ));
            }
            Reminder {
                title: "Punch-Up Reminder".to_string(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueDate, PunchIssue};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 9, h, m, 0).unwrap()
    }

    #[test]
    fn alarm_later_today() {
        let alert: AlertTime = "17:00".parse().expect("time");
        assert_eq!(next_alarm_time(alert, &at(9, 0)), at(17, 0));
    }

    #[test]
    fn alarm_at_or_after_time_moves_to_tomorrow() {
        let alert: AlertTime = "17:00".parse().expect("time");
        let tomorrow = Utc.with_ymd_and_hms(2025, 12, 10, 17, 0, 0).unwrap();
        assert_eq!(next_alarm_time(alert, &at(17, 0)), tomorrow);
        assert_eq!(next_alarm_time(alert, &at(23, 59)), tomorrow);
    }

    #[test]
    fn all_good_message() {
        let report = PunchReport {
            timestamp: at(9, 0),
            source_url: String::new(),
            page_title: String::new(),
            issues: vec![],
        };
        let reminder = reminder_message(Some(&report), None);
        assert_eq!(reminder.title, "Punch Status: All Good!");
    }

    #[test]
    fn issues_are_listed_one_per_line() {
        let report = PunchReport {
            timestamp: at(9, 0),
            source_url: String::new(),
            page_title: String::new(),
            issues: vec![
                PunchIssue {
                    date: IssueDate::Day(NaiveDate::from_ymd_opt(2025, 12, 8).unwrap()),
                    description: "Missing punch out".to_string(),
                },
                PunchIssue {
                    date: IssueDate::Unknown,
                    description: "Unapproved time".to_string(),
                },
            ],
        };
        let reminder = reminder_message(Some(&report), None);
        assert_eq!(reminder.title, "Punch Issues Found (2)");
        assert_eq!(
            reminder.message,
            "2025-12-08: Missing punch out\nunknown: Unapproved time"
        );
    }

    #[test]
    fn default_message_mentions_last_update() {
        let plain = reminder_message(None, None);
        assert_eq!(plain.title, "Punch-Up Reminder");
        assert!(!plain.message.contains("Last updated"));

        let with_update = reminder_message(None, Some(at(8, 0)));
        assert!(with_update.message.starts_with("Time to check your punch status!"));
        assert!(with_update.message.contains("\nLast updated: "));
    }
}

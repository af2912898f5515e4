//! Browser-action icon and badge state.

use serde::Serialize;

use crate::staleness::VisitSignal;
use crate::types::PunchReport;

pub const ISSUES_COLOR: &str = "#dc3545";
pub const NEEDS_VISIT_COLOR: &str = "#ff9800";

/// What the icon should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BadgeState {
    /// No report has been stored yet.
    NoData,
    AllGood,
    Issues { count: usize },
    /// The page has not been visited for a day; overrides the report.
    NeedsVisit,
}

impl BadgeState {
    /// Combine the stored report with the visit signal. Staleness wins over
    /// whatever the report says.
    pub fn evaluate(report: Option<&PunchReport>, visit: VisitSignal) -> Self {
        if visit.is_stale() {
            return BadgeState::NeedsVisit;
        }
        Self::from_report(report)
    }

    /// Rendering based on the report alone.
    pub fn from_report(report: Option<&PunchReport>) -> Self {
        match report {
            None => BadgeState::NoData,
            Some(report) if report.issues.is_empty() => BadgeState::AllGood,
            Some(report) => BadgeState::Issues {
                count: report.issues.len(),
            },
        }
    }

    /// Badge text; empty when no badge is shown.
    pub fn text(&self) -> String {
        match self {
            BadgeState::NoData | BadgeState::AllGood => String::new(),
            BadgeState::Issues { count } => count.to_string(),
            BadgeState::NeedsVisit => "!".to_string(),
        }
    }

    /// Badge background color, when a badge is shown.
    pub fn color(&self) -> Option<&'static str> {
        match self {
            BadgeState::NoData | BadgeState::AllGood => None,
            BadgeState::Issues { .. } => Some(ISSUES_COLOR),
            BadgeState::NeedsVisit => Some(NEEDS_VISIT_COLOR),
        }
    }

    /// Icon set name: `icon`, `icon-good` or `icon-issues`.
    pub fn icon(&self) -> &'static str {
        match self {
            BadgeState::NoData => "icon",
            BadgeState::AllGood => "icon-good",
            BadgeState::Issues { .. } | BadgeState::NeedsVisit => "icon-issues",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueDate, PunchIssue};
    use chrono::Utc;
    use rstest::rstest;
    use std::time::Duration;

    fn report(issues: usize) -> PunchReport {
        PunchReport {
            timestamp: Utc::now(),
            source_url: String::new(),
            page_title: String::new(),
            issues: (0..issues)
                .map(|_| PunchIssue {
                    date: IssueDate::Unknown,
                    description: "Missing punch".to_string(),
                })
                .collect(),
        }
    }

    #[rstest]
    #[case(None, BadgeState::NoData, "", None)]
    #[case(Some(0), BadgeState::AllGood, "", None)]
    #[case(Some(4), BadgeState::Issues { count: 4 }, "4", Some(ISSUES_COLOR))]
    fn report_drives_badge(
        #[case] issues: Option<usize>,
        #[case] expected: BadgeState,
        #[case] text: &str,
        #[case] color: Option<&str>,
    ) {
        let report = issues.map(report);
        let fresh = VisitSignal::Fresh {
            age: Duration::from_secs(60),
        };
        let state = BadgeState::evaluate(report.as_ref(), fresh);
        assert_eq!(state, expected);
        assert_eq!(state.text(), text);
        assert_eq!(state.color(), color);
    }

    #[test]
    fn stale_visit_overrides_good_report() {
        let good = report(0);
        let stale = VisitSignal::Stale {
            age: Duration::from_secs(25 * 3600),
        };
        let state = BadgeState::evaluate(Some(&good), stale);
        assert_eq!(state, BadgeState::NeedsVisit);
        assert_eq!(state.text(), "!");
        assert_eq!(state.color(), Some(NEEDS_VISIT_COLOR));
        assert_eq!(state.icon(), "icon-issues");
    }

    #[test]
    fn never_visited_falls_back_to_report() {
        let state = BadgeState::evaluate(Some(&report(2)), VisitSignal::NeverVisited);
        assert_eq!(state, BadgeState::Issues { count: 2 });
    }
}

//! Domain types shared by the link, the native host and the CLI.
//!
//! Wire field names follow the browser side of the native channel
//! (`hasIssues`, `pageTitle`, ...), so every type here serializes to the
//! exact JSON the extension and the host exchange.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Punch reports
// ---------------------------------------------------------------------------

/// Day a punch issue belongs to. The scraper emits `"unknown"` when the
/// popover class carried no date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IssueDate {
    Day(NaiveDate),
    Unknown,
}

impl fmt::Display for IssueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueDate::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            IssueDate::Unknown => f.write_str("unknown"),
        }
    }
}

impl FromStr for IssueDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unknown" {
            return Ok(IssueDate::Unknown);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(IssueDate::Day)
            .map_err(|err| format!("invalid issue date '{s}': {err}"))
    }
}

impl TryFrom<String> for IssueDate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IssueDate> for String {
    fn from(date: IssueDate) -> Self {
        date.to_string()
    }
}

/// One compliance problem on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunchIssue {
    pub date: IssueDate,
    pub description: String,
}

/// Result of one scrape of the time-tracking page. Each report replaces the
/// previous one; nothing is merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchReport {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "url")]
    pub source_url: String,
    pub page_title: String,
    #[serde(default)]
    pub issues: Vec<PunchIssue>,
}

impl PunchReport {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Light commands and replies
// ---------------------------------------------------------------------------

/// Outbound command on the native channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LightCommand {
    UpdateLight {
        #[serde(rename = "hasIssues")]
        has_issues: bool,
    },
    SetColor {
        hue: f64,
        saturation: f64,
        value: f64,
    },
    TurnOff,
    Discover,
}

impl LightCommand {
    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            LightCommand::UpdateLight { .. } => "update_light",
            LightCommand::SetColor { .. } => "set_color",
            LightCommand::TurnOff => "turn_off",
            LightCommand::Discover => "discover",
        }
    }
}

/// `status` field of an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    #[serde(other)]
    Unknown,
}

/// Inbound acknowledgment from the native host. Replies are not correlated
/// with the command that caused them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any extra fields (`action`, `color`, `mode`, `host`, `alias`, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl DeviceReply {
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: None,
            details: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
            details: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}

/// HSV color in the ranges the bulb accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: u16,
    pub saturation: u8,
    pub value: u8,
}

impl Hsv {
    pub const fn new(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }
}

impl fmt::Display for Hsv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HSV({}, {}, {})", self.hue, self.saturation, self.value)
    }
}

impl From<Hsv> for Value {
    fn from(hsv: Hsv) -> Self {
        serde_json::json!({
            "hue": hsv.hue,
            "saturation": hsv.saturation,
            "value": hsv.value,
        })
    }
}

// ---------------------------------------------------------------------------
// Settings values
// ---------------------------------------------------------------------------

/// Daily reminder time, stored as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlertTime(pub NaiveTime);

impl Default for AlertTime {
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(17, 0, 0).expect("17:00:00 is a valid time"))
    }
}

impl fmt::Display for AlertTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for AlertTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|err| format!("invalid alert time '{s}' (expected HH:MM): {err}"))
    }
}

impl TryFrom<String> for AlertTime {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AlertTime> for String {
    fn from(time: AlertTime) -> Self {
        time.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Light colors for the two punch states.
//!
//! No issues is a fixed soft green. Issues get more urgent through the work
//! week: from Monday 17:00 until Friday 09:00 the hue slides from yellow to
//! red, and every other hour of the week is full red.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};

use punchlight_core::Hsv;

pub const NO_ISSUES_COLOR: Hsv = Hsv::new(105, 60, 40);
pub const ALERT_RED: Hsv = Hsv::new(0, 100, 100);

const GRADIENT_START_HUE: f64 = 60.0;

/// Color shown while there are punch issues, for local wall-clock `now`.
pub fn warning_color(now: NaiveDateTime) -> Hsv {
    let days_since_monday = i64::from(now.weekday().num_days_from_monday());
    let monday_5pm = NaiveDateTime::new(now.date(), five_pm()) - Duration::days(days_since_monday);
    let friday_9am = monday_5pm + Duration::days(4) - Duration::hours(8);

    if now < monday_5pm || now >= friday_9am {
        return ALERT_RED;
    }

    let total = (friday_9am - monday_5pm).num_milliseconds() as f64;
    let elapsed = (now - monday_5pm).num_milliseconds() as f64;
    let progress = elapsed / total;
    let hue = (GRADIENT_START_HUE * (1.0 - progress)) as u16;
    Hsv::new(hue, 100, 100)
}

fn five_pm() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("17:00:00 is a valid time")
}

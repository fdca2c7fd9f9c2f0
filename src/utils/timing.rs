//! Wall-clock access and time-related prompt substitutions.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Captures;
use serde::Serialize;
use crate::utils::prompt_processing::DATE_PLACEHOLDER_RE;

/// Source of the current time. Injected so that temporal substitutions are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse an IANA timezone name. Missing or unknown names fall back to UTC.
pub fn user_timezone(name: Option<&str>) -> (Tz, String) {
    match name.and_then(|n| n.parse::<Tz>().ok()) {
        Some(tz) => (tz, tz.name().to_string()),
        None => (Tz::UTC, "UTC".to_string()),
    }
}

/// The current time as seen by the user. Serialized in field order.
#[derive(Debug, Clone, Serialize)]
pub struct TemporalContextPayload {
    pub utc_date_time: String,
    pub local_time: String,
    pub user: UserTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTime {
    pub timezone: String,
    pub weekday: String,
}

impl TemporalContextPayload {
    pub fn new(now: DateTime<Utc>, timezone: Option<&str>) -> Self {
        let (tz, tz_name) = user_timezone(timezone);
        let local = now.with_timezone(&tz);
        Self {
            utc_date_time: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            local_time: local.format("%H:%M").to_string(),
            user: UserTime {
                timezone: tz_name,
                weekday: local.format("%A").to_string(),
            },
        }
    }
}

/// Compact JSON describing the current time as seen by the user.
pub fn temporal_context(now: DateTime<Utc>, timezone: Option<&str>) -> String {
    // plain strings only, serialization cannot fail
    serde_json::to_string(&TemporalContextPayload::new(now, timezone)).unwrap_or_default()
}

/// The calendar date of `now` in the given timezone.
pub fn local_date(now: DateTime<Utc>, timezone: Option<&str>) -> NaiveDate {
    let (tz, _) = user_timezone(timezone);
    now.with_timezone(&tz).date_naive()
}

/// Offsets beyond this many units are rejected before reaching chrono, whose constructors panic on overflow.
const MAX_DATE_OFFSET: i64 = 100_000;

fn shift_date(today: NaiveDate, amount: i64, unit: &str) -> Option<NaiveDate> {
    if amount.abs() > MAX_DATE_OFFSET {
        return None;
    }
    let months = |n: i64| u32::try_from(n.unsigned_abs()).ok().map(Months::new);
    match unit {
        "d" => today.checked_add_signed(Duration::days(amount)),
        "w" => today.checked_add_signed(Duration::weeks(amount)),
        "m" | "y" => {
            let amount = if unit == "y" { amount.checked_mul(12)? } else { amount };
            if amount >= 0 {
                today.checked_add_months(months(amount)?)
            } else {
                today.checked_sub_months(months(amount)?)
            }
        }
        _ => None,
    }
}

/// Resolve every `{{date}}` / `{{date:<offset>}}` placeholder against `today`, formatted as `YYYY-MM-DD`.
///
/// Placeholders whose offset overflows the calendar are left untouched.
pub fn replace_date_placeholders(text: &str, today: NaiveDate) -> String {
    DATE_PLACEHOLDER_RE
        .replace_all(text, |captures: &Captures| {
            let date = match (captures.get(1), captures.get(2)) {
                (Some(amount), Some(unit)) => amount
                    .as_str()
                    .parse::<i64>()
                    .ok()
                    .and_then(|amount| shift_date(today, amount, unit.as_str())),
                _ => Some(today),
            };
            date.map_or_else(|| captures[0].to_string(), |d| d.format("%Y-%m-%d").to_string())
        })
        .into_owned()
}

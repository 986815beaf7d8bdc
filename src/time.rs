//! # Time Axis Decoding
//!
//! Decodes numeric CF time coordinates (`"hours since 1900-01-01 00:00:0.0"`) into UTC
//! timestamps. Only Gregorian-compatible calendars are supported.

use crate::error::{GridError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time units allowed before `since` in a CF units string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert the time unit to a multiplier for seconds
    pub fn to_seconds_multiplier(&self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1e-3,
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }

    fn parse(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "milliseconds" | "millisecond" | "msecs" | "msec" | "ms" => Some(TimeUnit::Milliseconds),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "days" | "day" | "d" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// Parsed `"<unit> since <reference>"` string.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: DateTime<Utc>,
}

impl TimeUnits {
    pub fn parse(units: &str) -> Result<Self> {
        let err = |reason: &str| GridError::TimeUnits {
            units: units.to_string(),
            reason: reason.to_string(),
        };

        let lower = units.to_ascii_lowercase();
        let pos = lower
            .find(" since ")
            .ok_or_else(|| err("missing 'since' keyword"))?;
        let unit = TimeUnit::parse(units[..pos].trim()).ok_or_else(|| err("unknown time unit"))?;
        let reference = parse_reference(units[pos + " since ".len()..].trim())
            .ok_or_else(|| err("unparseable reference date"))?;

        Ok(TimeUnits { unit, reference })
    }

    pub fn decode(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let millis = (value * self.unit.to_seconds_multiplier() * 1000.0).round();
        if millis.abs() > i64::MAX as f64 {
            return None;
        }
        let delta = TimeDelta::try_milliseconds(millis as i64)?;
        self.reference.checked_add_signed(delta)
    }
}

/// Decodes raw time coordinates using their `units` and optional `calendar` attributes.
pub fn decode_times(values: &[f64], units: &str, calendar: Option<&str>) -> Result<Vec<DateTime<Utc>>> {
    if let Some(cal) = calendar {
        match cal.to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => {}
            other => {
                return Err(GridError::TimeUnits {
                    units: units.to_string(),
                    reason: format!("unsupported calendar '{}'", other),
                });
            }
        }
    }

    let parsed = TimeUnits::parse(units)?;
    values
        .iter()
        .map(|v| {
            parsed.decode(*v).ok_or_else(|| GridError::TimeUnits {
                units: units.to_string(),
                reason: format!("value {} is out of range", v),
            })
        })
        .collect()
}

fn parse_reference(text: &str) -> Option<DateTime<Utc>> {
    // ISO 8601 "dateTtime" separator
    let separator = text.char_indices().find(|(i, c)| {
        (*c == 'T' || *c == 't')
            && text[..*i].ends_with(|p: char| p.is_ascii_digit())
            && text[i + 1..].starts_with(|n: char| n.is_ascii_digit())
    });
    let normalized = match separator {
        Some((i, _)) => format!("{} {}", &text[..i], &text[i + 1..]),
        None => text.to_string(),
    };
    let normalized = normalized.trim_end_matches(['Z', 'z']);
    let mut tokens = normalized.split_whitespace();

    let date = parse_date(tokens.next()?)?;
    let mut time = NaiveTime::MIN;
    let mut offset = FixedOffset::east_opt(0)?;

    for token in tokens {
        if token.eq_ignore_ascii_case("utc") || token.eq_ignore_ascii_case("gmt") {
            continue;
        }
        if token.starts_with('+') || token.starts_with('-') {
            offset = parse_offset(token)?;
        } else if let Some(t) = parse_time(token) {
            time = t;
        } else {
            return None;
        }
    }

    let naive = date.and_time(time);
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    let mut parts = token.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next().map_or(Some(1), |m| m.parse::<u32>().ok())?;
    let day = parts.next().map_or(Some(1), |d| d.parse::<u32>().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    let mut parts = token.split(':');
    let hour = parts.next()?.parse::<u32>().ok()?;
    let minute = parts.next().map_or(Some(0), |m| m.parse::<u32>().ok())?;
    let seconds = parts.next().map_or(Some(0.0), |s| s.parse::<f64>().ok())?;
    if parts.next().is_some() || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc() as u32;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    NaiveTime::from_hms_nano_opt(hour, minute, whole, nanos.min(999_999_999))
}

fn parse_offset(token: &str) -> Option<FixedOffset> {
    let sign = if token.starts_with('-') { -1 } else { 1 };
    let body = &token[1..];
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if body.len() == 4 => (body[..2].parse::<i32>().ok()?, body[2..].parse::<i32>().ok()?),
        None => (body.parse::<i32>().ok()?, 0),
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

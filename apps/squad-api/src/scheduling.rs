//! Date/time handling for session scheduling.
//!
//! Sessions are persisted in UTC and localized only at the presentation
//! boundary. A user's timezone preference is a fixed UTC offset in minutes
//! (a multiple of 15 within [-720, 840]), so conversion is plain
//! arithmetic, lossless and invertible.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Sentinel for "no player cap" in `gamers_required`.
pub const UNLIMITED_GAMERS: i32 = -1;

/// Smallest and largest UTC offsets in use (UTC-12:00 .. UTC+14:00).
pub const MIN_OFFSET_MINUTES: i32 = -720;
pub const MAX_OFFSET_MINUTES: i32 = 840;

/// Combine a calendar day with a time-of-day into one timestamp.
pub fn combine_date_and_time(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// Interpret a wall-clock timestamp in the given offset and convert to UTC.
pub fn local_to_utc(local: NaiveDateTime, offset_minutes: i32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::minutes(offset_minutes as i64)))
}

/// Shift a UTC instant into the wall-clock time of the given offset.
pub fn utc_to_local(utc: DateTime<Utc>, offset_minutes: i32) -> NaiveDateTime {
    utc.naive_utc() + Duration::minutes(offset_minutes as i64)
}

/// Round up to the next quarter-hour mark. Sub-minute precision is dropped
/// first, so a timestamp already on a mark is left unchanged.
pub fn round_up_to_quarter_hour(dt: NaiveDateTime) -> NaiveDateTime {
    let dt = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt);
    let rem = dt.minute() % 15;
    if rem == 0 {
        dt
    } else {
        dt + Duration::minutes((15 - rem) as i64)
    }
}

/// Default suggested schedule: one hour out in the viewer's local time,
/// rounded up to the next quarter hour.
pub fn default_scheduled_time(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDateTime {
    round_up_to_quarter_hour(utc_to_local(now + Duration::hours(1), offset_minutes))
}

/// Format a time-of-day as `H:MM` (no leading zero on the hour).
pub fn format_time_of_day(time: NaiveTime) -> String {
    format!("{}:{:02}", time.hour(), time.minute())
}

/// Parse a `H:MM` (or `H:MM:SS`) time-of-day string.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// All 96 quarter-hour marks across a day, in order, formatted `H:MM`.
pub fn time_slots() -> Vec<String> {
    (0..24)
        .flat_map(|hour| {
            [0, 15, 30, 45]
                .into_iter()
                .map(move |minute| format!("{hour}:{minute:02}"))
        })
        .collect()
}

/// One selectable player-count option.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GamersRequiredOption {
    pub value: i32,
    pub label: String,
}

/// Selectable player counts: 2..=24, then 32 and 64, then "Unlimited".
pub fn gamers_required_options() -> Vec<GamersRequiredOption> {
    let mut options: Vec<GamersRequiredOption> = (2..=24)
        .chain([32, 64])
        .map(|n| GamersRequiredOption {
            value: n,
            label: n.to_string(),
        })
        .collect();
    options.push(GamersRequiredOption {
        value: UNLIMITED_GAMERS,
        label: "Unlimited".to_string(),
    });
    options
}

/// True when `value` is a usable player cap.
pub fn valid_gamers_required(value: i32) -> bool {
    value == UNLIMITED_GAMERS || value >= 2
}

/// True when `minutes` is a storable timezone preference.
pub fn valid_offset_minutes(minutes: i32) -> bool {
    (MIN_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) && minutes % 15 == 0
}

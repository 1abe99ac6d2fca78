//! Date/time codecs around the PostgreSQL 2000-01-01 epoch.
//!
//! Binary dates are day offsets from 2000-01-01; binary timestamps are
//! microseconds from 2000-01-01 00:00:00. Values outside the calendar
//! range of year 1..=9999 decode to strings (`infinity`, `-infinity`,
//! or an ISO rendering with a `BC` suffix), matching what the text
//! protocol would produce.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_i32, read_i64, read_text};
use crate::session::SessionState;
use crate::value::Value;

/// Microseconds per second.
pub const USECS_PER_SEC: i64 = 1_000_000;

/// Microseconds per day.
pub const USECS_PER_DAY: i64 = 86_400_000_000;

/// Days from 1970-01-01 to 2000-01-01.
const UNIX_TO_PG_DAYS: i64 = 10_957;

/// Microseconds from 1970-01-01 to 2000-01-01.
const UNIX_TO_PG_USECS: i64 = UNIX_TO_PG_DAYS * USECS_PER_DAY;

/// PostgreSQL epoch: 2000-01-01.
pub const PG_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

/// An interval value: the three wire components kept apart, since months
/// and days have no fixed microsecond width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    /// Whole months.
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Microseconds within the day component.
    pub usecs: i64,
}

// Proleptic Gregorian calendar date for a day offset from 2000-01-01.
// Works over the full i64 range, unlike chrono's bounded NaiveDate.
fn civil_from_pg_days(pg_days: i64) -> (i64, u32, u32) {
    let z = pg_days + UNIX_TO_PG_DAYS + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn format_date_parts(year: i64, month: u32, day: u32) -> String {
    if year < 1 {
        format!("{:04}-{:02}-{:02} BC", 1 - year, month, day)
    } else {
        format!("{year:04}-{month:02}-{day:02}")
    }
}

fn format_time_usecs(usecs: i64) -> String {
    let secs = usecs.div_euclid(USECS_PER_SEC);
    let micros = usecs.rem_euclid(USECS_PER_SEC);
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if micros == 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        let frac = format!("{micros:06}");
        format!("{h:02}:{m:02}:{s:02}.{}", frac.trim_end_matches('0'))
    }
}

fn time_from_usecs(usecs: i64) -> Result<NaiveTime> {
    if !(0..USECS_PER_DAY).contains(&usecs) {
        return Err(Error::Decode(format!("time out of range: {usecs} µs")));
    }
    let secs = (usecs / USECS_PER_SEC) as u32;
    let nanos = ((usecs % USECS_PER_SEC) * 1000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .ok_or_else(|| Error::Decode(format!("time out of range: {usecs} µs")))
}

// === date ===

/// Decode date binary format (i32 day offset).
pub fn date_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid date length {}", bytes.len())))?;
    let pg_days = i32::from_be_bytes(arr);
    Ok(match pg_days {
        i32::MAX => Value::Text("infinity".into()),
        i32::MIN => Value::Text("-infinity".into()),
        _ => {
            let (year, month, day) = civil_from_pg_days(i64::from(pg_days));
            match in_calendar_range(year) {
                Some(y) => match NaiveDate::from_ymd_opt(y, month, day) {
                    Some(date) => Value::Date(date),
                    None => Value::Text(format_date_parts(year, month, day)),
                },
                None => Value::Text(format_date_parts(year, month, day)),
            }
        }
    })
}

/// Decode date text format.
pub fn date_text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    if !session.iso_dates() {
        return Ok(Value::Text(s.into()));
    }
    // infinity and BC dates stay textual
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => Ok(Value::Date(date)),
        Err(_) => Ok(Value::Text(s.into())),
    }
}

fn in_calendar_range(year: i64) -> Option<i32> {
    if (1..=9999).contains(&year) {
        Some(year as i32)
    } else {
        None
    }
}

// === time ===

/// Decode time binary format (i64 microseconds since midnight).
pub fn time_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid time length {}", bytes.len())))?;
    Ok(Value::Time(time_from_usecs(i64::from_be_bytes(arr))?))
}

/// Decode time text format.
///
/// `24:00:00` is a valid PostgreSQL time literal but has no counterpart
/// here; it is rejected rather than silently wrapped to midnight.
pub fn time_text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    if !session.iso_dates() {
        return Ok(Value::Text(s.into()));
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .map(Value::Time)
        .map_err(|e| Error::Decode(format!("invalid time {s:?}: {e}")))
}

// === timetz ===

/// Decode timetz binary format (i64 microseconds + i32 seconds west).
pub fn timetz_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    if bytes.len() != 12 {
        return Err(Error::Decode(format!(
            "invalid timetz length {}",
            bytes.len()
        )));
    }
    let (usecs, rest) = read_i64(bytes)?;
    let (zone_west, _) = read_i32(rest)?;
    let offset = FixedOffset::west_opt(zone_west)
        .ok_or_else(|| Error::Decode(format!("invalid timetz offset {zone_west}")))?;
    Ok(Value::TimeTz(time_from_usecs(usecs)?, offset))
}

/// Decode timetz text format.
pub fn timetz_text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    if !session.iso_dates() {
        return Ok(Value::Text(s.into()));
    }
    let split = s
        .rfind(['+', '-'])
        .filter(|&pos| pos > 0)
        .ok_or_else(|| Error::Decode(format!("invalid timetz {s:?}")))?;
    let time = NaiveTime::parse_from_str(&s[..split], "%H:%M:%S%.f")
        .map_err(|e| Error::Decode(format!("invalid timetz {s:?}: {e}")))?;
    let offset = parse_offset(&s[split..])
        .ok_or_else(|| Error::Decode(format!("invalid timetz offset in {s:?}")))?;
    Ok(Value::TimeTz(time, offset))
}

// === timestamp ===

/// Decode timestamp binary format (i64 microseconds since the epoch).
pub fn timestamp_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::Decode(format!("invalid timestamp length {}", bytes.len()))
    })?;
    let usecs = i64::from_be_bytes(arr);
    Ok(match usecs {
        i64::MAX => Value::Text("infinity".into()),
        i64::MIN => Value::Text("-infinity".into()),
        _ => {
            // Carry the time component forward for values before the epoch.
            let pg_days = usecs.div_euclid(USECS_PER_DAY);
            let day_usecs = usecs.rem_euclid(USECS_PER_DAY);
            let (year, month, day) = civil_from_pg_days(pg_days);
            let date = in_calendar_range(year)
                .and_then(|y| NaiveDate::from_ymd_opt(y, month, day));
            match date {
                Some(date) => match time_from_usecs(day_usecs) {
                    Ok(time) => Value::Timestamp(date.and_time(time)),
                    Err(_) => Value::Text(format!(
                        "{} {}",
                        format_date_parts(year, month, day),
                        format_time_usecs(day_usecs)
                    )),
                },
                None => Value::Text(format!(
                    "{} {}",
                    format_date_parts(year, month, day),
                    format_time_usecs(day_usecs)
                )),
            }
        }
    })
}

/// Decode timestamp text format.
pub fn timestamp_text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    if !session.iso_dates() {
        return Ok(Value::Text(s.into()));
    }
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(dt) => Ok(Value::Timestamp(dt)),
        Err(_) => Ok(Value::Text(s.into())),
    }
}

// === timestamptz ===

/// Decode timestamptz binary format (i64 UTC microseconds since the epoch).
///
/// When the session time zone resolved to an IANA zone and the instant
/// lands inside year 1..=9999 there, the value carries that zone's
/// offset. Otherwise UTC is used; instants unrepresentable even in UTC
/// decode to an ISO string.
pub fn timestamptz_binary(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::Decode(format!("invalid timestamptz length {}", bytes.len()))
    })?;
    let usecs = i64::from_be_bytes(arr);
    Ok(match usecs {
        i64::MAX => Value::Text("infinity".into()),
        i64::MIN => Value::Text("-infinity".into()),
        _ => decode_tz_instant(session, usecs),
    })
}

fn decode_tz_instant(session: &SessionState, usecs: i64) -> Value {
    let utc: Option<DateTime<Utc>> = usecs
        .checked_add(UNIX_TO_PG_USECS)
        .and_then(DateTime::from_timestamp_micros);

    if let Some(utc) = utc {
        if let Some(tz) = session.timezone() {
            let local = utc.with_timezone(&tz);
            if (1..=9999).contains(&local.year()) {
                return Value::TimestampTz(local.fixed_offset());
            }
        }
        if (1..=9999).contains(&utc.year()) {
            return Value::TimestampTz(utc.fixed_offset());
        }
    }

    // Out of calendar range: render the UTC instant as an ISO string.
    let pg_days = usecs.div_euclid(USECS_PER_DAY);
    let day_usecs = usecs.rem_euclid(USECS_PER_DAY);
    let (year, month, day) = civil_from_pg_days(pg_days);
    Value::Text(format!(
        "{} {}+00",
        format_date_parts(year, month, day),
        format_time_usecs(day_usecs)
    ))
}

/// Decode timestamptz text format (ISO rendering with a fixed offset).
pub fn timestamptz_text(session: &SessionState, bytes: &[u8]) -> Result<Value> {
    let s = read_text(bytes)?;
    if !session.iso_dates() {
        return Ok(Value::Text(s.into()));
    }
    let Some(split) = s.rfind(['+', '-']).filter(|&pos| pos > 10) else {
        return Ok(Value::Text(s.into()));
    };
    let naive = match NaiveDateTime::parse_from_str(&s[..split], "%Y-%m-%d %H:%M:%S%.f") {
        Ok(dt) => dt,
        Err(_) => return Ok(Value::Text(s.into())),
    };
    let Some(offset) = parse_offset(&s[split..]) else {
        return Ok(Value::Text(s.into()));
    };
    match naive.and_local_timezone(offset).single() {
        Some(dt) => Ok(Value::TimestampTz(dt)),
        None => Ok(Value::Text(s.into())),
    }
}

// "±HH", "±HH:MM" or "±HH:MM:SS"
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let mut parts = rest.splitn(3, ':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let seconds: i32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}

// === interval ===

/// Decode interval binary format (i64 microseconds, i32 days, i32 months).
pub fn interval_binary(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    if bytes.len() != 16 {
        return Err(Error::Decode(format!(
            "invalid interval length {}",
            bytes.len()
        )));
    }
    let (usecs, rest) = read_i64(bytes)?;
    let (days, rest) = read_i32(rest)?;
    let (months, _) = read_i32(rest)?;
    Ok(Value::Interval(Interval {
        months,
        days,
        usecs,
    }))
}

/// Decode interval text format.
///
/// Interval text depends on IntervalStyle and mixes unit words; the raw
/// text is returned unchanged.
pub fn interval_text(_session: &SessionState, bytes: &[u8]) -> Result<Value> {
    Ok(Value::Text(read_text(bytes)?.into()))
}

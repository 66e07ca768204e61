//! Time-range resolution.
//!
//! Converts a user-facing [`TimeSpec`] into a [`ResolvedWindow`]: concrete UTC
//! bounds plus an aggregation [`Bucket`]. Calendar boundaries (midnight, Monday,
//! first of month) are computed in the caller's timezone and stored in UTC.
//!
//! Which buckets a window may use depends only on how many days it spans; see
//! [`permitted_buckets`].

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDate, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

const MAX_BUCKET_POINTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Minute,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Bucket {
    pub const ALL: [Bucket; 9] = [
        Bucket::Minute,
        Bucket::FiveMinutes,
        Bucket::TenMinutes,
        Bucket::FifteenMinutes,
        Bucket::Hour,
        Bucket::Day,
        Bucket::Week,
        Bucket::Month,
        Bucket::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Minute => "minute",
            Bucket::FiveMinutes => "five_minutes",
            Bucket::TenMinutes => "ten_minutes",
            Bucket::FifteenMinutes => "fifteen_minutes",
            Bucket::Hour => "hour",
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Year => "year",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == trimmed)
            .ok_or_else(|| QueryError::validation("bucket", format!("unknown bucket: {trimmed}")))
    }

    /// Width in minutes for sub-day buckets; calendar buckets return `None`.
    fn fixed_minutes(&self) -> Option<u32> {
        match self {
            Bucket::Minute => Some(1),
            Bucket::FiveMinutes => Some(5),
            Bucket::TenMinutes => Some(10),
            Bucket::FifteenMinutes => Some(15),
            Bucket::Hour => Some(60),
            Bucket::Day | Bucket::Week | Bucket::Month | Bucket::Year => None,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-selected time specification.
///
/// `PastMinutes` offsets count backwards from "now": `{ start: 30, end: 0 }`
/// is the last half hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeSpec {
    Day { date: NaiveDate },
    Range { start: NaiveDate, end: NaiveDate },
    Week { date: NaiveDate },
    Month { date: NaiveDate },
    Year { date: NaiveDate },
    AllTime,
    PastMinutes { start: u32, end: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedWindow {
    start: Option<DateTime<Utc>>,
    end: DateTime<Utc>,
    bucket: Bucket,
    span_days: Option<u32>,
    timezone: String,
}

impl ResolvedWindow {
    /// Inclusive lower bound; `None` for all-time windows.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// Calendar days covered; `None` when the window has no lower bound.
    pub fn span_days(&self) -> Option<u32> {
        self.span_days
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && ts < self.end
    }

    pub fn permitted_buckets(&self) -> Vec<Bucket> {
        permitted_buckets(self.span_days)
    }

    /// Re-bucket the window. Buckets outside [`permitted_buckets`] are
    /// rejected, never coerced.
    pub fn with_bucket(mut self, bucket: Bucket) -> Result<Self, QueryError> {
        let permitted = self.permitted_buckets();
        if !permitted.contains(&bucket) {
            let span = match self.span_days {
                Some(days) => format!("a {days}-day window"),
                None => "an all-time window".to_string(),
            };
            let allowed: Vec<&str> = permitted.iter().map(Bucket::as_str).collect();
            return Err(QueryError::validation(
                "bucket",
                format!(
                    "{bucket} is not permitted for {span} (allowed: {})",
                    allowed.join(", ")
                ),
            ));
        }
        self.bucket = bucket;
        Ok(self)
    }

    /// The immediately preceding window of the same length and bucket.
    pub fn previous_period(&self) -> Option<ResolvedWindow> {
        let start = self.start?;
        let length = self.end - start;
        Some(ResolvedWindow {
            start: Some(start - length),
            end: start,
            bucket: self.bucket,
            span_days: self.span_days,
            timezone: self.timezone.clone(),
        })
    }

    /// Start instant of every bucket overlapping the window, for zero-filled
    /// series and axis labels. Calendar buckets align to local midnight.
    pub fn bucket_starts(&self) -> Result<Vec<DateTime<Utc>>, QueryError> {
        let start = self.start.ok_or_else(|| {
            QueryError::validation("window", "all-time windows have no bucket boundaries")
        })?;
        let tz = parse_timezone(&self.timezone)?;
        let local = start.with_timezone(&tz).naive_local();
        let mut out = Vec::new();

        if let Some(width) = self.bucket.fixed_minutes() {
            let minute_of_day = local.hour() * 60 + local.minute();
            let floored = minute_of_day - minute_of_day % width;
            let first = local
                .date()
                .and_hms_opt(floored / 60, floored % 60, 0)
                .and_then(|naive| match tz.from_local_datetime(&naive) {
                    LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                    LocalResult::Ambiguous(a, b) => Some(a.min(b).with_timezone(&Utc)),
                    LocalResult::None => None,
                })
                .unwrap_or(start);
            let step = Duration::minutes(i64::from(width));
            let mut cursor = first;
            while cursor < self.end {
                push_bounded(&mut out, cursor)?;
                cursor += step;
            }
            return Ok(out);
        }

        let date = local.date();
        let mut cursor = match self.bucket {
            Bucket::Week => monday_of(date),
            Bucket::Month => first_of_month(date)?,
            Bucket::Year => first_of_year(date)?,
            _ => date,
        };
        loop {
            let boundary = local_midnight_utc(tz, cursor)?;
            if boundary >= self.end {
                break;
            }
            push_bounded(&mut out, boundary)?;
            cursor = match self.bucket {
                Bucket::Week => add_days(cursor, 7)?,
                Bucket::Month => add_months(cursor, 1)?,
                Bucket::Year => add_months(cursor, 12)?,
                _ => add_days(cursor, 1)?,
            };
        }
        Ok(out)
    }
}

fn push_bounded(out: &mut Vec<DateTime<Utc>>, ts: DateTime<Utc>) -> Result<(), QueryError> {
    if out.len() >= MAX_BUCKET_POINTS {
        return Err(QueryError::validation(
            "bucket",
            format!("window produces more than {MAX_BUCKET_POINTS} buckets"),
        ));
    }
    out.push(ts);
    Ok(())
}

/// Buckets a window of `span_days` may be aggregated by, finest first.
///
/// Single-day windows get sub-hour resolution; longer windows accumulate
/// coarser buckets as they grow. `None` (no lower bound) only permits
/// calendar buckets.
pub fn permitted_buckets(span_days: Option<u32>) -> Vec<Bucket> {
    let Some(days) = span_days else {
        return vec![Bucket::Day, Bucket::Week, Bucket::Month, Bucket::Year];
    };
    if days <= 1 {
        return vec![
            Bucket::Minute,
            Bucket::FiveMinutes,
            Bucket::FifteenMinutes,
            Bucket::Hour,
        ];
    }

    let mut buckets = Vec::new();
    if days <= 7 {
        buckets.push(Bucket::FiveMinutes);
    }
    if days <= 14 {
        buckets.push(Bucket::TenMinutes);
        buckets.push(Bucket::FifteenMinutes);
    }
    if days <= 30 {
        buckets.push(Bucket::Hour);
    }
    buckets.push(Bucket::Day);
    if days >= 28 {
        buckets.push(Bucket::Week);
    }
    if days >= 60 {
        buckets.push(Bucket::Month);
    }
    if days >= 365 {
        buckets.push(Bucket::Year);
    }
    buckets
}

/// Default bucket: ≤2 days → hour, ≤60 → day, otherwise month.
pub fn recommended_bucket(span_days: Option<u32>) -> Bucket {
    match span_days {
        Some(days) if days <= 2 => Bucket::Hour,
        Some(days) if days <= 60 => Bucket::Day,
        _ => Bucket::Month,
    }
}

pub fn parse_timezone(raw: &str) -> Result<Tz, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueryError::validation(
            "timezone",
            "timezone cannot be empty when provided",
        ));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| QueryError::validation("timezone", format!("unknown timezone: {trimmed}")))
}

/// First instant of `date` in `tz`, as UTC.
///
/// An ambiguous midnight picks the earlier instant; a midnight skipped by a
/// DST jump resolves to the first local hour that exists.
pub fn local_midnight_utc(tz: Tz, date: NaiveDate) -> Result<DateTime<Utc>, QueryError> {
    for hour in 0..=3 {
        let naive = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| QueryError::validation("date", "invalid date boundary"))?;
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(a, b) => return Ok(a.min(b).with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    Err(QueryError::validation(
        "timezone",
        format!("no local midnight for {date} in {}", tz.name()),
    ))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, QueryError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| QueryError::validation("date", "date out of range"))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, QueryError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| QueryError::validation("date", "date out of range"))
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, QueryError> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .ok_or_else(|| QueryError::validation("date", "invalid month"))
}

fn first_of_year(date: NaiveDate) -> Result<NaiveDate, QueryError> {
    NaiveDate::from_ymd_opt(date.year(), 1, 1)
        .ok_or_else(|| QueryError::validation("date", "invalid year"))
}

fn day_count(start: NaiveDate, end_exclusive: NaiveDate) -> u32 {
    u32::try_from((end_exclusive - start).num_days()).unwrap_or(u32::MAX)
}

/// Resolve against the current wall clock.
pub fn resolve(spec: &TimeSpec, zone: Tz) -> Result<ResolvedWindow, QueryError> {
    resolve_at(spec, zone, Utc::now())
}

/// Resolve and immediately apply a caller-chosen bucket.
pub fn resolve_with_bucket(
    spec: &TimeSpec,
    zone: Tz,
    bucket: Option<Bucket>,
) -> Result<ResolvedWindow, QueryError> {
    let window = resolve(spec, zone)?;
    match bucket {
        Some(bucket) => window.with_bucket(bucket),
        None => Ok(window),
    }
}

/// Deterministic resolution: same spec, zone and `now` give the same window.
pub fn resolve_at(
    spec: &TimeSpec,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<ResolvedWindow, QueryError> {
    let today = now.with_timezone(&zone).date_naive();

    let (start, end, span_days) = match spec {
        TimeSpec::Day { date } => {
            let start = local_midnight_utc(zone, *date)?;
            let end = if *date == today {
                now
            } else {
                local_midnight_utc(zone, add_days(*date, 1)?)?
            };
            (Some(start), end, Some(1))
        }
        TimeSpec::Range { start, end } => {
            if end < start {
                return Err(QueryError::validation(
                    "end",
                    "end date must be on or after start date",
                ));
            }
            let after_end = add_days(*end, 1)?;
            let start_utc = local_midnight_utc(zone, *start)?;
            let end_utc = if *end == today {
                now
            } else {
                local_midnight_utc(zone, after_end)?
            };
            (Some(start_utc), end_utc, Some(day_count(*start, after_end)))
        }
        TimeSpec::Week { date } => {
            let monday = monday_of(*date);
            (
                Some(local_midnight_utc(zone, monday)?),
                local_midnight_utc(zone, add_days(monday, 7)?)?,
                Some(7),
            )
        }
        TimeSpec::Month { date } => {
            let first = first_of_month(*date)?;
            let next = add_months(first, 1)?;
            (
                Some(local_midnight_utc(zone, first)?),
                local_midnight_utc(zone, next)?,
                Some(day_count(first, next)),
            )
        }
        TimeSpec::Year { date } => {
            let first = first_of_year(*date)?;
            let next = add_months(first, 12)?;
            (
                Some(local_midnight_utc(zone, first)?),
                local_midnight_utc(zone, next)?,
                Some(day_count(first, next)),
            )
        }
        TimeSpec::AllTime => (None, now, None),
        TimeSpec::PastMinutes { start, end } => {
            if start < end {
                return Err(QueryError::validation(
                    "start",
                    "past-minutes start offset must be at least the end offset",
                ));
            }
            let minutes = start - end;
            (
                Some(now - Duration::minutes(i64::from(*start))),
                now - Duration::minutes(i64::from(*end)),
                Some(minutes.div_ceil(1440).max(1)),
            )
        }
    };

    Ok(ResolvedWindow {
        start,
        end,
        bucket: recommended_bucket(span_days),
        span_days,
        timezone: zone.name().to_string(),
    })
}

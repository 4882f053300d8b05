//! Timestamp formats found at the start of server log lines.
//!
//! Tried in this order, first match wins:
//! 1. ISO-8601 with an explicit offset: `2014-11-03T18:28:32.450-0500`
//! 2. ISO-8601 in UTC: `2014-11-03T18:28:32.450Z`
//! 3. ctime-like with milliseconds: `Mon Feb 23 03:20:19.670`
//! 4. ctime-like without milliseconds: `Mon Feb 23 03:20:19`
//!
//! The ctime-like formats carry no year. They are kept as a
//! [`YearlessTimestamp`] and never resolved here; callers that know the year
//! (from a file date, for instance) can call [`YearlessTimestamp::resolve`].

use chrono::{
    DateTime, Datelike, FixedOffset, Month, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Timelike, Utc, Weekday,
};
use nom::{
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, digit1, one_of, space1},
    combinator::{map, map_opt, map_res, opt},
    sequence::preceded,
    IResult, Parser,
};
use serde::{Serialize, Serializer};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Point in time of a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    /// ISO-8601 timestamp with a known offset.
    Absolute(DateTime<FixedOffset>),
    /// ctime-like timestamp without a year.
    YearLess(YearlessTimestamp),
}

impl Timestamp {
    /// Returns the UTC instant, if the timestamp carries a year.
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Absolute(dt) => Some(dt.with_timezone(&Utc)),
            Self::YearLess(_) => None,
        }
    }

    /// Returns `true` for ctime-like timestamps that need a year hint.
    #[must_use]
    pub fn is_yearless(&self) -> bool {
        matches!(self, Self::YearLess(_))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::YearLess(ts) => write!(f, "{ts}"),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A ctime-like timestamp (`Mon Feb 23 03:20:19.670`) whose year is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearlessTimestamp {
    /// Day of the week as printed.
    pub weekday: Weekday,
    /// Month, 1-based.
    pub month: u32,
    /// Day of the month.
    pub day: u32,
    /// Time of day.
    pub time: NaiveTime,
    /// Whether the source text carried milliseconds.
    pub millis: bool,
}

impl YearlessTimestamp {
    /// Combines the timestamp with `year`.
    ///
    /// Returns `None` if the day does not exist in that year (February 29th).
    ///
    /// # Examples
    ///
    /// ```
    /// use logparser::{parse_log_line, Timestamp};
    ///
    /// let event = parse_log_line("Mon Feb 23 03:20:19.670 [conn1] end connection").unwrap();
    /// let Timestamp::YearLess(ts) = event.timestamp else { panic!("expected ctime format") };
    /// let resolved = ts.resolve(2015).unwrap();
    /// assert_eq!(resolved.to_string(), "2015-02-23 03:20:19.670");
    /// assert!(ts.weekday_matches(2015));
    /// ```
    #[must_use]
    pub fn resolve(&self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).map(|date| date.and_time(self.time))
    }

    /// Returns `true` if the printed weekday agrees with the date in `year`.
    #[must_use]
    pub fn weekday_matches(&self, year: i32) -> bool {
        self.resolve(year)
            .is_some_and(|dt| dt.date().weekday() == self.weekday)
    }
}

impl std::fmt::Display for YearlessTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let month = usize::try_from(self.month.saturating_sub(1))
            .ok()
            .and_then(|i| MONTH_ABBREVIATIONS.get(i))
            .copied()
            .unwrap_or("???");
        write!(
            f,
            "{} {month} {} {}",
            self.weekday,
            self.day,
            self.time.format("%H:%M:%S")
        )?;
        if self.millis {
            write!(f, ".{:03}", self.time.nanosecond() / 1_000_000)?;
        }
        Ok(())
    }
}

// ============================================================================
// Parsers
// ============================================================================

/// Parses a timestamp at the start of `input` using the first matching format.
pub(crate) fn timestamp(input: &str) -> IResult<&str, Timestamp> {
    alt((
        map(iso_with_offset, Timestamp::Absolute),
        map(iso_utc, Timestamp::Absolute),
        map(ctime_with_millis, Timestamp::YearLess),
        map(ctime, Timestamp::YearLess),
    ))
    .parse(input)
}

fn digits<'a>(count: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    move |input: &'a str| {
        map_res(
            take_while_m_n(count, count, |c: char| c.is_ascii_digit()),
            |s: &str| s.parse::<u32>(),
        )
        .parse(input)
    }
}

/// `.450` as nanoseconds; digits past nanosecond precision are dropped.
fn fraction(input: &str) -> IResult<&str, u32> {
    map_res(preceded(char('.'), digit1), |s: &str| {
        let mut nanos: String = s.chars().take(9).collect();
        while nanos.len() < 9 {
            nanos.push('0');
        }
        nanos.parse::<u32>()
    })
    .parse(input)
}

fn iso_local(input: &str) -> IResult<&str, NaiveDateTime> {
    map_opt(
        (
            digits(4),
            char('-'),
            digits(2),
            char('-'),
            digits(2),
            char('T'),
            digits(2),
            char(':'),
            digits(2),
            char(':'),
            digits(2),
            opt(fraction),
        ),
        |(year, _, month, _, day, _, hour, _, min, _, sec, nanos)| {
            let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
            let time = NaiveTime::from_hms_nano_opt(hour, min, sec, nanos.unwrap_or(0))?;
            Some(date.and_time(time))
        },
    )
    .parse(input)
}

/// `-0500`, `+05:30`
fn utc_offset(input: &str) -> IResult<&str, FixedOffset> {
    map_opt(
        (one_of("+-"), digits(2), opt(char(':')), digits(2)),
        |(sign, hours, _, minutes)| {
            let seconds = i32::try_from(hours * 3600 + minutes * 60).ok()?;
            FixedOffset::east_opt(if sign == '-' { -seconds } else { seconds })
        },
    )
    .parse(input)
}

fn iso_with_offset(input: &str) -> IResult<&str, DateTime<FixedOffset>> {
    map_opt((iso_local, utc_offset), |(local, offset)| {
        offset.from_local_datetime(&local).single()
    })
    .parse(input)
}

fn iso_utc(input: &str) -> IResult<&str, DateTime<FixedOffset>> {
    map((iso_local, char('Z')), |(local, _)| {
        local.and_utc().fixed_offset()
    })
    .parse(input)
}

type CtimeParts = (Weekday, u32, u32, u32, u32, u32);

fn short_name(input: &str) -> IResult<&str, &str> {
    take_while_m_n(3, 3, |c: char| c.is_ascii_alphabetic())(input)
}

/// `Mon Feb 23 03:20:19`
fn ctime_parts(input: &str) -> IResult<&str, CtimeParts> {
    map(
        (
            map_res(short_name, |s: &str| s.parse::<Weekday>()),
            space1,
            map_res(short_name, |s: &str| s.parse::<Month>()),
            space1,
            map_res(
                take_while_m_n(1, 2, |c: char| c.is_ascii_digit()),
                |s: &str| s.parse::<u32>(),
            ),
            space1,
            digits(2),
            char(':'),
            digits(2),
            char(':'),
            digits(2),
        ),
        |(weekday, _, month, _, day, _, hour, _, min, _, sec)| {
            (weekday, month.number_from_month(), day, hour, min, sec)
        },
    )
    .parse(input)
}

fn yearless(parts: CtimeParts, millis: Option<u32>) -> Option<YearlessTimestamp> {
    let (weekday, month, day, hour, min, sec) = parts;
    // 2000 is a leap year, so February 29th passes the check.
    NaiveDate::from_ymd_opt(2000, month, day)?;
    let time = NaiveTime::from_hms_milli_opt(hour, min, sec, millis.unwrap_or(0))?;
    Some(YearlessTimestamp {
        weekday,
        month,
        day,
        time,
        millis: millis.is_some(),
    })
}

fn ctime_with_millis(input: &str) -> IResult<&str, YearlessTimestamp> {
    map_opt(
        (ctime_parts, preceded(char('.'), digits(3))),
        |(parts, millis)| yearless(parts, Some(millis)),
    )
    .parse(input)
}

fn ctime(input: &str) -> IResult<&str, YearlessTimestamp> {
    map_opt(ctime_parts, |parts| yearless(parts, None)).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_with_offset() {
        let (rest, ts) = timestamp("2014-11-03T18:28:32.450-0500 I NETWORK").unwrap();
        assert_eq!(rest, " I NETWORK");
        let Timestamp::Absolute(dt) = ts else {
            panic!("Expected absolute timestamp");
        };
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(
            dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
            "2014-11-03T23:28:32.450Z"
        );
    }

    #[test]
    fn test_iso_with_colon_offset() {
        let (_, ts) = timestamp("2014-11-03T18:28:32.450+05:30").unwrap();
        assert_eq!(ts.to_string(), "2014-11-03T18:28:32.450+05:30");
    }

    #[test]
    fn test_iso_utc() {
        let (rest, ts) = timestamp("2014-11-03T18:28:32.450Z [conn1]").unwrap();
        assert_eq!(rest, " [conn1]");
        assert_eq!(ts.to_string(), "2014-11-03T18:28:32.450Z");
        assert!(!ts.is_yearless());
        assert!(ts.to_utc().is_some());
    }

    #[test]
    fn test_ctime_with_millis() {
        let (rest, ts) = timestamp("Mon Feb 23 03:20:19.670 [TTLMonitor]").unwrap();
        assert_eq!(rest, " [TTLMonitor]");
        match ts {
            Timestamp::YearLess(ts) => {
                assert_eq!(ts.weekday, Weekday::Mon);
                assert_eq!(ts.month, 2);
                assert_eq!(ts.day, 23);
                assert_eq!(ts.time, NaiveTime::from_hms_milli_opt(3, 20, 19, 670).unwrap());
                assert!(ts.millis);
                assert_eq!(ts.to_string(), "Mon Feb 23 03:20:19.670");
            }
            Timestamp::Absolute(_) => panic!("Expected year-less timestamp"),
        }
    }

    #[test]
    fn test_ctime_without_millis() {
        let (rest, ts) = timestamp("Tue Mar  3 11:02:01 [conn7]").unwrap();
        assert_eq!(rest, " [conn7]");
        assert!(ts.is_yearless());
        assert!(ts.to_utc().is_none());
        assert_eq!(ts.to_string(), "Tue Mar 3 11:02:01");
    }

    #[test]
    fn test_yearless_resolve() {
        let (_, ts) = timestamp("Mon Feb 29 00:00:00").unwrap();
        let Timestamp::YearLess(ts) = ts else {
            panic!("Expected year-less timestamp");
        };
        assert!(ts.resolve(2016).is_some());
        assert!(ts.resolve(2015).is_none());
        assert!(ts.weekday_matches(2016));
        assert!(!ts.weekday_matches(2015));
    }

    #[test]
    fn test_rejects_unknown_formats() {
        assert!(timestamp("[conn1] query foo.bar").is_err());
        assert!(timestamp("2014/11/03 18:28:32").is_err());
        assert!(timestamp("Xyz Feb 23 03:20:19.670").is_err());
        assert!(timestamp("Mon Foo 23 03:20:19.670").is_err());
        assert!(timestamp("2014-13-03T18:28:32.450Z").is_err());
    }

    #[test]
    fn test_timestamp_serialization() {
        let (_, ts) = timestamp("Mon Feb 23 03:20:19.670").unwrap();
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"Mon Feb 23 03:20:19.670\""
        );
    }
}

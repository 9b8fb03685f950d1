// Report period domain model - the month a report covers
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid month selector '{0}', expected MM-YYYY")]
    Format(String),
    #[error("month must be between 01 and 12, got {0}")]
    Month(u32),
    #[error("local time {0} does not exist in zone {1}")]
    NonexistentLocalTime(String, Tz),
}

/// Time range written into the dashboard's top-level `time` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

/// A calendar month selected on the command line as `MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

impl ReportPeriod {
    pub fn parse(selector: &str) -> Result<Self, PeriodError> {
        let format_err = || PeriodError::Format(selector.to_string());

        let (month, year) = selector.trim().split_once('-').ok_or_else(format_err)?;
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if month.len() != 2 || year.len() != 4 || !all_digits(month) || !all_digits(year) {
            return Err(format_err());
        }
        let month: u32 = month.parse().map_err(|_| format_err())?;
        let year: i32 = year.parse().map_err(|_| format_err())?;

        if !(1..=12).contains(&month) {
            return Err(PeriodError::Month(month));
        }

        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated in parse, so the first of the month always exists
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Suffix used in dashboard titles and artifact names, e.g. `2024-03`.
    pub fn title_suffix(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Whole month in `tz`, from the first second to the last second (inclusive).
    pub fn time_range(&self, tz: Tz) -> Result<TimeRange, PeriodError> {
        let start = localize(tz, self.first_day())?;
        let next = localize(tz, self.last_day() + Duration::days(1))?;
        let end = next - Duration::seconds(1);

        Ok(TimeRange {
            from: start.to_rfc3339_opts(SecondsFormat::Secs, false),
            to: end.to_rfc3339_opts(SecondsFormat::Secs, false),
        })
    }

    /// Human readable period in French, e.g. `1er mars 2024 → 31 mars 2024`.
    pub fn label(&self) -> String {
        format!(
            "1er {} → {}",
            self.first_day().format_localized("%B %Y", chrono::Locale::fr_FR),
            self.last_day().format_localized("%d %B %Y", chrono::Locale::fr_FR)
        )
    }

    /// First day of the previous month, as used by the `DATE_FROM` variable.
    pub fn date_from(&self) -> String {
        let previous = self.first_day().pred_opt().unwrap_or(NaiveDate::MIN);
        previous
            .with_day(1)
            .unwrap_or(previous)
            .format("%Y-%m-%d")
            .to_string()
    }

    pub fn date_to(&self) -> String {
        self.last_day().format("%Y-%m-%d").to_string()
    }
}

/// Start of `date` in `tz`. When midnight falls in a DST gap the day starts
/// at the first local time after the gap.
fn localize(tz: Tz, date: NaiveDate) -> Result<DateTime<Tz>, PeriodError> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let step = Duration::minutes(15);
    let mut local: NaiveDateTime = midnight;
    while local.date() == date {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => return Ok(dt),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => local += step,
        }
    }
    Err(PeriodError::NonexistentLocalTime(midnight.to_string(), tz))
}

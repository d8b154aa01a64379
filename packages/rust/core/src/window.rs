//! Rolling date window over year-less posting dates.
//!
//! Sources publish dates as `"Mon D"` with no year. A date is placed in the
//! current year, or the previous one if that would put it in the future, and
//! kept only if it falls within `max_days` of today.

use chrono::{Datelike, Days, Local, NaiveDate};
use tracing::{debug, warn};

use jobdigest_shared::{JobDigestError, MAX_WINDOW_DAYS, Posting, Result};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Output of [`DateWindowFilter::apply_at`].
#[derive(Debug, Default)]
pub struct WindowResult {
    /// Postings inside the window, ascending by resolved date.
    pub kept: Vec<Posting>,
    /// Postings whose date could not be resolved.
    pub invalid: Vec<Posting>,
}

/// Keeps postings dated within the last `max_days` days.
#[derive(Debug, Clone, Copy)]
pub struct DateWindowFilter {
    max_days: u32,
}

impl DateWindowFilter {
    /// Fails with a config error if `max_days` exceeds [`MAX_WINDOW_DAYS`].
    pub fn new(max_days: u32) -> Result<Self> {
        if max_days > MAX_WINDOW_DAYS {
            return Err(JobDigestError::config(format!(
                "max_days must be at most {MAX_WINDOW_DAYS}, got {max_days}"
            )));
        }
        Ok(Self { max_days })
    }

    pub fn max_days(&self) -> u32 {
        self.max_days
    }

    /// Filter against the local calendar day.
    pub fn apply(&self, postings: Vec<Posting>) -> WindowResult {
        self.apply_at(postings, Local::now().date_naive())
    }

    /// Filter against an explicit `today`.
    ///
    /// Postings with unresolvable dates are set aside in
    /// [`WindowResult::invalid`]; the rest of the batch is unaffected. The
    /// sort is stable, so postings sharing a date keep their input order.
    pub fn apply_at(&self, postings: Vec<Posting>, today: NaiveDate) -> WindowResult {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.max_days)))
            .unwrap_or(NaiveDate::MIN);

        let mut dated = Vec::with_capacity(postings.len());
        let mut invalid = Vec::new();

        for posting in postings {
            match resolve_posted_date(&posting.date_posted, today) {
                Ok(date) if date >= cutoff => dated.push((date, posting)),
                Ok(date) => {
                    debug!(key = %posting.key(), %date, %cutoff, "outside window");
                }
                Err(e) => {
                    warn!(key = %posting.key(), error = %e, "dropping posting with invalid date");
                    invalid.push(posting);
                }
            }
        }

        dated.sort_by_key(|(date, _)| *date);

        WindowResult {
            kept: dated.into_iter().map(|(_, p)| p).collect(),
            invalid,
        }
    }
}

/// Resolve a `"Mon D"` date to the most recent matching day not after `today`.
///
/// Month names are three-letter English abbreviations, matched
/// case-insensitively. Days that do not exist in the resolved year
/// (`"Apr 31"`, `"Feb 29"` outside leap years) are errors.
pub fn resolve_posted_date(raw: &str, today: NaiveDate) -> Result<NaiveDate> {
    let mut parts = raw.split_whitespace();
    let (Some(month), Some(day), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(JobDigestError::invalid_date(raw, "expected \"Mon D\""));
    };

    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .map(|i| i as u32 + 1)
        .ok_or_else(|| JobDigestError::invalid_date(raw, format!("unknown month {month:?}")))?;

    let day: u32 = day
        .parse()
        .map_err(|_| JobDigestError::invalid_date(raw, format!("bad day {day:?}")))?;

    let mut year = today.year();
    if (month, day) > (today.month(), today.day()) {
        year -= 1;
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| JobDigestError::invalid_date(raw, format!("no such day in {year}")))
}

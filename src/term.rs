use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::TermCalendar;

/// An academic term, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

impl Term {
    /// Term for `today`: months before the first term's end month belong to
    /// the first term, everything else to the second. Days that fall between
    /// terms resolve to a term that has not started yet (or already ended),
    /// which yields a clamped progress of 0 or 100.
    pub fn containing(today: NaiveDate, calendar: &TermCalendar) -> Option<Term> {
        let year = today.year();
        let (start_month, end_month) = if today.month() < calendar.first_end_month {
            (calendar.first_start_month, calendar.first_end_month)
        } else {
            (calendar.second_start_month, calendar.second_end_month)
        };
        Some(Term {
            start: NaiveDate::from_ymd_opt(year, start_month, 1)?,
            end: last_day_of_month(year, end_month)?,
        })
    }

    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Elapsed share of the term as a percentage in [0, 100].
    pub fn progress(&self, today: NaiveDate) -> f64 {
        let total = self.total_days();
        if total <= 0 {
            return if today >= self.end { 100.0 } else { 0.0 };
        }
        let elapsed = (today - self.start).num_days();
        clamp_percent(elapsed as f64 / total as f64 * 100.0)
    }
}

pub fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

use std::ops::RangeInclusive;

use chrono::{Datelike, Days, NaiveDate};

use crate::error::{Error, Result};

/// Fixed tail of every invoice key.
pub const KEY_SUFFIX: &str = "240";

/// Days `from..=to` of one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub year: i32,
    pub month: u32,
    pub from: u32,
    pub to: u32,
}

impl DateRange {
    pub fn new(year: i32, month: u32, from: u32, to: u32) -> Self {
        DateRange {
            year,
            month,
            from,
            to,
        }
    }

    /// Fails only when no calendar date can be built. Months past December
    /// and days past the end of a month roll over.
    pub fn validate(&self) -> Result<()> {
        self.first_of_month().map(|_| ())
    }

    pub fn days(&self) -> RangeInclusive<u32> {
        self.from..=self.to
    }

    pub fn len(&self) -> usize {
        self.days().count()
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Calendar date for a day number, counting forward from the 1st so that
    /// June 31st lands on July 1st and month 13 is January of the next year.
    pub fn date(&self, day: u32) -> Result<NaiveDate> {
        let invalid = || Error::InvalidDate {
            year: self.year,
            month: self.month,
            day,
        };
        if day == 0 {
            return Err(invalid());
        }
        self.first_of_month()?
            .checked_add_days(Days::new(u64::from(day - 1)))
            .ok_or_else(invalid)
    }

    fn first_of_month(&self) -> Result<NaiveDate> {
        let invalid = Error::InvalidDate {
            year: self.year,
            month: self.month,
            day: 1,
        };
        let Some(months) = self.month.checked_sub(1) else {
            return Err(invalid);
        };
        i32::try_from(months / 12)
            .ok()
            .and_then(|years| self.year.checked_add(years))
            .and_then(|year| NaiveDate::from_ymd_opt(year, months % 12 + 1, 1))
            .ok_or(invalid)
    }
}

/// Identifies one day's invoice for the delivery-detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub date: NaiveDate,
    year: i32,
    month: u32,
    pub week: u32,
    pub weekday: u32,
}

impl InvoiceQuery {
    pub fn for_day(range: &DateRange, day: u32) -> Result<Self> {
        let date = range.date(day)?;
        Ok(InvoiceQuery {
            date,
            year: range.year,
            month: range.month,
            week: week_of_month(day),
            weekday: date.weekday().number_from_sunday(),
        })
    }

    /// `YYYYMMWW@D@240`, e.g. `20240701@5@240` for Thursday 2024-07-04.
    pub fn key(&self) -> String {
        format!(
            "{}{:02}{:02}@{}@{}",
            self.year, self.month, self.week, self.weekday, KEY_SUFFIX
        )
    }
}

/// 1-based week index: days 1-7 are week 1, 8-14 week 2 and so on.
pub fn week_of_month(day: u32) -> u32 {
    (day.saturating_sub(1)) / 7 + 1
}

#[cfg(test)]
fn july_2024(from: u32, to: u32) -> DateRange {
    DateRange::new(2024, 7, from, to)
}

#[test]
fn week_index() {
    assert_eq!(week_of_month(1), 1);
    assert_eq!(week_of_month(7), 1);
    assert_eq!(week_of_month(8), 2);
    assert_eq!(week_of_month(14), 2);
    assert_eq!(week_of_month(15), 3);
    assert_eq!(week_of_month(28), 4);
    assert_eq!(week_of_month(29), 5);
    assert_eq!(week_of_month(31), 5);
}

#[test]
fn weekday_counts_from_sunday() {
    let range = july_2024(1, 31);
    // 2024-07-07 is a Sunday, 2024-07-13 the following Saturday
    let numbers: Vec<u32> = (7..=13)
        .map(|day| InvoiceQuery::for_day(&range, day).unwrap().weekday)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn key_layout() {
    let range = july_2024(1, 31);
    let query = InvoiceQuery::for_day(&range, 4).unwrap();
    assert_eq!(query.date, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
    assert_eq!(query.key(), "20240701@5@240");

    let query = InvoiceQuery::for_day(&range, 20).unwrap();
    assert_eq!(query.key(), "20240703@7@240");
}

#[test]
fn overflowing_day_rolls_into_next_month() {
    let range = DateRange::new(2024, 6, 1, 31);
    let query = InvoiceQuery::for_day(&range, 31).unwrap();
    assert_eq!(query.date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    // key still carries the requested month and week
    assert_eq!(query.key(), "20240605@2@240");
}

#[test]
fn month_past_december_rolls_into_next_year() {
    let range = DateRange::new(2024, 13, 1, 2);
    assert!(range.validate().is_ok());
    let query = InvoiceQuery::for_day(&range, 1).unwrap();
    assert_eq!(query.date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert_eq!(query.weekday, 4);
    assert_eq!(query.key(), "20241301@4@240");

    let range = DateRange::new(2024, 25, 1, 1);
    assert_eq!(range.date(1).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
}

#[test]
fn unbuildable_dates_are_rejected() {
    assert!(matches!(
        DateRange::new(2024, 0, 1, 2).validate(),
        Err(Error::InvalidDate { month: 0, .. })
    ));
    assert!(matches!(
        DateRange::new(300_000, 1, 1, 2).validate(),
        Err(Error::InvalidDate { year: 300_000, .. })
    ));
    assert!(july_2024(1, 31).validate().is_ok());
}

#[test]
fn range_length() {
    assert_eq!(july_2024(1, 31).len(), 31);
    assert_eq!(july_2024(5, 5).len(), 1);
    assert!(july_2024(6, 5).is_empty());
    assert_eq!(july_2024(6, 5).len(), 0);
}

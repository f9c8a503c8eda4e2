//! Core data types used throughout the weight log

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier for a calendar month.
///
/// Encoded as `year * 12 + (month - 1)`, so the natural integer order is
/// chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthId(pub i32);

impl MonthId {
    /// Create from a calendar year and month (1..=12).
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self(year * 12 + month as i32 - 1)
    }

    /// Calendar year.
    pub fn year(self) -> i32 {
        self.0.div_euclid(12)
    }

    /// Calendar month, 1..=12.
    pub fn month(self) -> u32 {
        (self.0.rem_euclid(12) + 1) as u32
    }

    /// The following month.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The preceding month.
    pub fn prev(self) -> Self {
        Self(self.0 - 1)
    }

    /// Number of days in this month, leap-year aware.
    pub fn day_count(self) -> u32 {
        let first = NaiveDate::from_ymd_opt(self.year(), self.month(), 1)
            .expect("month id encodes a valid year/month");
        let next = self.next();
        let first_of_next = NaiveDate::from_ymd_opt(next.year(), next.month(), 1)
            .expect("month id encodes a valid year/month");
        (first_of_next - first).num_days() as u32
    }

    /// First day of this month.
    pub fn first_day(self) -> MonthDay {
        MonthDay::make(self, 1)
    }

    /// Last day of this month.
    pub fn last_day(self) -> MonthDay {
        MonthDay::make(self, self.day_count())
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Compact identifier for a specific day: `(MonthId << 5) | day`.
///
/// Day-of-month occupies the low five bits, so integer comparison between
/// two `MonthDay`s is equivalent to comparing `(month, day)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthDay(pub i32);

impl MonthDay {
    /// Combine a month and a day-of-month (1..=31).
    pub fn make(month: MonthId, day: u32) -> Self {
        debug_assert!((1..=31).contains(&day));
        Self((month.0 << 5) | day as i32)
    }

    /// Create from calendar components.
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self::make(MonthId::new(year, month), day)
    }

    /// The owning month.
    pub fn month(self) -> MonthId {
        MonthId(self.0 >> 5)
    }

    /// Day of month, 1..=31.
    pub fn day(self) -> u32 {
        (self.0 & 0x1f) as u32
    }

    /// Convert to a calendar date. Returns `None` for days that do not
    /// exist in the month (e.g. February 30).
    pub fn to_date(self) -> Option<NaiveDate> {
        let m = self.month();
        NaiveDate::from_ymd_opt(m.year(), m.month(), self.day())
    }

    /// Convert from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month(), date.day())
    }

    /// Today's date in the local time zone.
    pub fn today() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    /// The next calendar day, crossing month boundaries.
    pub fn next(self) -> Self {
        let m = self.month();
        if self.day() < m.day_count() {
            Self::make(m, self.day() + 1)
        } else {
            m.next().first_day()
        }
    }

    /// The preceding calendar day, crossing month boundaries.
    pub fn prev(self) -> Self {
        if self.day() > 1 {
            Self::make(self.month(), self.day() - 1)
        } else {
            self.month().prev().last_day()
        }
    }

    /// Signed number of calendar days from `self` to `other`.
    pub fn days_until(self, other: MonthDay) -> i64 {
        let a = self.to_date().expect("valid month day");
        let b = other.to_date().expect("valid month day");
        (b - a).num_days()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.month(), self.day())
    }
}

/// User-settable mark bits attached to a day.
///
/// Four independent marks; the remaining bits are reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFlags(pub u8);

impl DayFlags {
    /// No marks set.
    pub fn empty() -> Self {
        Self(0)
    }

    /// True if no mark is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check mark `index` (0..4).
    pub fn mark(&self, index: u8) -> bool {
        debug_assert!(index < 4);
        self.0 & (1 << index) != 0
    }

    /// Set or clear mark `index` (0..4).
    pub fn set_mark(&mut self, index: u8, value: bool) {
        debug_assert!(index < 4);
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }
}

/// One calendar day's measurements.
///
/// A day with no recorded data is absent from storage; `Default` is the
/// absent state, not a zero measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    /// Scale weight, if one was recorded.
    pub weight: Option<f32>,

    /// Body fat weight, if the scale reported one.
    pub fat_weight: Option<f32>,

    /// User mark bits.
    pub flags: DayFlags,

    /// Free-form note.
    pub note: Option<String>,
}

impl DayRecord {
    /// True if nothing at all is recorded for the day.
    pub fn is_empty(&self) -> bool {
        self.weight.is_none()
            && self.fat_weight.is_none()
            && self.flags.is_empty()
            && self.note.is_none()
    }

    /// True if the day has a weight measurement, honoring the fat filter.
    pub fn has_weight(&self, only_fat: bool) -> bool {
        if only_fat {
            self.weight.is_some() && self.fat_weight.is_some()
        } else {
            self.weight.is_some()
        }
    }

    /// The value a range scan considers: fat weight when `only_fat`,
    /// scale weight otherwise. `None` if the day does not qualify.
    pub fn scan_weight(&self, only_fat: bool) -> Option<f32> {
        if only_fat {
            self.weight?;
            self.fat_weight
        } else {
            self.weight
        }
    }
}

/// Filter for bounds queries over the populated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Any recorded data qualifies.
    None,
    /// Days with a weight measurement.
    Weight,
    /// Days with both weight and fat measurements.
    WeightAndFat,
}

impl Filter {
    /// Does `record` match this filter?
    pub fn matches(&self, record: &DayRecord) -> bool {
        match self {
            Filter::None => !record.is_empty(),
            Filter::Weight => record.weight.is_some(),
            Filter::WeightAndFat => record.weight.is_some() && record.fat_weight.is_some(),
        }
    }
}

/// One named entry of the energy-equivalents table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyEquivalent {
    /// Display name, e.g. an activity or food.
    pub name: String,
    /// Unit the value is expressed per, e.g. "minute".
    pub unit: String,
    /// Energy per unit, kilocalories.
    pub value: f64,
}

/// Target raster size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelSize {
    /// Create a new pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

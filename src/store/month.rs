//! In-memory representation of one calendar month of day records
//!
//! A partition owns up to 31 day slots, tracks whether it has uncommitted
//! changes, and answers the month-local part of every range query. Partitions
//! are created by the month cache and live for the lifetime of the store;
//! render jobs only ever take read snapshots.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::types::{DayRecord, Filter, MonthId};

/// Slots per partition. Months shorter than 31 days simply leave the tail
/// slots empty; validity of a day-of-month is enforced at the `MonthDay`
/// encoding layer.
pub const DAYS_PER_PARTITION: usize = 31;

/// All day records for one calendar month.
pub struct MonthPartition {
    month: MonthId,
    days: RwLock<Vec<DayRecord>>,
    dirty: AtomicBool,
}

impl MonthPartition {
    /// Create an empty partition for `month`.
    pub(crate) fn empty(month: MonthId) -> Self {
        Self {
            month,
            days: RwLock::new(vec![DayRecord::default(); DAYS_PER_PARTITION]),
            dirty: AtomicBool::new(false),
        }
    }

    /// The month this partition represents.
    pub fn month(&self) -> MonthId {
        self.month
    }

    /// Snapshot of one day's record (day-of-month 1..=31).
    pub fn day(&self, day: u32) -> DayRecord {
        debug_assert!((1..=31).contains(&day));
        self.days.read()[day as usize - 1].clone()
    }

    /// True if the partition holds uncommitted changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Replace one day's record and mark the partition dirty.
    pub(crate) fn set_day(&self, day: u32, record: DayRecord) {
        debug_assert!((1..=31).contains(&day));
        self.days.write()[day as usize - 1] = record;
        self.dirty.store(true, Ordering::Release);
    }

    /// Install a row read from storage without touching the dirty flag.
    pub(crate) fn load_day(&self, day: u32, record: DayRecord) {
        debug_assert!((1..=31).contains(&day));
        self.days.write()[day as usize - 1] = record;
    }

    /// Non-empty days in ascending order, cloned out for serialization or
    /// iteration without holding the partition lock.
    pub(crate) fn non_empty_days(&self) -> Vec<(u32, DayRecord)> {
        let days = self.days.read();
        days.iter()
            .enumerate()
            .filter(|(_, d)| !d.is_empty())
            .map(|(i, d)| (i as u32 + 1, d.clone()))
            .collect()
    }

    /// Min/max scanned weight over days `from..=to`, or `None` if no day in
    /// the window qualifies.
    pub fn extrema(&self, from: u32, to: u32, only_fat: bool) -> Option<(f32, f32)> {
        let days = self.days.read();
        let mut bounds: Option<(f32, f32)> = None;
        for day in from.max(1)..=to.min(31) {
            if let Some(w) = days[day as usize - 1].scan_weight(only_fat) {
                bounds = Some(match bounds {
                    None => (w, w),
                    Some((lo, hi)) => (lo.min(w), hi.max(w)),
                });
            }
        }
        bounds
    }

    /// Latest qualifying day strictly before `day`, within this month.
    pub fn last_weight_before(&self, day: u32, only_fat: bool) -> Option<(u32, DayRecord)> {
        let days = self.days.read();
        (1..day.min(32))
            .rev()
            .map(|d| (d, &days[d as usize - 1]))
            .find(|(_, rec)| rec.has_weight(only_fat))
            .map(|(d, rec)| (d, rec.clone()))
    }

    /// Earliest qualifying day strictly after `day`, within this month.
    pub fn first_weight_after(&self, day: u32, only_fat: bool) -> Option<(u32, DayRecord)> {
        let days = self.days.read();
        (day + 1..=31)
            .map(|d| (d, &days[d as usize - 1]))
            .find(|(_, rec)| rec.has_weight(only_fat))
            .map(|(d, rec)| (d, rec.clone()))
    }

    /// Earliest day matching `filter`, if any.
    pub fn first_matching(&self, filter: Filter) -> Option<u32> {
        let days = self.days.read();
        (1u32..=31).find(|d| filter.matches(&days[*d as usize - 1]))
    }

    /// Latest day matching `filter`, if any.
    pub fn last_matching(&self, filter: Filter) -> Option<u32> {
        let days = self.days.read();
        (1u32..=31).rev().find(|d| filter.matches(&days[*d as usize - 1]))
    }

    /// Earliest non-empty day strictly after `day`, regardless of filter.
    pub fn first_recorded_after(&self, day: u32) -> Option<(u32, DayRecord)> {
        let days = self.days.read();
        (day + 1..=31)
            .map(|d| (d, &days[d as usize - 1]))
            .find(|(_, rec)| !rec.is_empty())
            .map(|(d, rec)| (d, rec.clone()))
    }

    /// True if any day carries a fat measurement.
    pub fn has_fat_day(&self) -> bool {
        let days = self.days.read();
        days.iter().any(|d| d.fat_weight.is_some())
    }
}

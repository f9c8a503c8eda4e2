//! Forward-only cursor over recorded days
//!
//! Traverses partitions in chronological order, loading each month from the
//! store as the previous one is exhausted. The latest bound is consulted
//! live, so writes to months the cursor has not reached yet are observed;
//! months already visited are not re-read.

use crate::error::Result;
use crate::store::database::Database;
use crate::types::{DayRecord, MonthDay};

/// Lazy cursor yielding `(MonthDay, DayRecord)` for every non-empty day at
/// or after the starting position. Once exhausted it stays exhausted;
/// [`RangeIterator::reset`] re-seeds it at a new position.
pub struct RangeIterator<'a> {
    db: &'a Database,
    pos: Option<MonthDay>,
}

impl<'a> RangeIterator<'a> {
    pub(crate) fn new(db: &'a Database, start: MonthDay) -> Self {
        Self {
            db,
            pos: Some(start),
        }
    }

    /// Re-seed the cursor at `start`, whether or not it was exhausted.
    pub fn reset(&mut self, start: MonthDay) {
        self.pos = Some(start);
    }

    /// Advance to the next recorded day, or `None` past the store's latest
    /// bound.
    pub fn next_day(&mut self) -> Result<Option<(MonthDay, DayRecord)>> {
        loop {
            let Some(cur) = self.pos else {
                return Ok(None);
            };
            let Some(latest_month) = self.db.latest_month() else {
                self.pos = None;
                return Ok(None);
            };
            if cur.month() > latest_month {
                self.pos = None;
                return Ok(None);
            }

            let part = self.db.month(cur.month())?;
            match part.first_recorded_after(cur.day() - 1) {
                Some((d, rec)) => {
                    let md = MonthDay::make(cur.month(), d);
                    self.pos = Some(md.next());
                    return Ok(Some((md, rec)));
                }
                None => {
                    self.pos = Some(cur.month().next().first_day());
                }
            }
        }
    }
}

impl Iterator for RangeIterator<'_> {
    type Item = (MonthDay, DayRecord);

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_day() {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(error = %e, "range iteration aborted");
                self.pos = None;
                None
            }
        }
    }
}

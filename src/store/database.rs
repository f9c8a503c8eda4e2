//! The month-cache-backed persistent store
//!
//! `Database` pairs a SQLite-backed day table with an in-memory cache of
//! [`MonthPartition`]s, keyed by [`MonthId`]. Reads go through the cache
//! (absent months materialize as empty partitions), writes mark partitions
//! dirty, and `commit` flushes every dirty partition in one transaction.
//!
//! # Concurrency
//!
//! The cache map is guarded by a single mutex; partition contents have their
//! own reader/writer locks. The cache lock is held across the single-month
//! load on a miss (one indexed range read) but never across a commit
//! transaction. The design assumes one writer context and any number of
//! concurrent readers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::store::iterator::RangeIterator;
use crate::store::month::MonthPartition;
use crate::store::schema;
use crate::types::{DayFlags, DayRecord, EnergyEquivalent, Filter, MonthDay, MonthId};

/// Notification broadcast when committed data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// A commit made dirty partitions durable.
    Committed,
    /// All data was deleted.
    Cleared,
}

/// Capacity of the change-notification channel. Slow subscribers that lag
/// behind simply observe a lagged receive and resynchronize.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Month-partitioned persistent weight store.
pub struct Database {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
    cache: Mutex<HashMap<MonthId, Arc<MonthPartition>>>,
    /// Earliest uncommitted change; bounds how far back derived summaries
    /// must be recomputed instead of trusted.
    earliest_change: Mutex<Option<MonthDay>>,
    /// Monotone-widening summary of the populated month range.
    bounds: Mutex<Option<(MonthId, MonthId)>>,
    schema_version: AtomicI32,
    schema_current: AtomicBool,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    /// Open a file-backed store, creating it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: display.clone(),
            source,
        })?;
        // SQLite opens lazily; corruption surfaces on the first statement.
        Self::from_connection(Some(path), conn).map_err(|e| match e {
            StoreError::Sql(source) => StoreError::OpenFailed {
                path: display,
                source,
            },
            other => other,
        })
    }

    /// Open an empty in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::from_connection(None, conn)
    }

    /// Open an in-memory store seeded from a SQL batch (bundled starter
    /// data).
    pub fn open_with_sql(sql: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        conn.execute_batch(sql)?;
        Self::from_connection(None, conn)
    }

    fn from_connection(path: Option<PathBuf>, conn: Connection) -> Result<Self> {
        schema::configure(&conn)?;
        schema::initialize(&conn)?;
        let version = schema::version(&conn)?;
        let bounds = read_bounds(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        tracing::debug!(
            path = %path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| ":memory:".into()),
            version,
            "opened store"
        );
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
            cache: Mutex::new(HashMap::new()),
            earliest_change: Mutex::new(None),
            bounds: Mutex::new(bounds),
            schema_version: AtomicI32::new(version),
            schema_current: AtomicBool::new(version >= schema::SCHEMA_VERSION),
            changes,
        })
    }

    /// Close the underlying connection. Cached partitions and dirty flags
    /// survive, so a failed commit can be retried after [`Self::reopen`].
    pub fn close(&self) {
        *self.conn.lock() = None;
        tracing::debug!("closed store connection");
    }

    /// Reopen a previously closed file-backed store.
    pub fn reopen(&self) -> Result<()> {
        let path = self.path.clone().ok_or_else(|| StoreError::OpenFailed {
            path: ":memory:".into(),
            source: rusqlite::Error::InvalidPath(":memory:".into()),
        })?;
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.display().to_string(),
            source,
        })?;
        schema::configure(&conn)?;
        schema::initialize(&conn)?;
        let version = schema::version(&conn)?;
        if let Some(disk) = read_bounds(&conn)? {
            let mut bounds = self.bounds.lock();
            *bounds = Some(match *bounds {
                None => disk,
                Some((lo, hi)) => (lo.min(disk.0), hi.max(disk.1)),
            });
        }
        *self.conn.lock() = Some(conn);
        self.schema_version.store(version, Ordering::Release);
        self.schema_current
            .store(version >= schema::SCHEMA_VERSION, Ordering::Release);
        Ok(())
    }

    /// True when the on-disk schema requires [`Self::upgrade`] before
    /// writes are accepted.
    pub fn needs_upgrade(&self) -> bool {
        !self.schema_current.load(Ordering::Acquire)
    }

    /// Run the schema upgrade. Idempotent.
    pub fn upgrade(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        schema::upgrade(conn)?;
        self.schema_version
            .store(schema::SCHEMA_VERSION, Ordering::Release);
        self.schema_current.store(true, Ordering::Release);
        Ok(())
    }

    /// Register for change notifications; fires after every successful
    /// commit and after `delete_all`.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    // ------------------------------------------------------------------
    // Month cache
    // ------------------------------------------------------------------

    /// The partition for `id`, loading it from storage on first access.
    ///
    /// A month with no stored rows is a valid empty partition, not an
    /// error. Repeated calls return the same instance while the store is
    /// open.
    pub fn month(&self, id: MonthId) -> Result<Arc<MonthPartition>> {
        let mut cache = self.cache.lock();
        if let Some(part) = cache.get(&id) {
            return Ok(part.clone());
        }

        let part = Arc::new(MonthPartition::empty(id));
        {
            let guard = self.conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            load_month(conn, &part, self.schema_current.load(Ordering::Acquire))?;
        }
        cache.insert(id, part.clone());
        Ok(part)
    }

    /// Record that `day` changed: mark its partition dirty, pull the
    /// earliest-change watermark back, and widen the bounds summary.
    pub fn record_change(&self, day: MonthDay) {
        if let Some(part) = self.cache.lock().get(&day.month()) {
            part.mark_dirty();
        }
        {
            let mut wm = self.earliest_change.lock();
            *wm = Some(match *wm {
                None => day,
                Some(cur) => cur.min(day),
            });
        }
        let mut bounds = self.bounds.lock();
        let m = day.month();
        *bounds = Some(match *bounds {
            None => (m, m),
            Some((lo, hi)) => (lo.min(m), hi.max(m)),
        });
    }

    /// Replace one day's record. The single mutation path: partitions are
    /// never mutated except through here.
    pub fn set_day(&self, day: MonthDay, record: DayRecord) -> Result<()> {
        if !self.schema_current.load(Ordering::Acquire) {
            return Err(StoreError::SchemaMismatch {
                found: self.schema_version.load(Ordering::Acquire),
                required: schema::SCHEMA_VERSION,
            });
        }
        let part = self.month(day.month())?;
        part.set_day(day.day(), record);
        self.record_change(day);
        Ok(())
    }

    /// Make every dirty partition durable in one transaction. Returns
    /// `true` if anything was written. On failure every dirty flag is left
    /// set, so retrying after the fault clears is safe.
    pub fn commit(&self) -> Result<bool> {
        let dirty: Vec<Arc<MonthPartition>> = self
            .cache
            .lock()
            .values()
            .filter(|p| p.is_dirty())
            .cloned()
            .collect();
        if dirty.is_empty() {
            return Ok(false);
        }

        {
            let mut guard = self.conn.lock();
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            write_partitions(conn, &dirty).map_err(|e| {
                tracing::error!(error = %e, months = dirty.len(), "commit failed");
                StoreError::CommitFailed(e)
            })?;
        }

        for part in &dirty {
            part.clear_dirty();
        }
        *self.earliest_change.lock() = None;
        let _ = self.changes.send(StoreChange::Committed);
        tracing::debug!(months = dirty.len(), "committed dirty partitions");
        Ok(true)
    }

    /// Delete every stored row and drop all cached partitions. Subsequent
    /// month accesses return fresh empty partitions.
    pub fn delete_all(&self) -> Result<()> {
        {
            let mut guard = self.conn.lock();
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM days", [])?;
            tx.execute("DELETE FROM equivalents", [])?;
            tx.commit()?;
        }
        self.cache.lock().clear();
        *self.bounds.lock() = None;
        *self.earliest_change.lock() = None;
        let _ = self.changes.send(StoreChange::Cleared);
        tracing::info!("deleted all data");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Range queries
    // ------------------------------------------------------------------

    /// Earliest month of the populated range, if any.
    pub fn earliest_month(&self) -> Option<MonthId> {
        self.bounds.lock().map(|(lo, _)| lo)
    }

    /// Latest month of the populated range, if any.
    pub fn latest_month(&self) -> Option<MonthId> {
        self.bounds.lock().map(|(_, hi)| hi)
    }

    /// True when no day record exists at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.data_bounds(Filter::None)?.is_none())
    }

    /// Min/max scanned weight over `[from, to]`, or `None` when no day in
    /// the range qualifies. With `only_fat`, only days carrying a fat
    /// measurement qualify and the fat weight is the scanned value.
    pub fn weight_extrema(
        &self,
        from: MonthDay,
        to: MonthDay,
        only_fat: bool,
    ) -> Result<Option<(f32, f32)>> {
        if from > to {
            return Ok(None);
        }
        let mut bounds: Option<(f32, f32)> = None;
        let mut m = from.month();
        while m <= to.month() {
            let part = self.month(m)?;
            let lo = if m == from.month() { from.day() } else { 1 };
            let hi = if m == to.month() { to.day() } else { 31 };
            if let Some((a, b)) = part.extrema(lo, hi, only_fat) {
                bounds = Some(match bounds {
                    None => (a, b),
                    Some((lo, hi)) => (lo.min(a), hi.max(b)),
                });
            }
            m = m.next();
        }
        Ok(bounds)
    }

    /// Nearest qualifying day strictly before `start`, searching backward
    /// one month at a time, stopping at the store's earliest bound.
    pub fn day_with_weight_before(
        &self,
        start: MonthDay,
        only_fat: bool,
    ) -> Result<Option<(MonthDay, DayRecord)>> {
        let Some((earliest, latest)) = *self.bounds.lock() else {
            return Ok(None);
        };
        let mut m = start.month();
        if m > latest {
            m = latest;
        }
        while m >= earliest {
            let part = self.month(m)?;
            let before = if m == start.month() { start.day() } else { 32 };
            if let Some((d, rec)) = part.last_weight_before(before, only_fat) {
                return Ok(Some((MonthDay::make(m, d), rec)));
            }
            m = m.prev();
        }
        Ok(None)
    }

    /// Nearest qualifying day strictly after `stop`, searching forward one
    /// month at a time, stopping at the store's latest bound.
    pub fn day_with_weight_after(
        &self,
        stop: MonthDay,
        only_fat: bool,
    ) -> Result<Option<(MonthDay, DayRecord)>> {
        let Some((earliest, latest)) = *self.bounds.lock() else {
            return Ok(None);
        };
        let mut m = stop.month();
        if m < earliest {
            m = earliest;
        }
        while m <= latest {
            let part = self.month(m)?;
            let after = if m == stop.month() { stop.day() } else { 0 };
            if let Some((d, rec)) = part.first_weight_after(after, only_fat) {
                return Ok(Some((MonthDay::make(m, d), rec)));
            }
            m = m.next();
        }
        Ok(None)
    }

    /// Narrowest `[earliest, latest]` day range containing data matching
    /// `filter`, or `None` when nothing matches.
    pub fn data_bounds(&self, filter: Filter) -> Result<Option<(MonthDay, MonthDay)>> {
        let Some((earliest, latest)) = *self.bounds.lock() else {
            return Ok(None);
        };

        let mut first = None;
        let mut m = earliest;
        while m <= latest {
            if let Some(d) = self.month(m)?.first_matching(filter) {
                first = Some(MonthDay::make(m, d));
                break;
            }
            m = m.next();
        }
        let Some(first) = first else {
            return Ok(None);
        };

        let mut m = latest;
        let last = loop {
            if let Some(d) = self.month(m)?.last_matching(filter) {
                break MonthDay::make(m, d);
            }
            m = m.prev();
        };
        Ok(Some((first, last)))
    }

    /// Weight of the earliest weighed day.
    pub fn earliest_weight(&self) -> Result<Option<f32>> {
        let Some((first, _)) = self.data_bounds(Filter::Weight)? else {
            return Ok(None);
        };
        Ok(self.month(first.month())?.day(first.day()).weight)
    }

    /// Fat weight of the earliest day carrying one.
    pub fn earliest_fat_weight(&self) -> Result<Option<f32>> {
        let Some((first, _)) = self.data_bounds(Filter::WeightAndFat)? else {
            return Ok(None);
        };
        Ok(self.month(first.month())?.day(first.day()).fat_weight)
    }

    /// Weight of the latest weighed day.
    pub fn latest_weight(&self) -> Result<Option<f32>> {
        let Some((_, last)) = self.data_bounds(Filter::Weight)? else {
            return Ok(None);
        };
        Ok(self.month(last.month())?.day(last.day()).weight)
    }

    /// True if today already has a record.
    pub fn has_data_for_today(&self) -> Result<bool> {
        let today = MonthDay::today();
        Ok(!self.month(today.month())?.day(today.day()).is_empty())
    }

    /// True if any fat measurement exists in a month before `month`.
    pub fn did_record_fat_before(&self, month: MonthId) -> Result<bool> {
        let Some((earliest, latest)) = *self.bounds.lock() else {
            return Ok(false);
        };
        let stop = month.min(latest.next());
        let mut m = earliest;
        while m < stop {
            if self.month(m)?.has_fat_day() {
                return Ok(true);
            }
            m = m.next();
        }
        Ok(false)
    }

    /// Forward-only cursor over non-empty days, starting at `start`.
    pub fn iter_from(&self, start: MonthDay) -> RangeIterator<'_> {
        RangeIterator::new(self, start)
    }

    // ------------------------------------------------------------------
    // Energy equivalents
    // ------------------------------------------------------------------

    /// Load the ordered energy-equivalent entries.
    pub fn load_energy_equivalents(&self) -> Result<Vec<EnergyEquivalent>> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        let mut stmt =
            conn.prepare_cached("SELECT name, unit, value FROM equivalents ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok(EnergyEquivalent {
                name: row.get(0)?,
                unit: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Replace the energy-equivalent entries wholesale, preserving order.
    pub fn save_energy_equivalents(&self, entries: &[EnergyEquivalent]) -> Result<()> {
        if !self.schema_current.load(Ordering::Acquire) {
            return Err(StoreError::SchemaMismatch {
                found: self.schema_version.load(Ordering::Acquire),
                required: schema::SCHEMA_VERSION,
            });
        }
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM equivalents", [])?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO equivalents (position, name, unit, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, e) in entries.iter().enumerate() {
                insert.execute(params![i as i64, e.name, e.unit, e.value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn read_bounds(conn: &Connection) -> Result<Option<(MonthId, MonthId)>> {
    let (min, max): (Option<i32>, Option<i32>) = conn.query_row(
        "SELECT MIN(monthday), MAX(monthday) FROM days",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(match (min, max) {
        (Some(lo), Some(hi)) => Some((MonthDay(lo).month(), MonthDay(hi).month())),
        _ => None,
    })
}

fn load_month(conn: &Connection, part: &MonthPartition, current_schema: bool) -> Result<()> {
    let id = part.month();
    let lo = id.first_day().0;
    let hi = MonthDay::make(id, 31).0;

    // Version 1 stores have no fat_weight/note columns; reads still work
    // before the upgrade runs.
    let sql = if current_schema {
        "SELECT monthday, weight, fat_weight, flags, note FROM days
         WHERE monthday BETWEEN ?1 AND ?2"
    } else {
        "SELECT monthday, weight, NULL, flags, NULL FROM days
         WHERE monthday BETWEEN ?1 AND ?2"
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![lo, hi], |row| {
        let monthday: i32 = row.get(0)?;
        let record = DayRecord {
            weight: row.get(1)?,
            fat_weight: row.get(2)?,
            flags: DayFlags(row.get::<_, i64>(3)? as u8),
            note: row.get(4)?,
        };
        Ok((monthday, record))
    })?;
    for row in rows {
        let (monthday, record) = row?;
        let day = MonthDay(monthday).day();
        if (1..=31).contains(&day) {
            part.load_day(day, record);
        }
    }
    Ok(())
}

fn write_partitions(conn: &mut Connection, dirty: &[Arc<MonthPartition>]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut delete =
            tx.prepare_cached("DELETE FROM days WHERE monthday BETWEEN ?1 AND ?2")?;
        let mut insert = tx.prepare_cached(
            "INSERT OR REPLACE INTO days (monthday, weight, fat_weight, flags, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for part in dirty {
            let m = part.month();
            delete.execute(params![m.first_day().0, MonthDay::make(m, 31).0])?;
            for (day, rec) in part.non_empty_days() {
                insert.execute(params![
                    MonthDay::make(m, day).0,
                    rec.weight,
                    rec.fat_weight,
                    rec.flags.0 as i64,
                    rec.note,
                ])?;
            }
        }
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn weight(w: f32) -> DayRecord {
        DayRecord {
            weight: Some(w),
            ..Default::default()
        }
    }

    fn weight_fat(w: f32, fat: f32) -> DayRecord {
        DayRecord {
            weight: Some(w),
            fat_weight: Some(fat),
            ..Default::default()
        }
    }

    #[test]
    fn test_corrupt_file_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-a-db.db");
        std::fs::write(&path, b"definitely not a sqlite file").unwrap();
        assert!(matches!(
            Database::open(&path),
            Err(StoreError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_month_cache_identity() {
        let db = Database::open_in_memory().unwrap();
        let m = MonthId::new(2021, 1);
        let a = db.month(m).unwrap();
        let b = db.month(m).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_absent_month_is_empty_not_error() {
        let db = Database::open_in_memory().unwrap();
        let part = db.month(MonthId::new(1999, 7)).unwrap();
        assert!(part.day(15).is_empty());
        assert!(!part.is_dirty());
    }

    #[test]
    fn test_durability_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");

        let db = Database::open(&path).unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        db.set_day(MonthDay::new(2021, 2, 1), weight_fat(69.0, 21.0))
            .unwrap();
        db.set_day(
            MonthDay::new(2021, 1, 6),
            DayRecord {
                weight: Some(69.8),
                note: Some("after run".into()),
                flags: DayFlags(0x02),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(db.commit().unwrap());
        drop(db);

        let db = Database::open(&path).unwrap();
        let jan = db.month(MonthId::new(2021, 1)).unwrap();
        assert_eq!(jan.day(5).weight, Some(70.0));
        assert_eq!(jan.day(6).note.as_deref(), Some("after run"));
        assert!(jan.day(6).flags.mark(1));
        let feb = db.month(MonthId::new(2021, 2)).unwrap();
        assert_eq!(feb.day(1).fat_weight, Some(21.0));
        assert_eq!(db.earliest_month(), Some(MonthId::new(2021, 1)));
        assert_eq!(db.latest_month(), Some(MonthId::new(2021, 2)));
    }

    #[test]
    fn test_commit_clears_dirty_and_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        let part = db.month(MonthId::new(2021, 1)).unwrap();
        assert!(part.is_dirty());
        assert!(db.commit().unwrap());
        assert!(!part.is_dirty());
        // Nothing dirty, nothing written.
        assert!(!db.commit().unwrap());
    }

    #[test]
    fn test_failed_commit_preserves_dirty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        let db = Database::open(&path).unwrap();
        db.set_day(MonthDay::new(2021, 3, 10), weight(71.2)).unwrap();

        db.close();
        assert!(matches!(db.commit(), Err(StoreError::Closed)));
        // Uncached months cannot load while closed; cached ones survive.
        assert!(db.month(MonthId::new(1999, 1)).is_err());

        // The fault clears; the retry commits the same pending change.
        db.reopen().unwrap();
        let part = db.month(MonthId::new(2021, 3)).unwrap();
        assert!(part.is_dirty());
        assert!(db.commit().unwrap());

        let db = Database::open(&path).unwrap();
        assert_eq!(
            db.month(MonthId::new(2021, 3)).unwrap().day(10).weight,
            Some(71.2)
        );
    }

    #[test]
    fn test_emptied_day_row_is_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.db");
        let db = Database::open(&path).unwrap();
        let md = MonthDay::new(2021, 1, 5);
        db.set_day(md, weight(70.0)).unwrap();
        db.commit().unwrap();
        db.set_day(md, DayRecord::default()).unwrap();
        db.commit().unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        assert!(db.month(md.month()).unwrap().day(5).is_empty());
    }

    #[test]
    fn test_weight_extrema_fat_filter_example() {
        // Store with 2021-01-05 = 70.0 and 2021-01-20 = 68.5 carrying a
        // fat measurement of the same value.
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        db.set_day(MonthDay::new(2021, 1, 20), weight_fat(68.5, 68.5))
            .unwrap();

        let from = MonthDay::new(2021, 1, 1);
        let to = MonthDay::new(2021, 1, 31);
        assert_eq!(
            db.weight_extrema(from, to, false).unwrap(),
            Some((68.5, 70.0))
        );
        assert_eq!(
            db.weight_extrema(from, to, true).unwrap(),
            Some((68.5, 68.5))
        );
    }

    #[test]
    fn test_weight_extrema_never_uses_fatless_days() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(120.0)).unwrap();
        db.set_day(MonthDay::new(2021, 2, 10), weight_fat(68.0, 20.0))
            .unwrap();
        db.set_day(MonthDay::new(2021, 3, 1), weight(10.0)).unwrap();

        let got = db
            .weight_extrema(
                MonthDay::new(2021, 1, 1),
                MonthDay::new(2021, 3, 31),
                true,
            )
            .unwrap();
        // Bounds derive from the single fat day only.
        assert_eq!(got, Some((20.0, 20.0)));
    }

    #[test]
    fn test_weight_extrema_empty_range_sentinel() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        assert_eq!(
            db.weight_extrema(MonthDay::new(2022, 1, 1), MonthDay::new(2022, 1, 31), false)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_neighbor_queries_cross_months_and_stay_in_bounds() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2020, 11, 28), weight(72.0)).unwrap();
        db.set_day(MonthDay::new(2021, 2, 3), weight_fat(70.0, 22.0))
            .unwrap();

        // Backward across two empty months.
        let (md, rec) = db
            .day_with_weight_before(MonthDay::new(2021, 2, 3), false)
            .unwrap()
            .unwrap();
        assert_eq!(md, MonthDay::new(2020, 11, 28));
        assert_eq!(rec.weight, Some(72.0));

        // Forward from before the populated range.
        let (md, _) = db
            .day_with_weight_after(MonthDay::new(2019, 1, 1), true)
            .unwrap()
            .unwrap();
        assert_eq!(md, MonthDay::new(2021, 2, 3));

        // Nothing before the earliest qualifying day.
        assert!(db
            .day_with_weight_before(MonthDay::new(2020, 11, 28), false)
            .unwrap()
            .is_none());
        // Nothing after the latest qualifying day.
        assert!(db
            .day_with_weight_after(MonthDay::new(2021, 2, 3), false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_data_bounds_filters() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(
            MonthDay::new(2020, 12, 1),
            DayRecord {
                note: Some("start".into()),
                ..Default::default()
            },
        )
        .unwrap();
        db.set_day(MonthDay::new(2021, 1, 10), weight(70.0)).unwrap();
        db.set_day(MonthDay::new(2021, 1, 20), weight_fat(69.0, 21.0))
            .unwrap();

        assert_eq!(
            db.data_bounds(Filter::None).unwrap(),
            Some((MonthDay::new(2020, 12, 1), MonthDay::new(2021, 1, 20)))
        );
        assert_eq!(
            db.data_bounds(Filter::Weight).unwrap(),
            Some((MonthDay::new(2021, 1, 10), MonthDay::new(2021, 1, 20)))
        );
        assert_eq!(
            db.data_bounds(Filter::WeightAndFat).unwrap(),
            Some((MonthDay::new(2021, 1, 20), MonthDay::new(2021, 1, 20)))
        );
        assert_eq!(db.earliest_weight().unwrap(), Some(70.0));
        assert_eq!(db.latest_weight().unwrap(), Some(69.0));
        assert_eq!(db.earliest_fat_weight().unwrap(), Some(21.0));
    }

    #[test]
    fn test_delete_all_resets_everything() {
        let db = Database::open_in_memory().unwrap();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        db.commit().unwrap();
        db.delete_all().unwrap();

        assert!(db.is_empty().unwrap());
        assert!(db.earliest_month().is_none());
        let part = db.month(MonthId::new(2021, 1)).unwrap();
        assert!(part.day(5).is_empty());
    }

    #[test]
    fn test_change_notification_on_commit() {
        let db = Database::open_in_memory().unwrap();
        let mut rx = db.subscribe();
        db.set_day(MonthDay::new(2021, 1, 5), weight(70.0)).unwrap();
        db.commit().unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Committed);

        db.delete_all().unwrap();
        assert_eq!(rx.try_recv().unwrap(), StoreChange::Cleared);
    }

    #[test]
    fn test_writes_rejected_until_upgrade() {
        let db = Database::open_with_sql(
            "CREATE TABLE days (
                 monthday INTEGER PRIMARY KEY,
                 weight   REAL,
                 flags    INTEGER NOT NULL DEFAULT 0
             );
             INSERT INTO days (monthday, weight, flags) VALUES (776225, 70.5, 0);",
        )
        .unwrap();
        assert!(db.needs_upgrade());

        // Reads work against the legacy layout.
        let md = MonthDay(776225);
        let part = db.month(md.month()).unwrap();
        assert_eq!(part.day(md.day()).weight, Some(70.5));

        let err = db.set_day(md, weight(71.0)).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { found: 1, .. }));

        db.upgrade().unwrap();
        assert!(!db.needs_upgrade());
        db.set_day(md.next(), weight_fat(70.0, 21.0)).unwrap();
        db.commit().unwrap();
    }

    #[test]
    fn test_energy_equivalents_replace_on_save() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_energy_equivalents().unwrap().is_empty());

        let first = vec![
            EnergyEquivalent {
                name: "Walking".into(),
                unit: "minute".into(),
                value: 4.2,
            },
            EnergyEquivalent {
                name: "Cycling".into(),
                unit: "minute".into(),
                value: 8.0,
            },
        ];
        db.save_energy_equivalents(&first).unwrap();
        assert_eq!(db.load_energy_equivalents().unwrap(), first);

        let second = vec![EnergyEquivalent {
            name: "Swimming".into(),
            unit: "minute".into(),
            value: 9.5,
        }];
        db.save_energy_equivalents(&second).unwrap();
        assert_eq!(db.load_energy_equivalents().unwrap(), second);
    }

    #[test]
    fn test_uncommitted_changes_visible_through_cache() {
        let db = Database::open_in_memory().unwrap();
        let md = MonthDay::new(2021, 1, 5);
        db.set_day(md, weight(70.0)).unwrap();
        // Same partition instance, so the uncommitted write is observable.
        assert_eq!(db.month(md.month()).unwrap().day(5).weight, Some(70.0));
        assert_eq!(
            db.weight_extrema(md, md, false).unwrap(),
            Some((70.0, 70.0))
        );
    }
}

//! Point generation: one scale/trend pair and one flag entry per day
//!
//! Both arrays are dense, indexed by day offset from the start of the range.
//! Days without a qualifying measurement contribute `None`, never an
//! interpolated value. The trend is a trailing exponentially weighted moving
//! average over measured days only; missing days do not advance it.

use crate::error::Result;
use crate::graph::geometry::ChartParameters;
use crate::store::Database;
use crate::types::{DayRecord, MonthDay};

/// Smoothing factor for the trailing moving average.
pub const TREND_SMOOTHING: f32 = 0.1;

/// Category bits recorded per day for overlay rendering. User mark bits
/// occupy the high nibble.
pub mod flag_bits {
    /// Day carries a fat measurement.
    pub const FAT: u8 = 0x01;
    /// Day is today.
    pub const TODAY: u8 = 0x02;
    /// Day has a note attached.
    pub const NOTE: u8 = 0x04;
    /// User marks are shifted into the high nibble.
    pub const MARK_SHIFT: u32 = 4;
}

/// Pixel-space points for one day. `None` marks an absent measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GraphPoint {
    /// Raw measurement mapped through the chart transform.
    pub scale: Option<(f32, f32)>,
    /// Smoothed trend mapped through the chart transform.
    pub trend: Option<(f32, f32)>,
}

/// Per-day overlay bits, parallel to the point array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlagPoint {
    /// X pixel coordinate of the day column center.
    pub x: f32,
    /// Category bits, see [`flag_bits`].
    pub bits: u8,
}

/// The dense arrays produced for one render, plus the anchor points just
/// outside the range that let the trend line run to the chart edges.
#[derive(Debug, Clone, Default)]
pub struct PointSeries {
    /// One entry per day in `[begin, end]`.
    pub points: Vec<GraphPoint>,
    /// Parallel flag entries, same length as `points`.
    pub flags: Vec<FlagPoint>,
    /// Nearest qualifying day before the range, transformed.
    pub head: Option<(f32, f32)>,
    /// Nearest qualifying day after the range, transformed.
    pub tail: Option<(f32, f32)>,
}

fn day_bits(record: &DayRecord, is_today: bool) -> u8 {
    let mut bits = 0u8;
    if record.fat_weight.is_some() {
        bits |= flag_bits::FAT;
    }
    if is_today {
        bits |= flag_bits::TODAY;
    }
    if record.note.is_some() {
        bits |= flag_bits::NOTE;
    }
    bits | (record.flags.0 << flag_bits::MARK_SHIFT)
}

/// Walk `[begin, end]` and build the dense point and flag arrays.
pub fn generate_points(
    db: &Database,
    begin: MonthDay,
    end: MonthDay,
    params: &ChartParameters,
) -> Result<PointSeries> {
    let only_fat = params.show_fat_weight;
    let day_count = begin.days_until(end) + 1;
    if day_count <= 0 {
        return Ok(PointSeries::default());
    }

    let mut series = PointSeries {
        points: Vec::with_capacity(day_count as usize),
        flags: Vec::with_capacity(day_count as usize),
        head: None,
        tail: None,
    };

    // Seed the trend from the nearest measured day before the range so the
    // line enters the chart at the right height.
    let mut trend: Option<f32> = None;
    if let Some((md, rec)) = db.day_with_weight_before(begin, only_fat)? {
        let value = rec.scan_weight(only_fat).expect("qualifying day has value");
        let offset = begin.days_until(md) as f32;
        series.head = Some(params.transform.apply(offset, value));
        trend = Some(value);
    }

    let today = MonthDay::today();
    let mut md = begin;
    let mut month = db.month(md.month())?;
    for index in 0..day_count {
        if md.month() != month.month() {
            month = db.month(md.month())?;
        }
        let record = month.day(md.day());

        let point = match record.scan_weight(only_fat) {
            Some(value) => {
                let t = match trend {
                    None => value,
                    Some(t) => t + TREND_SMOOTHING * (value - t),
                };
                trend = Some(t);
                GraphPoint {
                    scale: Some(params.transform.apply(index as f32, value)),
                    trend: Some(params.transform.apply(index as f32, t)),
                }
            }
            None => GraphPoint::default(),
        };
        series.points.push(point);
        series.flags.push(FlagPoint {
            x: params.transform.apply(index as f32, 0.0).0,
            bits: day_bits(&record, md == today),
        });

        md = md.next();
    }

    if let Some((md, rec)) = db.day_with_weight_after(end, only_fat)? {
        let value = rec.scan_weight(only_fat).expect("qualifying day has value");
        let offset = begin.days_until(md) as f32;
        series.tail = Some(params.transform.apply(offset, value));
    }

    Ok(series)
}

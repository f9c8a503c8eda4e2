//! Chart geometry: weight bounds, grid increments, the day/weight → pixel
//! transform
//!
//! `prepare_view_info` is a pure function of the store's current contents and
//! the requested view: given the same data and parameters it always produces
//! the same geometry. It must run before point generation.

use crate::error::Result;
use crate::store::Database;
use crate::types::{Filter, MonthDay, PixelSize};

/// Default width of one day column in pixels; callers derive how many days
/// fit in a view from this.
pub const DAY_WIDTH: f32 = 8.0;

/// Candidate grid increments, in ascending order.
const GRID_INCREMENTS: [f32; 8] = [0.5, 1.0, 2.0, 2.5, 5.0, 10.0, 20.0, 50.0];

/// Aim for roughly this many horizontal grid bands.
const TARGET_GRID_BANDS: f32 = 8.0;

/// Weight band drawn when the store has no qualifying data.
const EMPTY_BAND: (f32, f32) = (60.0, 80.0);

/// Affine map from (day index, weight) to pixel coordinates:
/// `x' = sx * day + tx`, `y' = sy * weight + ty`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Affine {
    pub sx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Affine {
    /// Apply the map to a (day index, weight) pair.
    pub fn apply(&self, day: f32, weight: f32) -> (f32, f32) {
        (self.sx * day + self.tx, self.sy * weight + self.ty)
    }
}

/// Everything image synthesis needs to place marks on the raster.
#[derive(Debug, Clone)]
pub struct ChartParameters {
    /// Smallest qualifying weight in the store.
    pub min_weight: f32,
    /// Largest qualifying weight in the store.
    pub max_weight: f32,
    /// Bottom grid line, a multiple of the increment at or below
    /// `min_weight`.
    pub grid_min_weight: f32,
    /// Top grid line.
    pub grid_max_weight: f32,
    /// Spacing between horizontal grid lines, in weight units.
    pub grid_increment: f32,
    /// Pixels per day.
    pub scale_x: f32,
    /// Pixels per weight unit.
    pub scale_y: f32,
    /// (day index, weight) → pixel map.
    pub transform: Affine,
    /// Earliest day matching the active filter, if any.
    pub earliest: Option<MonthDay>,
    /// Latest day matching the active filter, if any.
    pub latest: Option<MonthDay>,
    /// Set when the store holds no qualifying day; the view layer draws
    /// its warning from this.
    pub draw_no_data_warning: bool,
    /// Chart plots fat weights instead of scale weights.
    pub show_fat_weight: bool,
}

/// Compute chart geometry for a view of `day_count` days at `size`.
pub fn prepare_view_info(
    db: &Database,
    size: PixelSize,
    day_count: usize,
    show_fat: bool,
) -> Result<ChartParameters> {
    let filter = if show_fat {
        Filter::WeightAndFat
    } else {
        Filter::Weight
    };
    let bounds = db.data_bounds(filter)?;
    let extrema = match bounds {
        Some((lo, hi)) => db.weight_extrema(lo, hi, show_fat)?,
        None => None,
    };

    let (min_weight, max_weight, no_data) = match extrema {
        Some((lo, hi)) => (lo, hi, false),
        None => (EMPTY_BAND.0, EMPTY_BAND.1, true),
    };

    let grid_increment = grid_increment_for(max_weight - min_weight);
    // Half an increment of margin on each side, snapped to the grid.
    let grid_min_weight =
        ((min_weight - 0.5 * grid_increment) / grid_increment).floor() * grid_increment;
    let grid_max_weight =
        ((max_weight + 0.5 * grid_increment) / grid_increment).ceil() * grid_increment;

    let scale_x = size.width as f32 / day_count.max(1) as f32;
    let scale_y = size.height as f32 / (grid_max_weight - grid_min_weight);
    let transform = Affine {
        sx: scale_x,
        // Pixel y grows downward; weight grows upward.
        sy: -scale_y,
        tx: 0.5 * scale_x,
        ty: grid_max_weight * scale_y,
    };

    Ok(ChartParameters {
        min_weight,
        max_weight,
        grid_min_weight,
        grid_max_weight,
        grid_increment,
        scale_x,
        scale_y,
        transform,
        earliest: bounds.map(|(lo, _)| lo),
        latest: bounds.map(|(_, hi)| hi),
        draw_no_data_warning: no_data,
        show_fat_weight: show_fat,
    })
}

/// Smallest candidate increment yielding at most `TARGET_GRID_BANDS` bands
/// over `span`.
fn grid_increment_for(span: f32) -> f32 {
    let raw = if span > 0.0 {
        span / TARGET_GRID_BANDS
    } else {
        0.0
    };
    for inc in GRID_INCREMENTS {
        if inc >= raw {
            return inc;
        }
    }
    *GRID_INCREMENTS.last().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayRecord, MonthDay};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (day, w) in [(5u32, 70.0f32), (12, 68.2), (20, 71.4)] {
            db.set_day(
                MonthDay::new(2021, 1, day),
                DayRecord {
                    weight: Some(w),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_grid_increment_selection() {
        assert_eq!(grid_increment_for(0.0), 0.5);
        assert_eq!(grid_increment_for(3.2), 0.5);
        assert_eq!(grid_increment_for(10.0), 2.0);
        assert_eq!(grid_increment_for(36.0), 5.0);
        assert_eq!(grid_increment_for(1000.0), 50.0);
    }

    #[test]
    fn test_prepare_pads_to_grid() {
        let db = seeded();
        let p = prepare_view_info(&db, PixelSize::new(320, 200), 40, false).unwrap();
        assert!(!p.draw_no_data_warning);
        assert_eq!(p.min_weight, 68.2);
        assert_eq!(p.max_weight, 71.4);
        assert!(p.grid_min_weight < p.min_weight);
        assert!(p.grid_max_weight > p.max_weight);
        // Grid bounds sit on increment multiples.
        let steps = (p.grid_max_weight - p.grid_min_weight) / p.grid_increment;
        assert!((steps - steps.round()).abs() < 1e-4);
        assert_eq!(p.earliest, Some(MonthDay::new(2021, 1, 5)));
        assert_eq!(p.latest, Some(MonthDay::new(2021, 1, 20)));
    }

    #[test]
    fn test_transform_orientation() {
        let db = seeded();
        let size = PixelSize::new(320, 200);
        let p = prepare_view_info(&db, size, 40, false).unwrap();

        // Bottom grid line maps to the bottom edge, top to the top edge.
        let (_, y_bottom) = p.transform.apply(0.0, p.grid_min_weight);
        let (_, y_top) = p.transform.apply(0.0, p.grid_max_weight);
        assert!((y_bottom - size.height as f32).abs() < 1e-3);
        assert!(y_top.abs() < 1e-3);

        // Day zero centers within its column.
        let (x, _) = p.transform.apply(0.0, p.grid_min_weight);
        assert!((x - 0.5 * p.scale_x).abs() < 1e-3);
    }

    #[test]
    fn test_empty_store_sets_warning_flag() {
        let db = Database::open_in_memory().unwrap();
        let p = prepare_view_info(&db, PixelSize::new(320, 200), 40, false).unwrap();
        assert!(p.draw_no_data_warning);
        assert!(p.earliest.is_none());
        assert!(p.grid_max_weight > p.grid_min_weight);
    }

    #[test]
    fn test_deterministic_for_same_state() {
        let db = seeded();
        let a = prepare_view_info(&db, PixelSize::new(320, 200), 40, false).unwrap();
        let b = prepare_view_info(&db, PixelSize::new(320, 200), 40, false).unwrap();
        assert_eq!(a.transform, b.transform);
        assert_eq!(a.grid_increment, b.grid_increment);
    }

    #[test]
    fn test_fat_filter_changes_bounds() {
        let db = seeded();
        db.set_day(
            MonthDay::new(2021, 1, 25),
            DayRecord {
                weight: Some(70.5),
                fat_weight: Some(21.0),
                ..Default::default()
            },
        )
        .unwrap();
        let p = prepare_view_info(&db, PixelSize::new(320, 200), 40, true).unwrap();
        assert!(p.show_fat_weight);
        assert_eq!(p.min_weight, 21.0);
        assert_eq!(p.max_weight, 21.0);
        assert_eq!(p.earliest, Some(MonthDay::new(2021, 1, 25)));
    }
}

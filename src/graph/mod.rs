//! Concurrent, cancellable chart rendering
//!
//! The pipeline runs in three stages, with a cancellation checkpoint at each
//! boundary:
//!
//! ```text
//! prepare_view_info ──▶ generate_points ──▶ synthesize
//!   (geometry)      ✂     (day arrays)   ✂    (raster)
//! ```
//!
//! [`JobQueue`] admits [`RenderJob`]s to a bounded worker pool and coalesces
//! superseded requests through a monotonic generation floor: when the view
//! resizes or scrolls, `flush` raises the floor and every older in-flight
//! render cancels at its next checkpoint instead of delivering a stale image.

mod geometry;
mod image;
mod job;
mod points;
mod queue;

pub use geometry::{prepare_view_info, Affine, ChartParameters, DAY_WIDTH};
pub use image::{synthesize, ChartImage, GoalLine, RenderOptions};
pub use job::{JobOutcome, JobState, RenderJob, RenderRequest};
pub use points::{
    flag_bits, generate_points, FlagPoint, GraphPoint, PointSeries, TREND_SMOOTHING,
};
pub use queue::{JobQueue, JobQueueConfig, QueueStats, RenderObserver};

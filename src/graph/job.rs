//! Render job state machine
//!
//! A job is plain data — a day range, a pixel size, display options, and a
//! coalescing index — plus the pure pipeline that turns store contents into
//! an image: geometry, point generation, synthesis. Cancellation is
//! cooperative: the job consults its own cancel flag and the queue's
//! generation floor at each stage boundary and stops without delivering.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RenderError;
use crate::graph::geometry::prepare_view_info;
use crate::graph::image::{synthesize, ChartImage, RenderOptions};
use crate::graph::points::generate_points;
use crate::store::Database;
use crate::types::{MonthDay, PixelSize};

/// Everything a render binds at construction.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// First day of the range, inclusive.
    pub begin: MonthDay,
    /// Last day of the range, inclusive.
    pub end: MonthDay,
    /// Target raster size.
    pub size: PixelSize,
    /// Display switches and overlay data.
    pub options: RenderOptions,
    /// Coalescing sequence index; `JobQueue::flush` cancels every job below
    /// its threshold.
    pub index: u64,
}

/// Job lifecycle. Terminal states never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Admitted, not yet running.
    Queued,
    /// Executing the render pipeline.
    Running,
    /// Finished and produced an image.
    Completed,
    /// Stopped at a checkpoint; no delivery happens.
    Cancelled,
    /// The store failed mid-pipeline; the error is delivered once.
    Failed,
}

/// Terminal result delivered to the observer. Cancelled jobs deliver
/// nothing.
#[derive(Debug)]
pub enum JobOutcome {
    /// The finished raster.
    Completed(ChartImage),
    /// The pipeline failed; never retried automatically.
    Failed(RenderError),
}

/// One asynchronous chart render.
pub struct RenderJob {
    db: Arc<Database>,
    request: RenderRequest,
    cancelled: AtomicBool,
    state: Mutex<JobState>,
}

impl RenderJob {
    /// Bind a request to a store.
    pub fn new(db: Arc<Database>, request: RenderRequest) -> Self {
        Self {
            db,
            request,
            cancelled: AtomicBool::new(false),
            state: Mutex::new(JobState::Queued),
        }
    }

    /// The bound request.
    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    /// Coalescing index.
    pub fn index(&self) -> u64 {
        self.request.index
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Request cancellation; observed at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Checkpoint test: cancelled directly, or superseded by a newer
    /// generation.
    pub(crate) fn is_superseded(&self, floor: &AtomicU64) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.request.index < floor.load(Ordering::Acquire)
    }

    fn set_state(&self, next: JobState) {
        *self.state.lock() = next;
    }

    /// Execute the pipeline. Returns `None` when the job cancels at a
    /// checkpoint; the caller must not deliver anything in that case.
    pub(crate) fn run(&self, floor: &AtomicU64) -> Option<JobOutcome> {
        if self.is_superseded(floor) {
            self.set_state(JobState::Cancelled);
            return None;
        }
        self.set_state(JobState::Running);

        let req = &self.request;
        let day_count = (req.begin.days_until(req.end) + 1).max(0) as usize;

        let params = match prepare_view_info(
            &self.db,
            req.size,
            day_count,
            req.options.show_fat_weight,
        ) {
            Ok(p) => p,
            Err(e) => {
                self.set_state(JobState::Failed);
                return Some(JobOutcome::Failed(e.into()));
            }
        };

        // Checkpoint before point generation.
        if self.is_superseded(floor) {
            self.set_state(JobState::Cancelled);
            return None;
        }

        let series = match generate_points(&self.db, req.begin, req.end, &params) {
            Ok(s) => s,
            Err(e) => {
                self.set_state(JobState::Failed);
                return Some(JobOutcome::Failed(e.into()));
            }
        };

        // Checkpoint before image synthesis.
        if self.is_superseded(floor) {
            self.set_state(JobState::Cancelled);
            return None;
        }

        match synthesize(&params, &series, &req.options, req.begin, req.size) {
            Ok(image) => {
                self.set_state(JobState::Completed);
                Some(JobOutcome::Completed(image))
            }
            Err(e) => {
                self.set_state(JobState::Failed);
                Some(JobOutcome::Failed(e))
            }
        }
    }
}

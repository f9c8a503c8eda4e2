//! # scalelog
//!
//! A personal weight log: daily scale and body-fat measurements in a
//! month-partitioned persistent store, plus an asynchronous pipeline that
//! renders day ranges into chart images.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌──────────────┐  month(id)  ┌──────────────┐
//! │  view layer  │───────────▶│   JobQueue   │────────────▶│   Database   │
//! │  (external)  │            │  RenderJobs  │             │  MonthCache  │
//! └──────────────┘◀───────────└──────────────┘             └──────┬───────┘
//!      outcome     exactly once                                   │ commit
//!                                                          ┌──────▼───────┐
//!                                                          │    SQLite    │
//!                                                          └──────────────┘
//! ```
//!
//! Writers record day changes through [`store::Database::set_day`] and make
//! them durable with a batched, all-or-nothing
//! [`commit`](store::Database::commit). Render jobs read the same month
//! cache, run off the interactive path on blocking workers, and cancel
//! cooperatively when a newer request supersedes them.
//!
//! # Example
//!
//! ```rust,ignore
//! use scalelog::store::Database;
//! use scalelog::types::{DayRecord, MonthDay};
//!
//! let db = Database::open("weights.db")?;
//! db.set_day(
//!     MonthDay::new(2021, 1, 5),
//!     DayRecord { weight: Some(70.0), ..Default::default() },
//! )?;
//! db.commit()?;
//! ```

pub mod error;
pub mod graph;
pub mod store;
pub mod types;

pub use error::{RenderError, StoreError};
pub use graph::{JobQueue, RenderJob, RenderObserver, RenderRequest};
pub use store::{Database, StoreChange};
pub use types::{DayFlags, DayRecord, Filter, MonthDay, MonthId};

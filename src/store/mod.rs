//! Month-partitioned persistent storage
//!
//! This module holds the durable half of the crate:
//!
//! - **Database**: SQLite-backed store plus the month cache (`database.rs`)
//! - **MonthPartition**: one cached month of day records (`month.rs`)
//! - **RangeIterator**: chronological cursor over recorded days (`iterator.rs`)
//! - **Schema**: table layout, version detection, upgrade (`schema.rs`)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  month(id)   ┌──────────────────┐  load on miss  ┌─────────┐
//! │  callers   │─────────────▶│    MonthCache    │───────────────▶│ SQLite  │
//! │ (writers,  │              │ MonthId → Arc<   │                │  days   │
//! │  renders)  │◀─────────────│  MonthPartition> │◀───commit()────│  table  │
//! └────────────┘  shared Arc  └──────────────────┘  one txn       └─────────┘
//! ```

mod database;
mod iterator;
mod month;
mod schema;

pub use database::{Database, StoreChange};
pub use iterator::RangeIterator;
pub use month::{MonthPartition, DAYS_PER_PARTITION};
pub use schema::SCHEMA_VERSION;

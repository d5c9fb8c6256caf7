//! Batch ranking pipeline
//!
//! Loads a universe, fetches every entity through a [`DataProvider`] with
//! bounded concurrency, then scores, normalizes and ranks the batch in one
//! synchronous pass.
//!
//! [`DataProvider`]: ranker_core::DataProvider

pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod universe;


pub use pipeline::{PipelineOptions, RankingPipeline, DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT};
pub use report::{sector_leaders, Exclusion, ExclusionReason, RankedRecord, RunReport, SectorLeader};
pub use snapshot::SnapshotProvider;
pub use universe::{default_universe, from_symbols, load_universe_csv, parse_universe_csv, UniverseEntry};

//! # chunkagg
//!
//! A chunked parallel aggregation engine. An ordered sequence of numeric
//! records is split into fixed-size chunks, each chunk is reduced to a partial
//! aggregate (sum, min, max, even and odd counts) on its own worker, and the
//! partials are merged in chunk order into a result identical to a sequential
//! single pass.
//!
//! ## Usage
//!
//! ```bash
//! chunkagg run --start 1 --end 1000000 --chunk-size 250000 [--max-workers 4] [--verify]
//! ```
//!
//! ## Modules
//!
//! - `engine` - Partitioner, workers, execution coordinator and merge
//! - `config` - Engine configuration from defaults, TOML and environment
//! - `app` - Logging setup and fatal error handling for the binary
//! - `cli` - Command-line argument parsing and command routing
pub mod app;
pub mod cli;
pub mod config;
pub mod engine;

pub use config::{EngineConfig, NumberDomain, Parallelism};
pub use engine::{
    AggregationEngine, AggregationError, AggregationReport, AggregationResult, FinalAggregate,
    PartialAggregate, Record,
};

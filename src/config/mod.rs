//! Engine configuration
//!
//! Settings come from three layers, lowest priority first: defaults, a TOML
//! file, and `CHUNKAGG_*` environment variables. Command-line flags are
//! applied on top by the binary.

pub mod loader;


pub use loader::ConfigLoader;

use crate::engine::errors::{AggregationError, AggregationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_CHUNK_SIZE: &str = "CHUNKAGG_CHUNK_SIZE";
pub const ENV_MAX_WORKERS: &str = "CHUNKAGG_MAX_WORKERS";
pub const ENV_TIMEOUT: &str = "CHUNKAGG_TIMEOUT";

/// How many workers may run at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// One worker per chunk, all started together
    #[default]
    PerChunk,
    /// At most this many workers at a time
    Bounded(usize),
}

impl Parallelism {
    /// Concurrent workers to use for a run of `chunk_count` chunks
    pub fn max_workers(&self, chunk_count: usize) -> usize {
        match self {
            Self::PerChunk => chunk_count,
            Self::Bounded(limit) => (*limit).min(chunk_count),
        }
    }
}

/// Inclusive range of acceptable `Number` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberDomain {
    pub min: i64,
    pub max: i64,
}

impl NumberDomain {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, number: i64) -> bool {
        (self.min..=self.max).contains(&number)
    }

    /// Describe why `number` is outside the domain, if it is
    pub fn violation(&self, number: i64) -> Option<String> {
        if number < self.min {
            Some(format!("below domain minimum {}", self.min))
        } else if number > self.max {
            Some(format!("above domain maximum {}", self.max))
        } else {
            None
        }
    }
}

/// Configuration for one aggregation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Records per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overall limit on the join barrier
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    /// Reject records whose ID does not strictly exceed the previous record's,
    /// chunk boundaries included
    #[serde(default)]
    pub validate_record_order: bool,

    /// Worker fan-out policy
    #[serde(default)]
    pub parallelism: Parallelism,

    /// Reject records whose number falls outside this range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_domain: Option<NumberDomain>,
}

fn default_chunk_size() -> usize {
    250_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            timeout: None,
            validate_record_order: false,
            parallelism: Parallelism::default(),
            number_domain: None,
        }
    }
}

impl EngineConfig {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_max_workers(self, workers: usize) -> Self {
        self.with_parallelism(Parallelism::Bounded(workers))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_number_domain(mut self, domain: NumberDomain) -> Self {
        self.number_domain = Some(domain);
        self
    }

    pub fn with_record_order_validation(mut self, enabled: bool) -> Self {
        self.validate_record_order = enabled;
        self
    }

    /// Check every field, returning the first problem found
    pub fn validate(&self) -> AggregationResult<()> {
        if self.chunk_size == 0 {
            return Err(AggregationError::invalid_config(
                "chunk_size",
                self.chunk_size,
                "must be a positive integer",
            ));
        }

        if self.parallelism == Parallelism::Bounded(0) {
            return Err(AggregationError::invalid_config(
                "parallelism",
                "bounded(0)",
                "worker pool needs at least one worker",
            ));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(AggregationError::invalid_config(
                "timeout",
                "0s",
                "timeout must be greater than zero",
            ));
        }

        if let Some(domain) = self.number_domain {
            if domain.min > domain.max {
                return Err(AggregationError::invalid_config(
                    "number_domain",
                    format!("{}..={}", domain.min, domain.max),
                    "min must not exceed max",
                ));
            }
        }

        Ok(())
    }

    /// Overlay `CHUNKAGG_*` variables from the process environment
    pub fn merge_env_vars(&mut self) -> AggregationResult<()> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay `CHUNKAGG_*` variables using a custom lookup
    pub fn merge_env_with<F>(&mut self, lookup: F) -> AggregationResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_count(ENV_CHUNK_SIZE, &raw)?;
        }

        if let Some(raw) = lookup(ENV_MAX_WORKERS) {
            self.parallelism = Parallelism::Bounded(parse_count(ENV_MAX_WORKERS, &raw)?);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.timeout = Some(parse_duration(ENV_TIMEOUT, &raw)?);
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> AggregationResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AggregationError::invalid_config("config", "<engine>", e.to_string()))
    }
}

fn parse_count(field: &str, raw: &str) -> AggregationResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| AggregationError::invalid_config(field, raw, e.to_string()))
}

/// Parse a humantime duration such as `30s` or `1m 30s`
pub fn parse_duration(field: &str, raw: &str) -> AggregationResult<Duration> {
    humantime_serde::re::humantime::parse_duration(raw.trim())
        .map_err(|e| AggregationError::invalid_config(field, raw, e.to_string()))
}

//! Application configuration
//!
//! Settings that belong to the process rather than to an aggregation run.

/// Application configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,tokio=debug",
        }
    }
}

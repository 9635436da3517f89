//! Tunables for the chunk cache and its sweeper.
use crate::error::{Result, StreamError};
use std::time::Duration;

/// Default number of bytes fetched per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 51_200;
/// Default interval between two sweeps.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(30);
/// Default read inactivity after which a stream no longer keeps its cache entry alive.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(180);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    /// Chunk size used by streams opened without an explicit size.
    pub chunk_size: usize,
    pub sweep_period: Duration,
    pub idle_threshold: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sweep_period: DEFAULT_SWEEP_PERIOD,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

impl CacheOptions {
    #[must_use]
    pub fn chunk_size(self, chunk_size: usize) -> Self {
        CacheOptions { chunk_size, ..self }
    }

    #[must_use]
    pub fn sweep_period(self, sweep_period: Duration) -> Self {
        CacheOptions {
            sweep_period,
            ..self
        }
    }

    #[must_use]
    pub fn idle_threshold(self, idle_threshold: Duration) -> Self {
        CacheOptions {
            idle_threshold,
            ..self
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_chunk_size(self.chunk_size)?;
        if self.sweep_period.is_zero() {
            return Err(StreamError::InvalidConfig(
                "sweep period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(StreamError::InvalidConfig(
            "chunk size must be positive".to_string(),
        ));
    }
    Ok(())
}

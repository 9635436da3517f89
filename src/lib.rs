//! Seekable read-only streams over HTTP resources, backed by a chunk cache shared between streams.

//! ## Usage example
//!
//! ```
//! use http_chunk_stream::*;
//!
//! # #[cfg(feature = "reqwest-sync")]
//! # fn read() -> Result<()> {
//! use std::io::{Read, Seek, SeekFrom};
//! let cache = HttpStreamCache::with_options(CacheOptions::default().chunk_size(1024))?;
//! let mut stream = cache.open("https://flatgeobuf.org/test/data/countries.fgb")?;
//! let mut magic = [0; 3];
//! stream.read_exact(&mut magic)?;
//! assert_eq!(&magic, b"fgb");
//!
//! // Another stream on the same URL reads from the cached chunk - no HTTP request!
//! let mut other = cache.open("https://flatgeobuf.org/test/data/countries.fgb")?;
//! other.seek(SeekFrom::Start(3))?;
//! let mut version = [0; 1];
//! other.read_exact(&mut version)?;
//! assert_eq!(version, [3]);
//! # Ok(())
//! # }
//! ```
//!
//! Chunks of a URL are dropped by a background sweep once every stream on it
//! has been idle for longer than the configured idle threshold.

#[macro_use]
extern crate log;

mod chunk_cache;
mod config;
pub mod download;
mod error;
mod range_client;
mod registry;
#[cfg(feature = "reqwest-sync")]
mod reqwest_client;
mod stream;
mod stream_cache;
mod sweeper;
#[cfg(test)]
mod test_util;
#[cfg(feature = "ureq-sync")]
mod ureq_client;

pub use chunk_cache::{ChunkCache, ChunkEntry, ChunkKey};
pub use config::*;
pub use error::*;
pub use range_client::*;
pub use registry::{InstanceId, InstanceInfo, InstanceRegistry};
pub use stream::{aligned_start, chunk_index, ChunkedStream};
pub use stream_cache::StreamCache;
pub use sweeper::expire_idle;

#[cfg(feature = "reqwest-sync")]
pub use crate::reqwest_client::{HttpChunkedStream, HttpStreamCache};
#[cfg(feature = "ureq-sync")]
pub use crate::ureq_client::{UreqChunkedStream, UreqStreamCache};

//! Whole-file downloads built on [`RangeFetcher`].
//!
//! These helpers share nothing with the chunk cache: every call probes the
//! resource and streams it straight to disk.
use crate::config::validate_chunk_size;
use crate::error::{Result, StreamError};
use crate::range_client::{RangeFetcher, SyncHttpRangeClient};
use parking_lot::Mutex;
use std::cmp::min;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

/// True if a HEAD request on `url` succeeds.
pub fn exists<T: SyncHttpRangeClient>(fetcher: &RangeFetcher<T>, url: &str) -> bool {
    match fetcher.client().head_response_header(url, "content-length") {
        Ok(_) => true,
        Err(e) => {
            debug!("HEAD {} failed: {}", url, e);
            false
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".new");
    PathBuf::from(name)
}

/// True if `path` holds the current version of `url`: same length, written
/// after the server's `Last-Modified`.
///
/// A missing or unparsable `Last-Modified` always counts as changed.
fn is_up_to_date<T: SyncHttpRangeClient>(
    fetcher: &RangeFetcher<T>,
    url: &str,
    path: &Path,
    length: u64,
) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return false,
    };
    if metadata.len() != length {
        return false;
    }
    let last_modified = match fetcher.client().head_response_header(url, "last-modified") {
        Ok(Some(value)) => value,
        _ => return false,
    };
    match (
        httpdate::parse_http_date(&last_modified),
        metadata.modified(),
    ) {
        (Ok(remote), Ok(local)) => {
            debug!(
                "{}: last-modified {} vs local {}",
                url,
                last_modified,
                httpdate::fmt_http_date(local)
            );
            remote < local
        }
        _ => false,
    }
}

/// Download `url` to `path` sequentially, `chunk_size` bytes per request.
///
/// Skipped when `path` already has the resource's length and is newer than its
/// `Last-Modified`. Otherwise bytes go to `<path>.new`, which replaces `path`
/// only once complete. Returns the length of the file at `path`.
pub fn download_to_file<T: SyncHttpRangeClient, P: AsRef<Path>>(
    fetcher: &RangeFetcher<T>,
    url: &str,
    path: P,
    chunk_size: usize,
) -> Result<u64> {
    validate_chunk_size(chunk_size)?;
    let path = path.as_ref();
    let length = fetcher.head_length(url)?;
    if is_up_to_date(fetcher, url, path, length) {
        info!("{} is up to date with {}", path.display(), url);
        return Ok(length);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let written = (|| -> Result<u64> {
        let mut file = BufWriter::new(File::create(&partial)?);
        let mut begin = 0;
        while begin < length {
            let end = min(length, begin + chunk_size as u64);
            let bytes = fetcher.get_range(url, begin, end)?;
            file.write_all(&bytes)?;
            begin = end;
        }
        file.flush()?;
        Ok(begin)
    })();
    match written {
        Ok(written) => {
            fs::rename(&partial, path)?;
            info!("downloaded {} to {} ({} bytes)", url, path.display(), written);
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Download `url` to `path` with `workers` threads fetching chunks concurrently.
///
/// `<path>.new` is sized up front, each chunk is written at its offset and the
/// file replaces `path` once every chunk arrived. Returns the length of the
/// resource.
pub fn parallel_download<T, P>(
    fetcher: &RangeFetcher<T>,
    url: &str,
    path: P,
    chunk_size: usize,
    workers: usize,
) -> Result<u64>
where
    T: SyncHttpRangeClient + Sync,
    P: AsRef<Path>,
{
    validate_chunk_size(chunk_size)?;
    let path = path.as_ref();
    let length = fetcher.head_length(url)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let chunk_size = chunk_size as u64;
    let chunk_count = length.div_ceil(chunk_size);

    let downloaded = (|| -> Result<()> {
        let file = File::create(&partial)?;
        file.set_len(length)?;
        let file = Mutex::new(file);
        let next_chunk = AtomicU64::new(0);
        let failed = AtomicBool::new(false);

        let download_chunks = || -> Result<()> {
            loop {
                let index = next_chunk.fetch_add(1, Ordering::Relaxed);
                if index >= chunk_count || failed.load(Ordering::Relaxed) {
                    return Ok(());
                }
                let begin = index * chunk_size;
                let end = min(length, begin + chunk_size);
                let bytes = fetcher.get_range(url, begin, end).map_err(|e| {
                    failed.store(true, Ordering::Relaxed);
                    e
                })?;
                let mut file = file.lock();
                file.seek(SeekFrom::Start(begin))?;
                file.write_all(&bytes)?;
            }
        };

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers.max(1))
                .map(|_| scope.spawn(&download_chunks))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(StreamError::HttpError(
                            "download worker panicked".to_string(),
                        ))
                    })
                })
                .collect::<Result<Vec<()>>>()
        })?;
        file.into_inner().sync_all()?;
        Ok(())
    })();

    match downloaded {
        Ok(()) => {
            fs::rename(&partial, path)?;
            info!(
                "downloaded {} to {} ({} bytes, {} chunks)",
                url,
                path.display(),
                length,
                chunk_count
            );
            Ok(length)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

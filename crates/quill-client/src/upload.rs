//! Multipart upload body with byte-level progress reporting.
//!
//! reqwest does not surface upload progress, so the request body is wrapped
//! in a chunked stream that reports cumulative bytes handed to the transport
//! as a 0–100 percentage. The total is always known (the file is in memory),
//! so the percentage is exact and reaches 100 on the final chunk.

use bytes::Bytes;

use crate::transport::ProgressFn;

/// Default size of each body chunk handed to the transport.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Convert a byte count into a 0–100 percentage of `total`.
///
/// An empty file counts as fully transferred.
#[must_use]
pub fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (sent as f64 / total as f64) * 100.0;
    pct.round().min(100.0) as u8
}

/// Build a streaming request body over `content` that invokes `progress`
/// as each chunk is yielded to the HTTP transport.
pub fn progress_body(content: Vec<u8>, chunk_size: usize, progress: ProgressFn) -> reqwest::Body {
    let total = content.len();
    let stream = async_stream::stream! {
        if total == 0 {
            progress(100);
            return;
        }
        let mut sent = 0usize;
        for chunk in content.chunks(chunk_size) {
            sent += chunk.len();
            progress(percent(sent, total));
            yield Ok::<Bytes, std::io::Error>(Bytes::copy_from_slice(chunk));
        }
    };
    reqwest::Body::wrap_stream(stream)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

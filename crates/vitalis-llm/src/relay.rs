use bytes::Bytes;
use futures::StreamExt;

use crate::buffering::CircularLineBuffer;
use crate::traits::ByteStream;

/// Payload of the SSE line that ends a completion stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Watches a byte stream for the `data: [DONE]` line without touching it
pub struct SentinelDetector {
    lines: CircularLineBuffer,
    done: bool,
}

impl SentinelDetector {
    pub fn new() -> Self {
        Self {
            lines: CircularLineBuffer::with_capacity(4096),
            done: false,
        }
    }

    /// Feed the next chunk; returns true once the sentinel has been seen
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.done {
            return true;
        }

        self.lines.extend(bytes);
        while let Some(line) = self.lines.next_line() {
            if let Some(data) = line.strip_prefix("data:") {
                if data.trim() == DONE_SENTINEL {
                    self.done = true;
                    self.lines.clear();
                    break;
                }
            }
        }

        self.done
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Default for SentinelDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay an upstream SSE body byte-for-byte
///
/// Dropping the returned stream (caller went away) drops the upstream
/// response with it, which releases the gateway connection.
pub fn relay(upstream: ByteStream) -> ByteStream {
    Box::pin(async_stream::stream! {
        let mut upstream = upstream;
        let mut detector = SentinelDetector::new();
        let mut relayed: usize = 0;

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    detector.feed(&bytes);
                    relayed += bytes.len();
                    yield Ok::<Bytes, _>(bytes);
                }
                Err(e) => {
                    tracing::warn!(bytes = relayed, "Upstream stream failed: {}", e);
                    yield Err(e);
                    break;
                }
            }
        }

        if detector.is_done() {
            tracing::debug!(bytes = relayed, "Completion stream finished");
        } else {
            tracing::warn!(bytes = relayed, "Upstream stream ended without [DONE]");
        }
    })
}

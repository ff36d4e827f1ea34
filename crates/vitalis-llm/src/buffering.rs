use std::collections::VecDeque;

/// Line buffer over a chunked byte stream
///
/// SSE frames arrive split at arbitrary byte offsets; the buffer keeps the
/// partial tail until the next `\n` shows up.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
    max_line: usize,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            max_line: capacity.max(1) * 16,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);

        // A line this long is not an SSE frame we care about
        if self.buffer.len() > self.max_line && !self.buffer.contains(&b'\n') {
            self.buffer.clear();
        }
    }

    /// Next complete line, trimmed. `None` until a `\n` is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        Some(String::from_utf8_lossy(&line_bytes).trim().to_string())
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_buffer_basic() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\n");

        assert_eq!(buffer.next_line().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap(), "partial line");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_line_is_dropped() {
        let mut buffer = CircularLineBuffer::with_capacity(1);

        buffer.extend(&[b'x'; 64]);
        assert!(buffer.is_empty());
    }
}

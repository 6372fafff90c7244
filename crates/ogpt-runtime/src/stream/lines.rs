//! NDJSON framing over an arbitrary chunked body.

use bytes::{Bytes, BytesMut};

/// Accumulates body chunks and yields complete lines.
///
/// Lines are trimmed and decoded lossily; blank lines are skipped.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &Bytes) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete, non-blank line.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(line_end) = find_newline(&self.buf) {
            let line = self.buf.split_to(line_end);
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }

    /// Whatever is left after the body closed without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buf.split();
        let text = String::from_utf8_lossy(&rest);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_across_chunks() {
        let mut lines = LineBuffer::default();
        lines.push(&Bytes::from_static(b"{\"a\":1}\n{\"b\""));
        assert_eq!(lines.next_line().as_deref(), Some("{\"a\":1}"));
        assert_eq!(lines.next_line(), None);

        lines.push(&Bytes::from_static(b":2}\r\n\n  \n"));
        assert_eq!(lines.next_line().as_deref(), Some("{\"b\":2}"));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn unterminated_tail_is_returned_on_finish() {
        let mut lines = LineBuffer::default();
        lines.push(&Bytes::from_static(b"first\nlast"));
        assert_eq!(lines.next_line().as_deref(), Some("first"));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish().as_deref(), Some("last"));
    }

    #[test]
    fn multibyte_split_is_decoded_once_complete() {
        let mut lines = LineBuffer::default();
        let text = "模型\n".as_bytes();
        lines.push(&Bytes::copy_from_slice(&text[..2]));
        assert_eq!(lines.next_line(), None);
        lines.push(&Bytes::copy_from_slice(&text[2..]));
        assert_eq!(lines.next_line().as_deref(), Some("模型"));
    }
}

use bytes::{Buf, BytesMut};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One server-sent event: optional `event:` name plus its joined `data:` lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental server-sent-event framer.
///
/// Bytes are pushed as they arrive from the transport; complete frames are
/// pulled one at a time with [`next_frame`](Self::next_frame). Only the bytes
/// of the frame in flight are buffered.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    /// Previous line ended in `\r`; a leading `\n` belongs to that terminator
    skip_lf: bool,
    bom_checked: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            event: None,
            data: Vec::new(),
            skip_lf: false,
            bom_checked: false,
        }
    }

    /// Append bytes received from the transport
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete frame, or `None` until more bytes are pushed
    pub fn next_frame(&mut self) -> Option<SseFrame> {
        if !self.strip_bom() {
            return None;
        }

        while let Some(line) = self.next_line() {
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }

        None
    }

    /// Flush at end of input.
    ///
    /// A trailing line without terminator is processed, then any frame still
    /// carrying data is dispatched. Empty frames are dropped.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if let Some(frame) = self.next_frame() {
            return Some(frame);
        }

        if !self.buffer.is_empty() {
            let line = self.buffer.split();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }

        self.dispatch()
    }

    /// Bytes received but not yet consumed as lines
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns false while too few bytes have arrived to rule out a BOM
    fn strip_bom(&mut self) -> bool {
        if self.bom_checked {
            return true;
        }

        let n = self.buffer.len().min(UTF8_BOM.len());
        if self.buffer[..n] != UTF8_BOM[..n] {
            self.bom_checked = true;
            return true;
        }

        if n == UTF8_BOM.len() {
            self.buffer.advance(n);
            self.bom_checked = true;
            return true;
        }

        false
    }

    fn next_line(&mut self) -> Option<BytesMut> {
        if self.skip_lf {
            if self.buffer.is_empty() {
                return None;
            }
            if self.buffer[0] == b'\n' {
                self.buffer.advance(1);
            }
            self.skip_lf = false;
        }

        let pos = self
            .buffer
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')?;
        let line = self.buffer.split_to(pos);
        if self.buffer[0] == b'\r' {
            self.skip_lf = true;
        }
        self.buffer.advance(1);

        Some(line)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment line
        if line[0] == b':' {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.find(':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (&line[..], ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry only matter for reconnecting clients
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = self.data.join("\n");
        self.data.clear();

        Some(SseFrame {
            event: event.filter(|e| !e.is_empty()),
            data,
        })
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Format one event in wire framing
pub fn format_event(event: &str, data: &serde_json::Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(decoder: &mut SseDecoder) -> Vec<SseFrame> {
        std::iter::from_fn(|| decoder.next_frame()).collect()
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: ping\ndata: {\"type\":\"ping\"}\n\n");

        let out = frames(&mut decoder);
        assert_eq!(
            out,
            vec![SseFrame {
                event: Some("ping".to_string()),
                data: "{\"type\":\"ping\"}".to_string(),
            }]
        );
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_incomplete_frame_waits() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: message_stop\ndata: {\"type\"");
        assert!(decoder.next_frame().is_none());

        decoder.push(b":\"message_stop\"}\n");
        assert!(decoder.next_frame().is_none());

        decoder.push(b"\n");
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.event.as_deref(), Some("message_stop"));
        assert_eq!(frame.data, "{\"type\":\"message_stop\"}");
    }

    #[test]
    fn test_multi_line_data_joined() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: x\ndata: {\"a\":\ndata: 1}\n\n");

        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.data, "{\"a\":\n1}");
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: a\r\ndata: 1\r\n\r\nevent: b\rdata: 2\r\r");

        let out = frames(&mut decoder);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event.as_deref(), Some("a"));
        assert_eq!(out[0].data, "1");
        assert_eq!(out[1].event.as_deref(), Some("b"));
        assert_eq!(out[1].data, "2");
    }

    #[test]
    fn test_crlf_split_across_pushes() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: 1\r");
        assert!(decoder.next_frame().is_none());
        decoder.push(b"\n\r");
        assert_eq!(decoder.next_frame().unwrap().data, "1");
        decoder.push(b"\ndata: 2\n\n");
        assert_eq!(decoder.next_frame().unwrap().data, "2");
    }

    #[test]
    fn test_comments_and_ignored_fields() {
        let mut decoder = SseDecoder::new();
        decoder.push(b": keep-alive\nid: 7\nretry: 1000\nevent: a\ndata:no-space\n\n");

        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.event.as_deref(), Some("a"));
        assert_eq!(frame.data, "no-space");
    }

    #[test]
    fn test_empty_frames_ignored() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"\n\nevent: lonely\n\n: comment\n\n");
        assert!(decoder.next_frame().is_none());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"event: message_stop\ndata: {}");
        assert!(decoder.next_frame().is_none());

        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event.as_deref(), Some("message_stop"));
        assert_eq!(frame.data, "{}");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_bom_stripped() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"\xEF\xBB");
        assert!(decoder.next_frame().is_none());
        decoder.push(b"\xBFdata: 1\n\n");
        assert_eq!(decoder.next_frame().unwrap().data, "1");
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = format_event("content_block_delta", &serde_json::json!({"index": 0}));
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();

        for byte in wire.as_bytes() {
            decoder.push(std::slice::from_ref(byte));
            out.extend(frames(&mut decoder));
        }

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(out[0].data, "{\"index\":0}");
    }

    #[test]
    fn test_multibyte_text_preserved() {
        let mut decoder = SseDecoder::new();
        let wire = "data: {\"text\":\"héllo ✓\"}\n\n".as_bytes();
        let (a, b) = wire.split_at(17);
        decoder.push(a);
        assert!(decoder.next_frame().is_none());
        decoder.push(b);
        assert_eq!(decoder.next_frame().unwrap().data, "{\"text\":\"héllo ✓\"}");
    }
}

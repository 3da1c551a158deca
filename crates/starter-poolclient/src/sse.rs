/// One decoded SSE frame: an `event:` field (defaulting to `"message"` when
/// absent) and its accumulated `data:` lines joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE frame parser fed raw bytes as they arrive off the wire.
/// Frames are terminated by a blank line, per the SSE spec; `id:`/`retry:`
/// fields are accepted but not surfaced, since the pool-manager stream
/// never relies on them for resume.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: String,
    event: String,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning any frames completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);

            if line.is_empty() {
                if !self.data.is_empty() {
                    frames.push(SseFrame {
                        event: if self.event.is_empty() { "message".to_string() } else { self.event.clone() },
                        data: self.data.join("\n"),
                    });
                }
                self.event.clear();
                self.data.clear();
                continue;
            }

            if let Some(value) = line.strip_prefix("event:") {
                self.event = value.trim_start().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
            // `id:`/`retry:`/comment (`:`-prefixed) lines are intentionally ignored.
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_chunk_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: bondifuzz.pools.creating\ndata: {\"pool_id\":\"p1\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "bondifuzz.pools.creating".to_string(),
                data: r#"{"pool_id":"p1"}"#.to_string(),
            }]
        );
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: ping\n").is_empty());
        assert!(decoder.push(b"data: \n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec![SseFrame { event: "ping".to_string(), data: String::new() }]);
    }

    #[test]
    fn missing_event_field_defaults_to_message() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: hello\n\n");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn multi_line_data_is_newline_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
    }
}

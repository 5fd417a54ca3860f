use bytes::Bytes;

/// Segments `data: {json}` records out of an event stream whose reads may
/// split a record or concatenate several. The buffer keeps the tail of the
/// last read that has not yet been consumed as a complete record.
#[derive(Debug, Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<String> {
        self.push(chunk.as_ref())
    }

    /// Feeds one read; returns every record completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = frame_line(&line) {
                records.push(record);
            }
        }

        records
    }

    /// Drains a trailing record that arrived without its newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        frame_line(&line)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.iter().all(|byte| byte.is_ascii_whitespace())
    }
}

fn frame_line(line: &[u8]) -> Option<String> {
    let mut line = line.trim_ascii();
    if let Some(rest) = line.strip_prefix(b"data:") {
        line = rest.trim_ascii_start();
    }
    if line.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(line).into_owned())
}

/// Wraps one downstream payload as an SSE record.
pub fn frame_record(payload: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(payload.len() + 8);
    data.extend_from_slice(b"data: ");
    data.extend_from_slice(payload);
    data.extend_from_slice(b"\n\n");
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_concatenated_records_in_order() {
        let mut framer = SseFramer::new();
        let records = framer.push(b"data: {\"a\":1}\ndata: {\"a\":2}\n\ndata: {\"a\":3}\n");
        assert_eq!(records, vec![r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
        assert!(framer.is_empty());
    }

    #[test]
    fn reassembles_record_split_across_reads() {
        let mut framer = SseFramer::new();
        assert!(framer.push(b"data: {\"text\":\"hel").is_empty());
        let records = framer.push(b"lo\"}\ndata: {\"done\"");
        assert_eq!(records, vec![r#"{"text":"hello"}"#]);
        assert_eq!(framer.push(b":true}\n"), vec![r#"{"done":true}"#]);
    }

    #[test]
    fn tolerates_crlf_and_missing_prefix() {
        let mut framer = SseFramer::new();
        let records = framer.push(b"data: {\"a\":1}\r\n{\"a\":2}\r\n");
        assert_eq!(records, vec![r#"{"a":1}"#, r#"{"a":2}"#]);
    }

    #[test]
    fn finish_drains_trailing_record() {
        let mut framer = SseFramer::new();
        assert!(framer.push(b"data: {\"tail\":true}").is_empty());
        assert!(!framer.is_empty());
        assert_eq!(framer.finish().as_deref(), Some(r#"{"tail":true}"#));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn consumes_every_byte_exactly_once() {
        let input = b"data: {\"n\":0}\ndata: {\"n\":1}\ndata: {\"n\":2}\n";
        // Feed byte by byte to exercise every split point.
        let mut framer = SseFramer::new();
        let mut records = Vec::new();
        for byte in input.iter() {
            records.extend(framer.push(std::slice::from_ref(byte)));
        }
        records.extend(framer.finish());
        assert_eq!(records, vec![r#"{"n":0}"#, r#"{"n":1}"#, r#"{"n":2}"#]);
    }

    #[test]
    fn frames_downstream_records() {
        assert_eq!(frame_record(b"[DONE]").as_ref(), b"data: [DONE]\n\n");
    }
}

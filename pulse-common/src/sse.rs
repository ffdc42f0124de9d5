//! Server-Sent Events (SSE) wire encoding
//!
//! Shared SSE envelope and encoder for Pulse services. Events are framed per the
//! `text/event-stream` grammar:
//!
//! ```text
//! retry: 60000
//! event: heartRate
//! data: 72
//!
//! ```
//!
//! `retry:` is written on every event that carries a reconnection interval, not
//! just the first one on a stream. Field order within an event is always
//! `retry`, `event`, `data`. No `id:` field is ever written.

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;

use crate::{Error, Result};

/// Content type served for event streams
pub const CONTENT_TYPE: &str = "text/event-stream";

/// A single event envelope, built at emission time and discarded after encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    event_type: String,
    data: String,
    retry: Option<Duration>,
}

impl SseEvent {
    /// Create an event with the given type label and payload
    ///
    /// The type label must fit on a single line. The payload may span several
    /// lines; each line becomes its own `data:` field on the wire.
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        let event_type = event_type.into();
        if event_type.contains(['\r', '\n']) {
            return Err(Error::InvalidInput(format!(
                "SSE event type must not contain line breaks: {:?}",
                event_type
            )));
        }

        Ok(Self {
            event_type,
            data: data.into(),
            retry: None,
        })
    }

    /// Attach a reconnection hint advertised to the client
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Copy of this event carrying a different payload
    ///
    /// Lets a producer validate the type label once and stamp out events from it.
    pub fn with_data(&self, data: impl Into<String>) -> Self {
        Self {
            event_type: self.event_type.clone(),
            data: data.into(),
            retry: self.retry,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Encode this event into its complete wire form
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len_hint());
        write_event(self, &mut buf);
        buf.freeze()
    }

    fn encoded_len_hint(&self) -> usize {
        // "retry: " + digits + "\n", "event: " + type + "\n", "data: " + payload + "\n", "\n"
        32 + self.event_type.len() + self.data.len()
    }
}

/// Map a stream of events to response body chunks, one chunk per event
///
/// Each chunk is a complete event, so the HTTP layer writes (and flushes) every
/// event as its own frame instead of batching across emissions.
pub fn encode_stream<S>(events: S) -> impl Stream<Item = std::result::Result<Bytes, Infallible>>
where
    S: Stream<Item = SseEvent>,
{
    events.map(|event| Ok(event.to_bytes()))
}

fn write_event(event: &SseEvent, dst: &mut BytesMut) {
    if let Some(retry) = event.retry {
        write_field(dst, "retry", retry.as_millis().to_string().as_bytes());
    }

    write_field(dst, "event", event.event_type.as_bytes());

    for line in payload_lines(&event.data) {
        write_field(dst, "data", line.as_bytes());
    }

    // Blank line dispatches the event on the client
    dst.put_u8(b'\n');
}

fn write_field(dst: &mut BytesMut, name: &str, value: &[u8]) {
    dst.reserve(name.len() + value.len() + 3);
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_u8(b'\n');
}

/// Split a payload on CRLF, LF and lone CR, the three SSE line terminators
///
/// Always yields at least one line; an empty payload yields one empty line.
fn payload_lines(data: &str) -> Vec<&str> {
    let bytes = data.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&data[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&data[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }

    lines.push(&data[start..]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_str(event: &SseEvent) -> String {
        String::from_utf8(event.to_bytes().to_vec()).expect("SSE output is UTF-8")
    }

    #[test]
    fn test_encode_heart_rate_event_with_retry() {
        let event = SseEvent::new("heartRate", "72")
            .unwrap()
            .with_retry(Duration::from_millis(60_000));

        assert_eq!(
            encode_str(&event),
            "retry: 60000\nevent: heartRate\ndata: 72\n\n"
        );
    }

    #[test]
    fn test_encode_without_retry_omits_retry_line() {
        let event = SseEvent::new("heartRate", "99").unwrap();
        assert_eq!(encode_str(&event), "event: heartRate\ndata: 99\n\n");
    }

    #[test]
    fn test_multiline_payload_splits_into_data_lines() {
        let event = SseEvent::new("note", "first\nsecond\r\nthird\rfourth").unwrap();
        assert_eq!(
            encode_str(&event),
            "event: note\ndata: first\ndata: second\ndata: third\ndata: fourth\n\n"
        );
    }

    #[test]
    fn test_trailing_newline_keeps_empty_data_line() {
        let event = SseEvent::new("note", "line\n").unwrap();
        assert_eq!(encode_str(&event), "event: note\ndata: line\ndata: \n\n");
    }

    #[test]
    fn test_empty_payload_still_has_data_line() {
        let event = SseEvent::new("ping", "").unwrap();
        assert_eq!(encode_str(&event), "event: ping\ndata: \n\n");
    }

    #[test]
    fn test_event_type_with_newline_rejected() {
        let result = SseEvent::new("heart\nRate", "72");
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = SseEvent::new("heartRate\r", "72");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_encoding_is_repeatable() {
        let event = SseEvent::new("heartRate", "81")
            .unwrap()
            .with_retry(Duration::from_secs(60));

        assert_eq!(event.to_bytes(), event.to_bytes());
    }

    #[tokio::test]
    async fn test_encode_stream_yields_one_chunk_per_event() {
        let events = futures::stream::iter(vec![
            SseEvent::new("heartRate", "70").unwrap(),
            SseEvent::new("heartRate", "71").unwrap(),
        ]);

        let chunks: Vec<Bytes> = encode_stream(events)
            .map(|chunk| match chunk {
                Ok(bytes) => bytes,
                Err(never) => match never {},
            })
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0][..], b"event: heartRate\ndata: 70\n\n");
        assert_eq!(&chunks[1][..], b"event: heartRate\ndata: 71\n\n");
    }
}

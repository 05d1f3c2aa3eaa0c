//! Decoding of `text/event-stream` (Server-Sent Events) content.
//!
//! Decoder is a push parser of raw stream chunks, and Events adapts a
//! Stream of chunks into a Stream of dispatched Events.
use futures::Stream;
use std::collections::VecDeque;
use std::task::Poll;
use std::time::Duration;

/// Event name used when the stream doesn't provide one.
pub const DEFAULT_EVENT: &str = "message";

/// Event is a single dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name of the event, or DEFAULT_EVENT.
    pub name: String,
    /// Data lines of the event, joined by newlines.
    pub data: String,
    /// Last event ID of the stream as of this event. An empty `id` field resets it.
    pub id: Option<String>,
}

/// Decoder incrementally parses event stream content into Events.
#[derive(Debug, Default)]
pub struct Decoder {
    // Bytes of a line which hasn't yet been terminated.
    line: Vec<u8>,
    // A chunk ended in '\r', and a leading '\n' of the next chunk is part of that line ending.
    skip_lf: bool,
    // Whether the stream's leading byte-order mark has been checked.
    started: bool,
    // Fields of the event being built.
    name: Option<String>,
    data: String,
    has_data: bool,
    // `id` of the event being built, committed as `last_id` upon dispatch.
    id_buffer: Option<String>,
    // Stream-wide state.
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder which resumes a stream having the given `last_event_id`.
    pub fn resume(last_event_id: Option<String>) -> Self {
        Self {
            id_buffer: last_event_id.clone(),
            last_id: last_event_id,
            ..Self::default()
        }
    }

    /// Decode `chunk`, pushing dispatched Events onto `out`.
    pub fn decode(&mut self, mut chunk: &[u8], out: &mut VecDeque<Event>) {
        if !self.started {
            // A leading UTF-8 BOM may be split across chunks.
            let have = self.line.len() + chunk.len();
            if have < 3 && b"\xEF\xBB\xBF".starts_with(&[&self.line[..], chunk].concat()) {
                self.line.extend_from_slice(chunk);
                return;
            }
            let mut head = std::mem::take(&mut self.line);
            head.extend_from_slice(chunk);
            self.started = true;

            let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&head).to_vec();
            return self.decode(&head, out);
        }

        if self.skip_lf {
            self.skip_lf = false;
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
        }

        while let Some(pivot) = chunk.iter().position(|b| *b == b'\n' || *b == b'\r') {
            self.line.extend_from_slice(&chunk[..pivot]);
            let line = std::mem::take(&mut self.line);
            self.process_line(&line, out);

            if chunk[pivot] == b'\r' {
                match chunk.get(pivot + 1) {
                    Some(b'\n') => chunk = &chunk[pivot + 2..],
                    Some(_) => chunk = &chunk[pivot + 1..],
                    None => {
                        self.skip_lf = true;
                        chunk = &[];
                    }
                }
            } else {
                chunk = &chunk[pivot + 1..];
            }
        }
        self.line.extend_from_slice(chunk);
    }

    /// Last event ID of the stream, as of its most recently dispatched event.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_id.as_deref()
    }

    /// Reconnection delay most recently requested by the stream.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &[u8], out: &mut VecDeque<Event>) {
        if line.is_empty() {
            return self.dispatch(out);
        }
        if line[0] == b':' {
            return; // Comment.
        }

        let (field, value) = match line.iter().position(|b| *b == b':') {
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &b""[..]),
        };
        let value = String::from_utf8_lossy(value);

        match field {
            b"event" => self.name = Some(value.into_owned()),
            b"data" => {
                self.data.push_str(&value);
                self.data.push('\n');
                self.has_data = true;
            }
            b"id" if !value.contains('\0') => self.id_buffer = Some(value.into_owned()),
            b"retry" if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => {
                tracing::trace!(field = %String::from_utf8_lossy(field), "ignoring event stream field");
            }
        }
    }

    fn dispatch(&mut self, out: &mut VecDeque<Event>) {
        let name = self.name.take();
        self.last_id = self.id_buffer.clone().filter(|id| !id.is_empty());

        if !self.has_data {
            self.data.clear();
            return;
        }
        self.has_data = false;

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        out.push_back(Event {
            name: name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
        });
    }
}

pin_project_lite::pin_project! {
    /// Events adapts a Stream of raw content chunks into a Stream of Events.
    ///
    /// Errors of the inner Stream are passed through. An event which is only
    /// partially received when the inner Stream ends is discarded.
    pub struct Events<S> {
        #[pin]
        inner: S,
        decoder: Decoder,
        ready: VecDeque<Event>,
    }
}

impl<S> Events<S> {
    pub fn new(inner: S) -> Self {
        Self::resume(inner, None)
    }

    /// Events of a stream which resumes from `last_event_id`.
    /// Events which don't carry their own `id` inherit it.
    pub fn resume(inner: S, last_event_id: Option<String>) -> Self {
        Self {
            inner,
            decoder: Decoder::resume(last_event_id),
            ready: VecDeque::new(),
        }
    }

    /// Reconnection delay most recently requested by the stream.
    pub fn retry(&self) -> Option<Duration> {
        self.decoder.retry()
    }
}

impl<S, B, E> Stream for Events<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Event, E>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let mut me = self.project();

        loop {
            if let Some(event) = me.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match me.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => me.decoder.decode(chunk.as_ref(), me.ready),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

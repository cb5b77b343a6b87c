//! Server-sent event parsing for agent turn streams
//!
//! A turn stream is a sequence of `data: {...}` lines. [`TurnEventReader`]
//! reads them one at a time, classifies each into a [`StreamEvent`] and stops
//! reading as soon as a terminal event (`turn_complete` or
//! `turn_awaiting_input` carrying a turn) has been returned. Nothing past the
//! terminal line is pulled from the underlying body.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::stream::Stream;
use llama_turn_types::{StreamEvent, TerminalKind, Turn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::errors::{LineError, Result, TurnError};
use crate::observer::{LogObserver, TurnObserver};

/// The payload of an SSE `data` field, or `None` for any other line.
pub fn data_field(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    line.strip_prefix("data:").map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parse one line of a turn stream.
///
/// Returns `None` for lines that carry no event (blank lines, comments,
/// `event:`/`id:` fields), `Some(Err(_))` for a data line that does not
/// decode and `Some(Ok(_))` otherwise.
pub fn parse_line(line: &str) -> Option<serde_json::Result<StreamEvent>> {
    let data = data_field(line)?;
    if data.trim().is_empty() {
        return None;
    }
    Some(StreamEvent::from_data(data))
}

/// Pull-based reader of turn stream events.
pub struct TurnEventReader<R> {
    reader: R,
    buf: Vec<u8>,
    observer: Arc<dyn TurnObserver>,
    skipped: usize,
    finished: bool,
}

impl<R> TurnEventReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            observer: Arc::new(LogObserver),
            skipped: 0,
            finished: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Number of lines that failed to decode and were skipped.
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    /// Whether a terminal event has been returned or the body is exhausted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the next event.
    ///
    /// Returns `Ok(None)` at end of input and after a terminal event.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf).await {
                Ok(0) => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(TurnError::StreamRead(e));
                }
            }
            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
            }

            let line = match String::from_utf8(std::mem::take(&mut self.buf)) {
                Ok(line) => line,
                Err(e) => {
                    let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    self.skip_line(&lossy, LineError::from(e));
                    continue;
                }
            };

            match parse_line(&line) {
                None => continue,
                Some(Err(e)) => self.skip_line(&line, LineError::from(e)),
                Some(Ok(event)) => {
                    self.observer.on_event(&event);
                    if event.is_terminal() {
                        self.finished = true;
                    }
                    return Ok(Some(event));
                }
            }
        }
    }

    fn skip_line(&mut self, line: &str, error: LineError) {
        log::warn!("Skipping undecodable stream line ({}): {}", error, line);
        self.skipped += 1;
        self.observer.on_skipped_line(line, &error);
    }

    /// Read until the terminal event and return its kind and turn.
    pub async fn read_to_terminal(&mut self) -> Result<(TerminalKind, Turn)> {
        while let Some(event) = self.next_event().await? {
            if let Some(terminal) = event.into_terminal() {
                return Ok(terminal);
            }
        }
        Err(TurnError::NoTerminalEvent)
    }

    /// Convert the reader into a lazy stream of events.
    ///
    /// The stream ends after the terminal event or at end of input.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<StreamEvent>>
    where
        R: Send,
    {
        try_stream! {
            while let Some(event) = self.next_event().await? {
                yield event;
            }
        }
    }
}

//! Live journal event sources.
//!
//! Journal events arrive as JSON lines: from stdin (piped by the host), or
//! from a journal file that can be followed while the game appends to it.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::config::defaults::FOLLOW_POLL_INTERVAL;
use crate::types::JournalEvent;

pub enum SourceEvent {
    Event(JournalEvent),
    /// A `Died` or `PVPKill` line that failed to decode, handed on raw so
    /// the failure can be reported rather than skipped.
    MalformedKill(serde_json::Value),
    /// No more data will arrive.
    Eof,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open journal {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("journal read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where live journal events come from.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Next decoded event. Malformed lines are skipped internally, except
    /// kill events, which surface as [`SourceEvent::MalformedKill`].
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Newline-delimited JSON events over any async reader.
pub struct JsonLinesSource<R> {
    reader: R,
    line_buffer: Vec<u8>,
    name: String,
    /// Keep polling at EOF instead of ending.
    follow: bool,
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin", false)
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path, follow: bool) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| SourceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string(), follow))
    }
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, name: impl Into<String>, follow: bool) -> Self {
        Self {
            reader,
            line_buffer: Vec::with_capacity(1024),
            name: name.into(),
            follow,
        }
    }
}

#[async_trait]
impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        loop {
            // read_until keeps partial bytes in the buffer if this future is
            // dropped, so a cancelled call loses nothing.
            let bytes = self.reader.read_until(b'\n', &mut self.line_buffer).await?;

            if bytes == 0 {
                if self.follow {
                    tokio::time::sleep(FOLLOW_POLL_INTERVAL).await;
                    continue;
                }
                if self.line_buffer.is_empty() {
                    return Ok(SourceEvent::Eof);
                }
            } else if self.follow && self.line_buffer.last() != Some(&b'\n') {
                // Partial line; the writer has not finished it yet.
                continue;
            }

            let raw = std::mem::take(&mut self.line_buffer);
            let Ok(line) = std::str::from_utf8(&raw) else {
                warn!(source = %self.name, "Skipping non UTF-8 line");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    warn!(source = %self.name, error = %e, "Skipping malformed journal line");
                    continue;
                }
            };
            let raw_kill = JournalEvent::names_kill_event(&value).then(|| value.clone());
            match (JournalEvent::from_value(value), raw_kill) {
                (Ok(event), _) => return Ok(SourceEvent::Event(event)),
                (Err(e), Some(raw)) => {
                    warn!(source = %self.name, error = %e, "Malformed kill event");
                    return Ok(SourceEvent::MalformedKill(raw));
                }
                (Err(e), None) => {
                    warn!(source = %self.name, error = %e, "Skipping malformed journal line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(source: &mut impl EventSource) -> Vec<JournalEvent> {
        let mut events = Vec::new();
        while let SourceEvent::Event(e) = source.next_event().await.unwrap() {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn reads_events_and_skips_garbage() {
        let input = b"{\"event\":\"Commander\",\"Name\":\"WDX\"}\n\nnot json\n{\"event\":\"Rank\",\"Combat\":8}";
        let mut source = JsonLinesSource::new(&input[..], "test", false);
        let events = drain(&mut source).await;
        assert_eq!(
            events,
            vec![
                JournalEvent::Commander { name: "WDX".into() },
                JournalEvent::Rank { combat: 8 },
            ]
        );
    }

    #[tokio::test]
    async fn follow_picks_up_appended_lines() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"event\":\"Commander\",\"Name\":\"WDX\"}}").unwrap();
        file.flush().unwrap();

        let mut source = JsonLinesSource::open(file.path(), true).await.unwrap();
        assert!(matches!(
            source.next_event().await.unwrap(),
            SourceEvent::Event(JournalEvent::Commander { .. })
        ));

        write!(file, "{{\"event\":\"Rank\",").unwrap();
        file.flush().unwrap();
        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), source.next_event()).await;
        assert!(pending.is_err(), "partial line must not be emitted");

        writeln!(file, "\"Combat\":5}}").unwrap();
        file.flush().unwrap();
        let next = tokio::time::timeout(std::time::Duration::from_secs(5), source.next_event())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(next, SourceEvent::Event(JournalEvent::Rank { combat: 5 })));
    }

    #[tokio::test]
    async fn malformed_kill_line_is_surfaced_not_skipped() {
        let input = concat!(
            "{\"event\":\"Rank\"}\n",
            "{\"event\":\"PVPKill\",\"timestamp\":\"2020-03-12T12:49:54Z\",\"Victim\":\"Bob\"}\n",
        );
        let mut source = JsonLinesSource::new(input.as_bytes(), "test", false);

        match source.next_event().await.unwrap() {
            SourceEvent::MalformedKill(raw) => assert_eq!(raw["Victim"], "Bob"),
            _ => panic!("expected the broken PVPKill line"),
        }
        assert!(matches!(source.next_event().await.unwrap(), SourceEvent::Eof));
    }

    #[tokio::test]
    async fn missing_file_is_open_error() {
        let result = JsonLinesSource::open(Path::new("/no/such/journal.log"), false).await;
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }
}

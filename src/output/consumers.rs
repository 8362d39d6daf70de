//! Output consumer implementations

use super::types::{Message, OutputConsumer, RecordDisposition, StreamRecord};
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Buffering Consumer
// ============================================================================

type RecordFilter = Box<dyn Fn(&StreamRecord) -> bool + Send + Sync>;

/// Keeps every record and message in memory
#[derive(Default)]
pub struct BufferingOutputConsumer {
    records: Mutex<Vec<StreamRecord>>,
    messages: Mutex<Vec<Message>>,
    filter: Option<RecordFilter>,
}

impl BufferingOutputConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard records for which `keep` returns false
    pub fn with_filter(keep: impl Fn(&StreamRecord) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Some(Box::new(keep)),
            ..Self::default()
        }
    }

    /// Records accepted so far
    pub fn records(&self) -> Vec<StreamRecord> {
        lock(&self.records).clone()
    }

    /// Messages accepted so far
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    /// State values emitted for one stream, oldest first
    pub fn states(&self, stream: &str) -> Vec<serde_json::Value> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| match m {
                Message::State { stream: s, data } if s == stream => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

impl std::fmt::Debug for BufferingOutputConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferingOutputConsumer")
            .field("records", &lock(&self.records).len())
            .field("messages", &lock(&self.messages).len())
            .finish_non_exhaustive()
    }
}

impl OutputConsumer for BufferingOutputConsumer {
    fn accept(&self, record: StreamRecord) -> RecordDisposition {
        if let Some(keep) = &self.filter {
            if !keep(&record) {
                return RecordDisposition::Discarded;
            }
        }
        lock(&self.records).push(record);
        RecordDisposition::Emitted
    }

    fn accept_message(&self, message: Message) {
        lock(&self.messages).push(message);
    }
}

// ============================================================================
// Channel Consumer
// ============================================================================

/// Forwards everything as `Message`s into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelOutputConsumer {
    sender: mpsc::UnboundedSender<Message>,
}

impl ChannelOutputConsumer {
    /// Create a consumer and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OutputConsumer for ChannelOutputConsumer {
    fn accept(&self, record: StreamRecord) -> RecordDisposition {
        match self.sender.send(Message::record(record)) {
            Ok(()) => RecordDisposition::Emitted,
            Err(_) => RecordDisposition::Discarded,
        }
    }

    fn accept_message(&self, message: Message) {
        if self.sender.send(message).is_err() {
            tracing::debug!("Output channel closed, dropping message");
        }
    }
}

// ============================================================================
// JSON Lines Consumer
// ============================================================================

/// Writes each record and message as one JSON line
pub struct JsonLinesOutputConsumer {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesOutputConsumer {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Write to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn write_line(&self, message: &Message) -> bool {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize message: {e}");
                return false;
            }
        };
        let mut writer = lock(&self.writer);
        match writeln!(writer, "{line}") {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to write output line: {e}");
                false
            }
        }
    }

    /// Flush buffered output
    pub fn flush(&self) -> std::io::Result<()> {
        lock(&self.writer).flush()
    }
}

impl std::fmt::Debug for JsonLinesOutputConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesOutputConsumer").finish_non_exhaustive()
    }
}

impl OutputConsumer for JsonLinesOutputConsumer {
    fn accept(&self, record: StreamRecord) -> RecordDisposition {
        if self.write_line(&Message::record(record)) {
            RecordDisposition::Emitted
        } else {
            RecordDisposition::Discarded
        }
    }

    fn accept_message(&self, message: Message) {
        self.write_line(&message);
    }
}

//! Output module
//!
//! The sink records and protocol messages are handed to.
//!
//! # Overview
//!
//! - `OutputConsumer` - Accepts records (emitted or discarded) and messages
//! - `BufferingOutputConsumer` - Keeps everything in memory
//! - `ChannelOutputConsumer` - Forwards into a tokio channel
//! - `JsonLinesOutputConsumer` - Writes one JSON document per line

mod consumers;
mod types;

pub use consumers::{BufferingOutputConsumer, ChannelOutputConsumer, JsonLinesOutputConsumer};
pub use types::{Message, OutputConsumer, RecordDisposition, StreamRecord};

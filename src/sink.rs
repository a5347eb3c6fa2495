//! Log sinks receiving miner output
//!
//! The supervisor only writes to a sink; it never reads back. `TracingSink`
//! is the default, `ChannelSink` hands lines to an embedding application.

use crate::backend::LogLine;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Destination for the invocation string and forwarded output lines
pub trait LogSink: Send + Sync {
    /// Record the command line a miner is started with
    fn invocation(&self, miner: &str, command: &str);

    /// Record one classified output line
    fn line(&self, miner: &str, line: &LogLine);
}

/// Sink writing through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn invocation(&self, miner: &str, command: &str) {
        debug!(miner = miner, "Invocation: {}", command);
    }

    fn line(&self, miner: &str, line: &LogLine) {
        info!(miner = miner, "{}", line);
    }
}

/// Event delivered by a `ChannelSink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// Miner started with this argument string
    Invocation { miner: String, command: String },
    /// Miner printed this line
    Line { miner: String, line: LogLine },
}

/// Sink forwarding events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn invocation(&self, miner: &str, command: &str) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.tx.send(SinkEvent::Invocation {
            miner: miner.to_string(),
            command: command.to_string(),
        });
    }

    fn line(&self, miner: &str, line: &LogLine) {
        let _ = self.tx.send(SinkEvent::Line {
            miner: miner.to_string(),
            line: line.clone(),
        });
    }
}

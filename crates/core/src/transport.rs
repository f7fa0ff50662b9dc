use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::messages::ConsoleEvent;

/// Sentinel command that zeroes every channel downstream.
pub const RELEASE: &str = "release";

/// Boundary between the interpreter and whatever carries commands to the
/// lighting hardware.
///
/// Dispatch is fire-and-forget: an implementation must accept the command
/// without blocking the keypad, and two dispatches issued back to back must
/// reach the output in that order. The interpreter applies commands locally
/// before dispatching and never rolls back if delivery later fails; the
/// channel table is eventually consistent with the rig, and Release is the
/// recovery action when they drift.
pub trait Transport: Send {
    fn dispatch(&mut self, command: &str) -> Result<(), anyhow::Error>;
}

/// Transport that queues commands for an async output worker. The unbounded
/// queue keeps dispatch non-blocking and order-preserving.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Build a transport together with the receiving end for `run_output`.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Transport for ChannelTransport {
    fn dispatch(&mut self, command: &str) -> Result<(), anyhow::Error> {
        self.tx
            .send(command.to_string())
            .map_err(|_| anyhow::anyhow!("output worker is gone"))
    }
}

/// Client for the downstream lighting-control API.
#[async_trait]
pub trait LightingOutput: Send {
    async fn deliver(&mut self, command: &str) -> Result<(), anyhow::Error>;
}

/// Drain the dispatch queue, delivering each command once and in order.
///
/// A delivery failure is logged and surfaced as an event; the queue keeps
/// draining so one bad send never wedges the console.
pub async fn run_output(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut output: Box<dyn LightingOutput>,
    event_tx: mpsc::UnboundedSender<ConsoleEvent>,
) {
    log::info!("Output worker started");
    while let Some(command) = rx.recv().await {
        log::debug!("Delivering command: {}", command);
        if let Err(e) = output.deliver(&command).await {
            log::warn!("Failed to deliver '{}': {}", command, e);
            let _ = event_tx.send(ConsoleEvent::DispatchFailed {
                command,
                reason: e.to_string(),
            });
        }
    }
    log::info!("Output worker finished");
}

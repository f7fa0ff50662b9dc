use serde::{Deserialize, Serialize};

use crate::buffer::Key;
use crate::levels::DEFAULT_MAX_CHANNEL;
use crate::solo::BumpDirection;

/// Commands sent from the front panel to the console task.
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    PressKey { key: Key },
    ClearBuffer,
    Send,
    Release,
    ToggleSolo,
    Bump { direction: BumpDirection },
    Shutdown,
}

/// Events emitted for the presentation layer.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    BufferChanged {
        buffer: String,
    },
    /// Post-mutation channel table, ascending by channel.
    ChannelsChanged {
        channels: Vec<(u16, u8)>,
    },
    CommandDispatched {
        command: String,
    },
    /// A finalized buffer failed to parse. The channel table is untouched.
    CommandRejected {
        reason: String,
    },
    /// Delivery failed after the command was applied locally. Non-fatal.
    DispatchFailed {
        command: String,
        reason: String,
    },
    SoloChanged {
        active: bool,
    },
    Released,
    ShutdownComplete,
}

/// Operator settings persisted by the config manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Hostname the unit announces itself under.
    pub hostname: String,
    /// Highest channel a command may address.
    pub max_channel: u16,
    /// Whether the output stage continuously refreshes the last frame.
    pub dmx_loop: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: "rfunit".to_string(),
            max_channel: DEFAULT_MAX_CHANNEL,
            dmx_loop: true,
        }
    }
}

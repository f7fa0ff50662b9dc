use std::collections::BTreeMap;

use crate::parser::{Level, Selector};

/// Default highest addressable channel, one full DMX universe.
pub const DEFAULT_MAX_CHANNEL: u16 = 512;

/// Ordered view of which channels are currently held at which level.
///
/// Entries iterate in ascending channel order. A channel at level zero is
/// never stored: applying zero removes its entry instead.
#[derive(Debug, Clone)]
pub struct ChannelTable {
    levels: BTreeMap<u16, u8>,
    max_channel: u16,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::with_max_channel(DEFAULT_MAX_CHANNEL)
    }

    pub fn with_max_channel(max_channel: u16) -> Self {
        Self {
            levels: BTreeMap::new(),
            max_channel,
        }
    }

    /// Apply a level to every channel in the selector and return the
    /// post-mutation entries. Channels outside 1..=max_channel are skipped.
    pub fn apply(&mut self, selector: &Selector, level: Level) -> Vec<(u16, u8)> {
        let value = level.value();
        for channel in selector.channels() {
            if channel == 0 || channel > self.max_channel {
                log::debug!("Ignoring out-of-range channel {}", channel);
                continue;
            }
            if value == 0 {
                self.levels.remove(&channel);
            } else {
                self.levels.insert(channel, value);
            }
        }
        self.entries()
    }

    /// Empty the table unconditionally. Used by Release.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Current (channel, level) pairs in ascending channel order.
    pub fn entries(&self) -> Vec<(u16, u8)> {
        self.levels.iter().map(|(c, l)| (*c, *l)).collect()
    }

    pub fn level(&self, channel: u16) -> Option<u8> {
        self.levels.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

use crate::parser::KW_AT;

/// Direction of a solo-mode level adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpDirection {
    Up,
    Down,
}

impl BumpDirection {
    fn delta(&self) -> i16 {
        match self {
            BumpDirection::Up => 1,
            BumpDirection::Down => -1,
        }
    }
}

/// Command pair for one two-phase bump: blackout pulse first, new level
/// second. The pulse forces the downstream output to re-acquire a level
/// that only moved by one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpCommands {
    pub blackout: String,
    pub set: String,
}

/// Solo mode locks the interpreter onto one selector so the operator can
/// walk its level up and down one step at a time.
#[derive(Debug, Default)]
pub struct SoloController {
    active: bool,
    last_command: Option<String>,
}

impl SoloController {
    pub fn new() -> Self {
        Self {
            active: false,
            last_command: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enter solo mode. A non-empty pending command becomes the frozen
    /// selector context; otherwise the most recently sent command stays.
    pub fn activate(&mut self, pending: &str) {
        self.active = true;
        if !pending.is_empty() {
            self.last_command = Some(pending.to_string());
        }
    }

    /// Remember the most recently sent command text.
    pub fn record_send(&mut self, command: &str) {
        self.last_command = Some(command.to_string());
    }

    /// Drop out of solo mode and forget the selector context. Release from
    /// any state lands here.
    pub fn reset(&mut self) {
        self.active = false;
        self.last_command = None;
    }

    /// Build the blackout/set command pair for a one-step adjustment and
    /// advance the stored context so repeated bumps compound.
    ///
    /// The frozen command must carry a parsable 3-digit level after AT;
    /// FULL or a missing level makes the bump a no-op. The new level
    /// saturates at the 0 and 255 ends.
    pub fn bump(&mut self, direction: BumpDirection) -> Option<BumpCommands> {
        if !self.active {
            return None;
        }
        let command = self.last_command.as_deref()?;
        let (selector, level) = split_level(command)?;
        let new_level = (i16::from(level) + direction.delta()).clamp(0, 255) as u8;
        let commands = BumpCommands {
            blackout: format!("{} {} 000", selector, KW_AT),
            set: format!("{} {} {:03}", selector, KW_AT, new_level),
        };
        self.last_command = Some(commands.set.clone());
        Some(commands)
    }
}

/// Split "005 AND 012 AT 100" into its selector text and numeric level.
fn split_level(command: &str) -> Option<(String, u8)> {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let at = tokens.iter().position(|t| *t == KW_AT)?;
    let level_token = tokens.get(at + 1)?;
    if level_token.len() != 3 {
        return None;
    }
    let level = level_token.parse::<u8>().ok()?;
    Some((tokens[..at].join(" "), level))
}

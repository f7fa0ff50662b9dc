use tokio::sync::mpsc;

use crate::buffer::{AppendResult, CommandBuffer, Key};
use crate::levels::ChannelTable;
use crate::messages::{ConsoleCommand, ConsoleEvent, Settings};
use crate::normalizer::normalize;
use crate::parser::{self, Command, ParseError};
use crate::solo::{BumpCommands, BumpDirection, SoloController};
use crate::transport::{Transport, RELEASE};

/// One operator session: the pending buffer, the channel table, solo state,
/// and the transport finalized commands are dispatched into.
///
/// All mutation goes through `&mut self`. Callers mixing input sources must
/// funnel them through `run_console` so each command is parsed, applied, and
/// dispatched before the next one is looked at.
pub struct FocusConsole {
    buffer: CommandBuffer,
    channels: ChannelTable,
    solo: SoloController,
    transport: Box<dyn Transport>,
}

impl FocusConsole {
    pub fn new(settings: &Settings, transport: Box<dyn Transport>) -> Self {
        Self {
            buffer: CommandBuffer::new(),
            channels: ChannelTable::with_max_channel(settings.max_channel),
            solo: SoloController::new(),
            transport,
        }
    }

    /// Feed one key press. While solo is active the selector is frozen and
    /// ordinary entry keys are ignored.
    ///
    /// Returns the dispatched command text when the press finalized the
    /// buffer (double-press of FULL).
    pub fn press_key(&mut self, key: Key) -> Result<Option<String>, ParseError> {
        if self.solo.is_active() {
            log::debug!("Solo active, ignoring key {:?}", key);
            return Ok(None);
        }
        match self.buffer.append(key) {
            AppendResult::Buffered => Ok(None),
            AppendResult::SendRequested => self.send(),
        }
    }

    /// Clear the pending buffer without touching channel state.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Finalize the pending buffer: normalize, parse, apply, dispatch.
    ///
    /// An incomplete buffer is left in place untouched and `Ok(None)` is
    /// returned. A malformed buffer is cleared and the error returned; the
    /// channel table is never modified on failure.
    pub fn send(&mut self) -> Result<Option<String>, ParseError> {
        if self.solo.is_active() {
            return Ok(None);
        }
        let normalized = normalize(self.buffer.snapshot());
        match parser::parse(&normalized) {
            Ok(None) => {
                log::debug!("Buffer '{}' is not a complete command yet", normalized);
                Ok(None)
            }
            Ok(Some(Command::SetLevel { selector, level })) => {
                self.buffer.clear();
                self.channels.apply(&selector, level);
                self.dispatch(&normalized);
                self.solo.record_send(&normalized);
                Ok(Some(normalized))
            }
            Ok(Some(Command::Release)) => {
                self.release();
                Ok(Some(RELEASE.to_string()))
            }
            Err(e) => {
                log::warn!("Rejecting malformed command '{}': {}", normalized, e);
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Zero every channel and reset the session. Always available as a
    /// recovery action; local state clears even if the dispatch fails.
    pub fn release(&mut self) {
        self.dispatch(RELEASE);
        self.channels.clear();
        self.buffer.clear();
        self.solo.reset();
    }

    /// Toggle solo mode. Entering freezes the pending command (or the most
    /// recently sent one) as the selector being adjusted; leaving releases
    /// everything, so solo never exits into a half-latched rig.
    pub fn toggle_solo(&mut self) {
        if self.solo.is_active() {
            self.release();
        } else {
            let context = normalize(self.buffer.snapshot());
            self.solo.activate(&context);
            log::info!("Solo mode engaged");
        }
    }

    /// One-step solo adjustment. Dispatches a blackout pulse and then the
    /// new level, in that order, so the downstream output re-acquires the
    /// change; both commands are applied to the channel table as well.
    pub fn bump(&mut self, direction: BumpDirection) -> Option<BumpCommands> {
        let commands = self.solo.bump(direction)?;
        for text in [&commands.blackout, &commands.set] {
            match parser::parse(text) {
                Ok(Some(Command::SetLevel { selector, level })) => {
                    self.channels.apply(&selector, level);
                    self.dispatch(text);
                }
                _ => log::error!("Bump built an unparsable command: {}", text),
            }
        }
        Some(commands)
    }

    /// Current pending buffer contents for display.
    pub fn display_buffer(&self) -> &str {
        self.buffer.snapshot()
    }

    /// Current (channel, level) pairs in ascending channel order.
    pub fn channel_table(&self) -> Vec<(u16, u8)> {
        self.channels.entries()
    }

    pub fn solo_active(&self) -> bool {
        self.solo.is_active()
    }

    fn dispatch(&mut self, command: &str) {
        log::debug!("Dispatching: {}", command);
        if let Err(e) = self.transport.dispatch(command) {
            log::warn!("Dispatch of '{}' failed: {}", command, e);
        }
    }

    /// Process one front-panel command and emit the resulting events.
    pub fn process_command(
        &mut self,
        command: ConsoleCommand,
        event_tx: &mpsc::UnboundedSender<ConsoleEvent>,
    ) {
        use ConsoleCommand::*;

        log::debug!("Processing command: {:?}", command);

        match command {
            PressKey { key } => match self.press_key(key) {
                Ok(Some(sent)) => {
                    let _ = event_tx.send(ConsoleEvent::CommandDispatched { command: sent });
                    self.emit_state(event_tx);
                }
                Ok(None) => {
                    let _ = event_tx.send(ConsoleEvent::BufferChanged {
                        buffer: self.display_buffer().to_string(),
                    });
                }
                Err(e) => {
                    let _ = event_tx.send(ConsoleEvent::CommandRejected {
                        reason: e.to_string(),
                    });
                    self.emit_state(event_tx);
                }
            },
            ClearBuffer => {
                self.clear();
                let _ = event_tx.send(ConsoleEvent::BufferChanged {
                    buffer: String::new(),
                });
            }
            Send => match self.send() {
                Ok(Some(sent)) => {
                    let _ = event_tx.send(ConsoleEvent::CommandDispatched { command: sent });
                    self.emit_state(event_tx);
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = event_tx.send(ConsoleEvent::CommandRejected {
                        reason: e.to_string(),
                    });
                    self.emit_state(event_tx);
                }
            },
            Release => {
                self.release();
                let _ = event_tx.send(ConsoleEvent::Released);
                self.emit_state(event_tx);
            }
            ToggleSolo => {
                self.toggle_solo();
                let _ = event_tx.send(ConsoleEvent::SoloChanged {
                    active: self.solo_active(),
                });
                if !self.solo_active() {
                    // Leaving solo released everything
                    let _ = event_tx.send(ConsoleEvent::Released);
                    self.emit_state(event_tx);
                }
            }
            Bump { direction } => {
                if let Some(commands) = self.bump(direction) {
                    let _ = event_tx.send(ConsoleEvent::CommandDispatched {
                        command: commands.blackout,
                    });
                    let _ = event_tx.send(ConsoleEvent::CommandDispatched {
                        command: commands.set,
                    });
                    self.emit_state(event_tx);
                }
            }
            Shutdown => {
                // Handled by run_console
            }
        }
    }

    fn emit_state(&self, event_tx: &mpsc::UnboundedSender<ConsoleEvent>) {
        let _ = event_tx.send(ConsoleEvent::ChannelsChanged {
            channels: self.channel_table(),
        });
        let _ = event_tx.send(ConsoleEvent::BufferChanged {
            buffer: self.display_buffer().to_string(),
        });
    }
}

/// Drive a console from a queue of front-panel commands.
///
/// A single task owns the session, so each command is fully parsed, applied,
/// and dispatched before the next one is taken off the queue.
pub async fn run_console(
    mut console: FocusConsole,
    mut command_rx: mpsc::UnboundedReceiver<ConsoleCommand>,
    event_tx: mpsc::UnboundedSender<ConsoleEvent>,
) {
    log::info!("Console task started");
    while let Some(command) = command_rx.recv().await {
        if matches!(command, ConsoleCommand::Shutdown) {
            let _ = event_tx.send(ConsoleEvent::ShutdownComplete);
            break;
        }
        console.process_command(command, &event_tx);
    }
    log::info!("Console task finished");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for RecordingTransport {
        fn dispatch(&mut self, command: &str) -> Result<(), anyhow::Error> {
            self.sent.lock().unwrap().push(command.to_string());
            Ok(())
        }
    }

    fn console() -> (FocusConsole, Arc<Mutex<Vec<String>>>) {
        let transport = RecordingTransport::default();
        let sent = transport.sent.clone();
        let console = FocusConsole::new(&Settings::default(), Box::new(transport));
        (console, sent)
    }

    fn press_all(console: &mut FocusConsole, keys: &[Key]) {
        for &key in keys {
            console.press_key(key).unwrap();
        }
    }

    #[test]
    fn test_set_level_flow() {
        let (mut console, sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        assert_eq!(console.display_buffer(), "5 AT 100");

        let dispatched = console.send().unwrap();
        assert_eq!(dispatched.as_deref(), Some("005 AT 100"));
        assert_eq!(*sent.lock().unwrap(), vec!["005 AT 100".to_string()]);
        assert_eq!(console.channel_table(), vec![(5, 100)]);
        assert_eq!(console.display_buffer(), "");
    }

    #[test]
    fn test_and_joined_selection() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[
                Key::Digit(5),
                Key::And,
                Key::Digit(1),
                Key::Digit(2),
                Key::At,
                Key::Digit(5),
                Key::Digit(0),
            ],
        );
        console.send().unwrap();
        assert_eq!(console.channel_table(), vec![(5, 50), (12, 50)]);
    }

    #[test]
    fn test_thru_range() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[
                Key::Digit(5),
                Key::Thru,
                Key::Digit(8),
                Key::At,
                Key::Digit(1),
                Key::Digit(0),
                Key::Digit(0),
            ],
        );
        console.send().unwrap();
        assert_eq!(
            console.channel_table(),
            vec![(5, 100), (6, 100), (7, 100), (8, 100)]
        );
    }

    #[test]
    fn test_double_full_sends_once() {
        let (mut console, sent) = console();
        console.press_key(Key::Digit(5)).unwrap();
        console.press_key(Key::Full).unwrap();
        let dispatched = console.press_key(Key::Full).unwrap();

        assert_eq!(dispatched.as_deref(), Some("005 FULL"));
        assert_eq!(*sent.lock().unwrap(), vec!["005 FULL".to_string()]);
        assert_eq!(console.channel_table(), vec![(5, 255)]);
        assert_eq!(console.display_buffer(), "");
    }

    #[test]
    fn test_level_zero_removes_channel() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        press_all(&mut console, &[Key::Digit(5), Key::At, Key::Digit(0)]);
        console.send().unwrap();
        assert!(console.channel_table().is_empty());
    }

    #[test]
    fn test_incomplete_buffer_is_kept() {
        let (mut console, sent) = console();
        console.press_key(Key::Digit(5)).unwrap();
        let dispatched = console.send().unwrap();

        assert_eq!(dispatched, None);
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(console.display_buffer(), "5");
    }

    #[test]
    fn test_malformed_buffer_is_cleared_table_untouched() {
        let (mut console, sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();

        // "5 THRU AT 100" has no range end
        press_all(
            &mut console,
            &[
                Key::Digit(5),
                Key::Thru,
                Key::At,
                Key::Digit(1),
                Key::Digit(0),
                Key::Digit(0),
            ],
        );
        let err = console.send().unwrap_err();
        assert_eq!(err, ParseError::MissingRangeEnd);
        assert_eq!(console.display_buffer(), "");
        assert_eq!(console.channel_table(), vec![(5, 100)]);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_release_resets_everything() {
        let (mut console, sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        console.toggle_solo();
        assert!(console.solo_active());

        console.release();

        assert!(console.channel_table().is_empty());
        assert!(!console.solo_active());
        assert_eq!(console.display_buffer(), "");
        assert_eq!(sent.lock().unwrap().last().unwrap(), RELEASE);
    }

    #[test]
    fn test_solo_bump_two_phase_protocol() {
        let (mut console, sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        console.toggle_solo();

        console.bump(BumpDirection::Up).unwrap();

        assert_eq!(
            *sent.lock().unwrap(),
            vec![
                "005 AT 100".to_string(),
                "005 AT 000".to_string(),
                "005 AT 101".to_string(),
            ]
        );
        assert_eq!(console.channel_table(), vec![(5, 101)]);
    }

    #[test]
    fn test_repeated_bumps_compound() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        console.toggle_solo();

        console.bump(BumpDirection::Up).unwrap();
        console.bump(BumpDirection::Up).unwrap();
        console.bump(BumpDirection::Down).unwrap();

        assert_eq!(console.channel_table(), vec![(5, 101)]);
    }

    #[test]
    fn test_bump_without_level_context_is_noop() {
        let (mut console, sent) = console();
        console.toggle_solo();
        assert_eq!(console.bump(BumpDirection::Up), None);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_solo_captures_pending_buffer() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        // Not sent: toggling solo freezes the pending command
        console.toggle_solo();
        let commands = console.bump(BumpDirection::Up).unwrap();
        assert_eq!(commands.set, "005 AT 101");
    }

    #[test]
    fn test_solo_locks_out_entry_keys() {
        let (mut console, _sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        console.toggle_solo();

        let buffer_before = console.display_buffer().to_string();
        console.press_key(Key::Digit(9)).unwrap();
        assert_eq!(console.display_buffer(), buffer_before);
    }

    #[test]
    fn test_toggle_solo_off_releases() {
        let (mut console, sent) = console();
        press_all(
            &mut console,
            &[Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)],
        );
        console.send().unwrap();
        console.toggle_solo();
        console.toggle_solo();

        assert!(!console.solo_active());
        assert!(console.channel_table().is_empty());
        assert_eq!(sent.lock().unwrap().last().unwrap(), RELEASE);
    }

    #[test]
    fn test_applying_same_command_twice_is_idempotent() {
        let (mut console, _sent) = console();
        let keys = [Key::Digit(5), Key::At, Key::Digit(1), Key::Digit(0), Key::Digit(0)];
        press_all(&mut console, &keys);
        console.send().unwrap();
        let first = console.channel_table();

        press_all(&mut console, &keys);
        console.send().unwrap();
        assert_eq!(console.channel_table(), first);
    }

    #[test]
    fn test_process_command_emits_events() {
        let (mut console, _sent) = console();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        for key in [Key::Digit(5), Key::At, Key::Digit(9), Key::Digit(9)] {
            console.process_command(ConsoleCommand::PressKey { key }, &event_tx);
        }
        console.process_command(ConsoleCommand::Send, &event_tx);

        let mut events = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            events.push(event);
        }

        assert!(events.iter().any(|e| matches!(
            e,
            ConsoleEvent::CommandDispatched { command } if command == "005 AT 099"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ConsoleEvent::ChannelsChanged { channels } if channels == &vec![(5, 99)]
        )));
    }

    #[test]
    fn test_process_command_reports_rejection() {
        let (mut console, _sent) = console();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        for key in [Key::Digit(5), Key::At] {
            console.process_command(ConsoleCommand::PressKey { key }, &event_tx);
        }
        console.process_command(ConsoleCommand::Send, &event_tx);

        let mut saw_rejection = false;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, ConsoleEvent::CommandRejected { .. }) {
                saw_rejection = true;
            }
        }
        assert!(saw_rejection);
    }
}

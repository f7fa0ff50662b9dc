use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use rfu_core::{
    run_console, run_output, BumpDirection, ChannelTransport, ConfigManager, ConsoleCommand,
    ConsoleEvent, FocusConsole, Key,
};
use tokio::sync::mpsc;

mod output;

use output::LogOutput;

/// Remote focus keypad console for driving a lighting rig.
#[derive(Parser, Debug)]
#[command(name = "rfu")]
#[command(about = "Remote focus keypad console")]
struct Args {
    /// Path to the configuration file (default: config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the highest addressable channel
    #[arg(long)]
    max_channel: Option<u16>,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let mut config_manager = ConfigManager::new(args.config);
    let mut settings = config_manager.load()?;
    if let Some(max_channel) = args.max_channel {
        settings.max_channel = max_channel;
    }
    if let Err(errors) = ConfigManager::validate_settings(&settings) {
        anyhow::bail!("Invalid settings: {}", errors.join(", "));
    }

    println!("Remote focus unit '{}'", settings.hostname);
    println!("Channels: 1-{}", settings.max_channel);
    println!("Continuous output: {}", settings.dmx_loop);

    let runtime = tokio::runtime::Runtime::new()?;
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (transport, output_rx) = ChannelTransport::pair();

    let console = FocusConsole::new(&settings, Box::new(transport));
    runtime.spawn(run_console(console, command_rx, event_tx.clone()));
    runtime.spawn(run_output(output_rx, Box::new(LogOutput), event_tx));

    run_keypad(command_tx, event_rx)
}

fn run_keypad(
    command_tx: mpsc::UnboundedSender<ConsoleCommand>,
    mut event_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
) -> Result<(), anyhow::Error> {
    print_help();
    terminal::enable_raw_mode()?;
    let result = keypad_loop(&command_tx, &mut event_rx);
    terminal::disable_raw_mode()?;
    result
}

fn print_help() {
    println!();
    println!("Keys: 0-9 digits, a AT, t THRU, n AND, f FULL (twice to send)");
    println!("      Enter send, c clear, r release, s solo, +/- bump, q quit");
    println!();
}

fn keypad_loop(
    command_tx: &mpsc::UnboundedSender<ConsoleCommand>,
    event_rx: &mut mpsc::UnboundedReceiver<ConsoleEvent>,
) -> Result<(), anyhow::Error> {
    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let command = match key.code {
                    KeyCode::Char(c) if c.is_ascii_digit() => Some(ConsoleCommand::PressKey {
                        key: Key::Digit(c as u8 - b'0'),
                    }),
                    KeyCode::Char('a') => Some(ConsoleCommand::PressKey { key: Key::At }),
                    KeyCode::Char('t') => Some(ConsoleCommand::PressKey { key: Key::Thru }),
                    KeyCode::Char('n') => Some(ConsoleCommand::PressKey { key: Key::And }),
                    KeyCode::Char('f') => Some(ConsoleCommand::PressKey { key: Key::Full }),
                    KeyCode::Enter => Some(ConsoleCommand::Send),
                    KeyCode::Char('c') | KeyCode::Backspace => Some(ConsoleCommand::ClearBuffer),
                    KeyCode::Char('r') => Some(ConsoleCommand::Release),
                    KeyCode::Char('s') => Some(ConsoleCommand::ToggleSolo),
                    KeyCode::Char('+') | KeyCode::Char('=') => Some(ConsoleCommand::Bump {
                        direction: BumpDirection::Up,
                    }),
                    KeyCode::Char('-') => Some(ConsoleCommand::Bump {
                        direction: BumpDirection::Down,
                    }),
                    KeyCode::Char('q') | KeyCode::Esc => {
                        let _ = command_tx.send(ConsoleCommand::Shutdown);
                        return Ok(());
                    }
                    _ => None,
                };
                if let Some(command) = command {
                    if command_tx.send(command).is_err() {
                        anyhow::bail!("console task is gone");
                    }
                }
            }
        }
        while let Ok(console_event) = event_rx.try_recv() {
            render_event(&console_event);
        }
    }
}

fn render_event(console_event: &ConsoleEvent) {
    match console_event {
        ConsoleEvent::BufferChanged { buffer } => print!("> {}\r\n", buffer),
        ConsoleEvent::ChannelsChanged { channels } => {
            if channels.is_empty() {
                print!("  (no channels captured)\r\n");
            } else {
                let line = channels
                    .iter()
                    .map(|(channel, level)| format!("{:03} @ {:03}", channel, level))
                    .collect::<Vec<_>>()
                    .join("  ");
                print!("  {}\r\n", line);
            }
        }
        ConsoleEvent::CommandDispatched { command } => print!("SENT {}\r\n", command),
        ConsoleEvent::CommandRejected { reason } => print!("ERR  {}\r\n", reason),
        ConsoleEvent::DispatchFailed { command, reason } => {
            print!("WARN delivery of '{}' failed: {}\r\n", command, reason)
        }
        ConsoleEvent::SoloChanged { active } => {
            print!("SOLO {}\r\n", if *active { "on" } else { "off" })
        }
        ConsoleEvent::Released => print!("RELEASE\r\n"),
        ConsoleEvent::ShutdownComplete => {}
    }
    let _ = io::stdout().flush();
}

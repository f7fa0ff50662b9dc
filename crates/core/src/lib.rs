pub use buffer::{AppendResult, CommandBuffer, Key};
pub use config::{ConfigError, ConfigManager, ConfigOption, ConfigSchema};
pub use console::{run_console, FocusConsole};
pub use levels::{ChannelTable, DEFAULT_MAX_CHANNEL};
pub use messages::{ConsoleCommand, ConsoleEvent, Settings};
pub use normalizer::normalize;
pub use parser::{parse, Command, Level, ParseError, Selector, LEVEL_FULL};
pub use solo::{BumpCommands, BumpDirection, SoloController};
pub use transport::{run_output, ChannelTransport, LightingOutput, Transport, RELEASE};

mod buffer;
mod config;
mod console;
mod levels;
pub mod messages;
mod normalizer;
mod parser;
mod solo;
mod transport;

use async_trait::async_trait;
use rfu_core::LightingOutput;

/// Stand-in for the lighting-control API client: logs every command it
/// would put on the wire.
pub struct LogOutput;

#[async_trait]
impl LightingOutput for LogOutput {
    async fn deliver(&mut self, command: &str) -> Result<(), anyhow::Error> {
        log::info!("keys -> {}", command);
        Ok(())
    }
}

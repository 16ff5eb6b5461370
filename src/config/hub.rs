//! Broadcast hub configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Per-connection resource limits
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of each connection's outbound queue; events beyond it are dropped
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Largest inbound text frame accepted, in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl HubConfig {
    /// Validate hub configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_buffer == 0 || self.outbound_buffer > 10_000 {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        if !(256..=1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(ValidationError::InvalidFrameLimit);
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_max_frame_bytes() -> usize {
    16 * 1024
}

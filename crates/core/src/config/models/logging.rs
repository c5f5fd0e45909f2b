use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::logging::{LogFormat, LogLevel};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        self.level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        self.format
            .parse::<LogFormat>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    }
}

//! Database logging settings
//!
//! Looked up once per non-empty drain cycle, so a source backed by a remote
//! service picks up changes without a restart.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// How drained records are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseLoggingSettings {
    /// Log the frame ids of every persisted batch at debug level
    pub log_drained_records: bool,
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn database_logging_settings(&self) -> Result<DatabaseLoggingSettings, SettingsError>;
}

/// Serves fixed settings resolved from configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSettings {
    settings: DatabaseLoggingSettings,
}

impl ConfiguredSettings {
    pub fn new(settings: DatabaseLoggingSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SettingsSource for ConfiguredSettings {
    async fn database_logging_settings(&self) -> Result<DatabaseLoggingSettings, SettingsError> {
        Ok(self.settings.clone())
    }
}

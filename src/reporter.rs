//! Error Reporter
//!
//! Best-effort notification of system errors to the external error-logging
//! endpoint. Reporting never fails the caller: every failure of the report
//! itself is swallowed and only logged at debug level.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Path of the error-logging endpoint on the static REST server.
pub const SYSTEM_ERROR_PATH: &str = "/logs/system/error";

/// Origin tag identifying this service in the error log.
pub const SYSTEM_ORIGIN: &str = "database_cache_manager";

/// Body of a system error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemErrorReport {
    pub epoch_ts: i64,
    pub system_origin: String,
    pub system_location: String,
    pub error_name: String,
    pub error_details: String,
    /// Window during which the log sink suppresses repeats of this error
    pub error_lock_timeout_ms: u64,
}

/// Posts system errors to `{base_url}/logs/system/error`.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    client: reqwest::Client,
    url: String,
    origin: String,
}

impl ErrorReporter {
    /// Creates a reporter whose requests give up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), SYSTEM_ERROR_PATH),
            origin: SYSTEM_ORIGIN.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds the report body, stamped with the current time.
    pub fn report(
        &self,
        location: &str,
        name: &str,
        details: &str,
        lock_timeout: Duration,
    ) -> SystemErrorReport {
        SystemErrorReport {
            epoch_ts: chrono::Utc::now().timestamp_millis(),
            system_origin: self.origin.clone(),
            system_location: location.to_string(),
            error_name: name.to_string(),
            error_details: details.to_string(),
            error_lock_timeout_ms: lock_timeout.as_millis() as u64,
        }
    }

    /// Sends a system error report. Never fails; the request is bounded by
    /// the client timeout.
    pub async fn log_system_error(
        &self,
        location: &str,
        name: &str,
        details: &str,
        lock_timeout: Duration,
    ) {
        let report = self.report(location, name, details, lock_timeout);

        match self.client.post(&self.url).json(&report).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(name, "System error reported");
            }
            Ok(response) => {
                debug!(name, status = %response.status(), "Error log endpoint rejected report");
            }
            Err(err) => {
                debug!(name, error = %err, "Failed to log system error");
            }
        }
    }
}

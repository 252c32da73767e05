//! Data frame rows drained from the cache queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sink::{PgQuery, TableRow};

/// One queued data frame. JSON field names equal the column names, so
/// producers push rows exactly as they will be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrameRow {
    pub frame_id: String,
    /// Producer that pushed the frame
    pub source: String,
    pub frame_ts: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl TableRow for DataFrameRow {
    const TABLE: &'static str = "data_frames";
    const COLUMNS: &'static [&'static str] = &["frame_id", "source", "frame_ts", "payload"];

    fn bind<'q>(&'q self, query: PgQuery<'q>) -> PgQuery<'q> {
        query
            .bind(self.frame_id.as_str())
            .bind(self.source.as_str())
            .bind(self.frame_ts)
            .bind(&self.payload)
    }

    fn log_key(&self) -> &str {
        &self.frame_id
    }
}

//! Log sink: prints each cycle's records as a table through `tracing`.
//!
//! Used when no chart listener is configured. Records are logged one line per
//! station so the JSON log output stays greppable.

use tracing::{info, warn};

use crate::{FetchResult, Sink, SinkError};

/// Sink that writes results to the log and never fails.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for LogSink {
    fn id(&self) -> &str {
        "log"
    }

    fn render(&self, result: FetchResult) -> Result<(), SinkError> {
        match result {
            Ok(records) => {
                info!(records = records.len(), "station delay table");
                for (row, record) in records.iter().enumerate() {
                    info!(
                        row,
                        station_id = %record.station_id,
                        station_name = %record.station_name,
                        delay_minutes = record.delay_minutes,
                        "delay"
                    );
                }
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "no delay data this cycle");
            }
        }
        Ok(())
    }
}

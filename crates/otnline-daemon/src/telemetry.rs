//! Telemetry ingestion
//!
//! A reader task parses JSON-lines sample records and forwards them over a
//! channel; the ingest task resolves object keys and feeds the engine.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use otnline_core::{QuantityId, TelemetrySample};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// One line of a telemetry feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleRecord {
    /// Configuration key of the measured object
    pub object: String,
    pub quantity: QuantityId,
    /// Raw fixed-point value
    pub value: i64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Parse one line; blank lines and `#` comments yield `None`
pub fn parse_line(line: &str) -> Result<Option<SampleRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let record = serde_json::from_str(line).context("invalid sample record")?;
    Ok(Some(record))
}

/// Read a replay file and send its records down `tx`
pub fn spawn_replay(path: PathBuf, tx: mpsc::Sender<SampleRecord>) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move {
        let file = File::open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut sent = 0;
        let mut line_no = 0;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            match parse_line(&line) {
                Ok(Some(record)) => {
                    if tx.send(record).await.is_err() {
                        debug!("Ingest task gone, stopping replay");
                        break;
                    }
                    sent += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_no,
                    error = %e,
                    "Skipping line"
                ),
            }
        }
        info!(path = %path.display(), samples = sent, "Replay finished");
        Ok(sent)
    })
}

/// Apply received records until the channel closes; returns how many were accepted
pub fn spawn_ingest(
    state: Arc<AppState>,
    mut rx: mpsc::Receiver<SampleRecord>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut applied = 0;
        while let Some(record) = rx.recv().await {
            if ingest_record(&state, &record) {
                applied += 1;
            }
        }
        debug!(applied, "Telemetry channel closed");
        applied
    })
}

/// Resolve and apply one record; false when it was dropped
pub fn ingest_record(state: &AppState, record: &SampleRecord) -> bool {
    let Some(object_id) = state.object(&record.object) else {
        debug!(object = %record.object, "Dropping sample for unknown object");
        return false;
    };
    let sample = TelemetrySample {
        object_id,
        quantity: record.quantity,
        value: record.value,
        timestamp: record.timestamp.unwrap_or_else(Utc::now),
    };
    match state.dispatcher.ingest(&sample) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                object = %record.object,
                quantity = record.quantity,
                error = %e,
                "Sample rejected"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;
    use otnline_core::catalog::ocm;
    use otnline_core::{ManualClock, StatValue};
    use std::io::Write;

    fn state() -> Arc<AppState> {
        let config: Config = toml::from_str(
            r#"
[[switch]]
id = 1

[[object]]
key = "ch1"
object_type = "channel_monitor_channel"
switch = 1
attrs = { name = "ch1", lower_frequency = 191000000, upper_frequency = 191100000 }
"#,
        )
        .unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()));
        AppState::with_clock(config, clock).unwrap()
    }

    #[test]
    fn test_parse_line() {
        let record = parse_line(
            r#"{"object": "ch1", "quantity": 0, "value": -512, "timestamp": "2026-05-01T00:00:03Z"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.object, "ch1");
        assert_eq!(record.value, -512);
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 3).unwrap())
        );

        let untimed = parse_line(r#"{"object": "ch1", "quantity": 0, "value": 1}"#)
            .unwrap()
            .unwrap();
        assert_eq!(untimed.timestamp, None);

        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# header").unwrap(), None);
        assert!(parse_line("{\"object\": 1}").is_err());
    }

    #[test]
    fn test_ingest_record() {
        let state = state();
        let record = |object: &str, quantity| SampleRecord {
            object: object.to_string(),
            quantity,
            value: -250,
            timestamp: None,
        };
        assert!(ingest_record(&state, &record("ch1", ocm::channel::POWER_QUANTITY)));
        assert!(!ingest_record(&state, &record("ch2", ocm::channel::POWER_QUANTITY)));
        assert!(!ingest_record(&state, &record("ch1", 4)));
    }

    #[tokio::test]
    async fn test_replay_into_engine() {
        let state = state();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# power samples").unwrap();
        writeln!(file, r#"{{"object": "ch1", "quantity": 0, "value": -500}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file, r#"{{"object": "ghost", "quantity": 0, "value": 7}}"#).unwrap();
        writeln!(file, r#"{{"object": "ch1", "quantity": 0, "value": -300}}"#).unwrap();
        file.flush().unwrap();

        let (tx, rx) = mpsc::channel(4);
        let reader = spawn_replay(file.path().to_path_buf(), tx);
        let ingest = spawn_ingest(state.clone(), rx);

        assert_eq!(reader.await.unwrap().unwrap(), 3);
        assert_eq!(ingest.await.unwrap(), 2);

        let ch1 = state.object("ch1").unwrap();
        let reads = state.dispatcher.get_stats(ch1, &[0, 2, 3]).unwrap();
        let raw: Vec<_> = reads
            .iter()
            .map(|r| r.value().and_then(StatValue::raw))
            .collect();
        assert_eq!(raw, [Some(-300), Some(-500), Some(-300)]);
    }
}

/// Alert publishing.
///
/// Every record the pipeline emits goes to an `AlertSink`. Delivery is
/// best-effort: a failed delivery is logged and the pipeline moves on, since
/// the alert state itself is already persisted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::logging::{self, Component};
use crate::model::{AlertRecord, FloodError};

pub trait AlertSink: Send {
    fn publish(&mut self, record: &AlertRecord) -> Result<(), FloodError>;
}

/// Publishes and logs a failure instead of returning it.
pub fn deliver(sink: &mut dyn AlertSink, record: &AlertRecord) {
    if let Err(e) = sink.publish(record) {
        logging::log_failure("publish alert", &e);
    }
}

/// Collects records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AlertRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AlertRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AlertSink for MemorySink {
    fn publish(&mut self, record: &AlertRecord) -> Result<(), FloodError> {
        self.records
            .lock()
            .map_err(|_| FloodError::Transport("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// POSTs each record as JSON to the dashboard endpoint.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FloodError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FloodError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client, url: url.to_string() })
    }
}

impl AlertSink for HttpSink {
    fn publish(&mut self, record: &AlertRecord) -> Result<(), FloodError> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .map_err(|e| FloodError::Transport(format!("POST {}: {}", self.url, e)))?;
        if !response.status().is_success() {
            return Err(FloodError::Transport(format!(
                "dashboard rejected alert for {}: {}",
                record.site_id,
                response.status()
            )));
        }
        logging::debug(
            Component::Gateway,
            Some(&record.site_id),
            &format!("published {} ({:?})", record.tier, record.status),
        );
        Ok(())
    }
}

/// Logs each record; used when no dashboard endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn publish(&mut self, record: &AlertRecord) -> Result<(), FloodError> {
        logging::info(
            Component::Classifier,
            Some(&record.site_id),
            &format!(
                "{} p={:.2} [{:?}] {}",
                record.tier,
                record.probability,
                record.status,
                record.recommended_actions.join("; ")
            ),
        );
        Ok(())
    }
}

//! Message stream source with at-least-once delivery.
//!
//! Messages are pulled from a `tokio` channel and tracked as in flight until
//! their commit callback acknowledges them. Whatever is still unacknowledged
//! when the source is prepared again is redelivered ahead of new messages.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use histdb_core::errors::IngestError;
use histdb_core::models::{SourceItem, SourceKind};
use histdb_core::traits::IAuditLedger;
use histdb_core::HistResult;

use super::loader::rows_from_json;
use super::{commit_fn, InputSource, SourceUnit};

/// One message as handed over by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: String,
    /// Broker timestamp; the unit's nominal time.
    pub timestamp: DateTime<Utc>,
    /// Records, a columnar object, or a single record.
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct AckState {
    in_flight: BTreeMap<String, StreamMessage>,
    acked: Vec<String>,
    failures_pending: u32,
}

/// Acknowledgement bookkeeping shared between a source and its observers.
#[derive(Debug, Clone, Default)]
pub struct AckLog {
    state: Arc<Mutex<AckState>>,
}

impl AckLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AckState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, message: &StreamMessage) {
        self.lock()
            .in_flight
            .insert(message.id.clone(), message.clone());
    }

    /// Acknowledge `id`. Returns `false` if the acknowledgement was lost.
    pub fn ack(&self, id: &str) -> bool {
        let mut state = self.lock();
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return false;
        }
        if state.in_flight.remove(id).is_some() {
            state.acked.push(id.to_string());
        }
        true
    }

    /// Make the next `n` acknowledgements fail, as a broker disconnect would.
    pub fn fail_next_acks(&self, n: u32) {
        self.lock().failures_pending = n;
    }

    /// Acknowledged ids in acknowledgement order. Redelivered ids repeat.
    pub fn acked(&self) -> Vec<String> {
        self.lock().acked.clone()
    }

    pub fn unacked(&self) -> Vec<String> {
        self.lock().in_flight.keys().cloned().collect()
    }

    fn take_unacked(&self) -> Vec<StreamMessage> {
        let mut messages: Vec<StreamMessage> =
            std::mem::take(&mut self.lock().in_flight).into_values().collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        messages
    }
}

/// Pull subscription over a channel of `StreamMessage`s.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<StreamMessage>,
    acks: AckLog,
    redeliver: VecDeque<StreamMessage>,
    fetch_timeout: Duration,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<StreamMessage>, acks: AckLog, fetch_timeout: Duration) -> Self {
        Self {
            rx,
            acks,
            redeliver: VecDeque::new(),
            fetch_timeout,
        }
    }

    pub fn acks(&self) -> &AckLog {
        &self.acks
    }

    async fn next_message(&mut self) -> Option<StreamMessage> {
        if let Some(message) = self.redeliver.pop_front() {
            return Some(message);
        }
        match tokio::time::timeout(self.fetch_timeout, self.rx.recv()).await {
            Ok(message) => message,
            Err(_) => {
                let timeout_ms = self.fetch_timeout.as_millis() as u64;
                debug!(timeout_ms, "no message before timeout");
                None
            }
        }
    }
}

impl InputSource for ChannelSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    fn prepare(&mut self, _ledger: &dyn IAuditLedger, table: &str) -> HistResult<()> {
        let unacked = self.acks.take_unacked();
        if !unacked.is_empty() {
            warn!(table, messages = unacked.len(), "redelivering unacknowledged messages");
        }
        for message in unacked.into_iter().rev() {
            self.redeliver.push_front(message);
        }
        info!(table, queued = self.redeliver.len(), "prepared stream source");
        Ok(())
    }

    async fn fetch(&mut self) -> HistResult<Option<SourceUnit>> {
        let Some(message) = self.next_message().await else {
            return Ok(None);
        };
        self.acks.deliver(&message);
        let rows = rows_from_json(&message.payload).map_err(|reason| IngestError::SourceDecode {
            locator: message.id.clone(),
            reason,
        })?;

        let acks = self.acks.clone();
        let id = message.id.clone();
        Ok(Some(SourceUnit {
            item: SourceItem::new(SourceKind::Stream, message.id, message.timestamp),
            rows,
            nominal_time: message.timestamp,
            commit: commit_fn(move |_| async move { Ok(acks.ack(&id)) }),
        }))
    }
}

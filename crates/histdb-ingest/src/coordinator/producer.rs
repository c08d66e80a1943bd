//! Producer task owning an `InputSource`.
//!
//! The consumer sends one demand, then waits for exactly one answer, so the
//! source never fetches while a previous unit is still being applied.
//! Dropping the demand side stops the task, which hands the source back.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use histdb_core::errors::IngestError;
use histdb_core::HistResult;

use crate::source::{InputSource, SourceUnit};

type Answer = HistResult<Option<SourceUnit>>;

pub(crate) struct Producer<S> {
    demand: mpsc::Sender<()>,
    units: mpsc::Receiver<Answer>,
    task: JoinHandle<S>,
}

impl<S: InputSource + 'static> Producer<S> {
    pub(crate) fn spawn(mut source: S, capacity: usize) -> Self {
        let (demand, mut demands) = mpsc::channel::<()>(1);
        let (unit_tx, units) = mpsc::channel::<Answer>(capacity.max(1));
        let task = tokio::spawn(async move {
            while demands.recv().await.is_some() {
                let answer = source.fetch().await;
                let exhausted = !matches!(answer, Ok(Some(_)));
                if unit_tx.send(answer).await.is_err() || exhausted {
                    break;
                }
            }
            source
        });
        Self {
            demand,
            units,
            task,
        }
    }

    /// Ask for the next unit and wait for it.
    pub(crate) async fn next(&mut self) -> HistResult<Option<SourceUnit>> {
        if self.demand.send(()).await.is_err() {
            return Err(IngestError::ChannelClosed.into());
        }
        match self.units.recv().await {
            Some(answer) => answer,
            None => Err(IngestError::ChannelClosed.into()),
        }
    }

    /// Close the channels and take the source back. `None` if the task panicked.
    pub(crate) async fn finish(self) -> Option<S> {
        let Self {
            demand,
            units,
            task,
        } = self;
        drop(demand);
        drop(units);
        match task.await {
            Ok(source) => Some(source),
            Err(e) => {
                error!(error = %e, "producer task failed");
                None
            }
        }
    }
}

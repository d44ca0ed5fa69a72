use crate::error::NestError;
use crate::record::Record;
use crate::storage::{Table, Upsert, upsert};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const QUEUE_CAPACITY: usize = 0x111;
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum SinkMessage {
    Sync(Record),
    Bye,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Producer side of the persistence queue. `sync` blocks while the queue is full.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    tx: Sender<SinkMessage>,
}

impl SinkHandle {
    pub fn sync(&self, record: Record) -> Result<(), NestError> {
        self.tx
            .send(SinkMessage::Sync(record))
            .map_err(|_| NestError::SinkClosed)
    }
}

/// Background persistence worker owning the table until shutdown.
pub struct Sink<T: Table + Send + 'static> {
    tx: Sender<SinkMessage>,
    worker: JoinHandle<(T, SinkReport)>,
}

impl<T: Table + Send + 'static> Sink<T> {
    pub fn spawn(table: T) -> Self {
        Self::with_capacity(table, QUEUE_CAPACITY)
    }

    pub fn with_capacity(table: T, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        let worker = thread::spawn(move || drain(table, rx));
        Self { tx, worker }
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stops the worker after everything queued so far is written, then
    /// commits and hands the table back.
    pub fn shutdown(self) -> Result<(T, SinkReport), NestError> {
        self.tx
            .send(SinkMessage::Bye)
            .map_err(|_| NestError::SinkClosed)?;
        let (mut table, report) = self.worker.join().map_err(|_| NestError::WorkerPanicked)?;
        table.commit()?;
        log::info!(
            "persistence closed: {} inserted, {} updated, {} failed",
            report.inserted,
            report.updated,
            report.failed
        );
        Ok((table, report))
    }
}

fn drain<T: Table>(mut table: T, rx: Receiver<SinkMessage>) -> (T, SinkReport) {
    let mut report = SinkReport::default();
    let mut pending = false;

    loop {
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(SinkMessage::Bye) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(SinkMessage::Sync(record)) => {
                let k = record.k.clone();
                match upsert(&mut table, record) {
                    Ok(Upsert::Inserted) => {
                        log::debug!("insert {}", k);
                        report.inserted += 1;
                        pending = true;
                    }
                    Ok(Upsert::Updated) => {
                        log::debug!("update {}", k);
                        report.updated += 1;
                        pending = true;
                    }
                    Err(e) => {
                        log::error!("upsert {} failed: {}", k, e);
                        report.failed += 1;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if pending {
                    if let Err(e) = table.commit() {
                        log::error!("commit failed: {}", e);
                    }
                    pending = false;
                }
            }
        }
    }

    (table, report)
}

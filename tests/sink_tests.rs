use nestvm::error::NestError;
use nestvm::record::Record;
use nestvm::sink::Sink;
use nestvm::storage::{MemoryTable, SqlTable, Table, Upsert, upsert};
use nestvm::{Gid, Graph, Kind, Runtime};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn cleanup(path: &str) {
    let _ = fs::remove_file(path);
    let _ = fs::remove_file(format!("{}-journal", path));
}

fn record_of(kind: Kind, value: &str, refs: u64) -> Record {
    let mut g = Graph::new();
    let id = g.create(kind, value);
    let mut record = g.record(id);
    record.refs = refs;
    record.v.refs = refs;
    record
}

#[test]
fn upsert_is_idempotent_per_identity() -> Result<(), Box<dyn std::error::Error>> {
    let mut table = MemoryTable::new();

    assert_eq!(upsert(&mut table, record_of(Kind::String, "x", 0))?, Upsert::Inserted);
    assert_eq!(upsert(&mut table, record_of(Kind::String, "x", 3))?, Upsert::Updated);

    assert_eq!(table.len()?, 1);
    let k = Gid::of(Kind::String, "x").to_string();
    assert_eq!(table.get(&k)?.map(|r| r.refs), Some(3));
    Ok(())
}

#[test]
fn insert_reports_conflict_and_update_requires_row() {
    let mut table = MemoryTable::new();
    let record = record_of(Kind::Symbol, "y", 0);

    assert!(table.insert(record.clone()).is_ok());
    assert!(matches!(table.insert(record.clone()), Err(NestError::Conflict(_))));

    let missing = record_of(Kind::Symbol, "z", 0);
    assert!(matches!(table.update(missing), Err(NestError::RecordNotFound(_))));
}

#[test]
fn sink_persists_every_mutation() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Sink::spawn(MemoryTable::new());
    let mut rt = Runtime::with_sink("nestvm", sink.handle());
    rt.run("x = 'hello'\n")?;
    rt.shutdown();

    let (table, report) = sink.shutdown()?;
    assert_eq!(report.failed, 0);
    assert_eq!(report.inserted, table.len()?);
    assert!(table.commits >= 1);

    let root = table
        .get(&Gid::of(Kind::Vm, "nestvm").to_string())?
        .ok_or("root not persisted")?;
    assert_eq!(
        root.v.slot.get("x"),
        Some(&Gid::of(Kind::String, "hello").to_string())
    );
    assert_eq!(root.v.slot.get("Web"), Some(&Gid::of(Kind::Class, "Web").to_string()));

    let hello = table
        .get(&Gid::of(Kind::String, "hello").to_string())?
        .ok_or("string not persisted")?;
    assert_eq!(hello.refs, 1);
    assert!(table.get(&Gid::of(Kind::Op, "=").to_string())?.is_some());
    Ok(())
}

#[test]
fn full_queue_blocks_instead_of_dropping() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Sink::with_capacity(MemoryTable::new(), 1);
    let mut g = Graph::with_sink(sink.handle());
    for i in 0..100 {
        g.create(Kind::String, format!("v{}", i));
    }
    drop(g);

    let (table, report) = sink.shutdown()?;
    assert_eq!(table.len()?, 100);
    assert_eq!(report.inserted, 100);
    assert_eq!(report.updated, 0);
    Ok(())
}

struct BrokenTable {
    attempts: usize,
}

impl Table for BrokenTable {
    fn insert(&mut self, _record: Record) -> Result<(), NestError> {
        self.attempts += 1;
        Err(NestError::Io(std::io::Error::other("datastore down")))
    }

    fn update(&mut self, _record: Record) -> Result<(), NestError> {
        Err(NestError::Io(std::io::Error::other("datastore down")))
    }

    fn get(&self, _k: &str) -> Result<Option<Record>, NestError> {
        Ok(None)
    }

    fn len(&self) -> Result<usize, NestError> {
        Ok(0)
    }

    fn commit(&mut self) -> Result<(), NestError> {
        Ok(())
    }
}

#[test]
fn storage_failures_are_counted_not_hidden() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Sink::spawn(BrokenTable { attempts: 0 });
    let mut g = Graph::with_sink(sink.handle());
    g.create(Kind::String, "a");
    g.create(Kind::String, "b");
    g.create(Kind::String, "c");

    let (table, report) = sink.shutdown()?;
    assert_eq!(table.attempts, 3);
    assert_eq!(report.failed, 3);
    assert_eq!(report.inserted, 0);
    Ok(())
}

#[test]
fn sync_after_shutdown_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let sink = Sink::spawn(MemoryTable::new());
    let handle = sink.handle();
    sink.shutdown()?;

    assert!(matches!(
        handle.sync(record_of(Kind::String, "late", 0)),
        Err(NestError::SinkClosed)
    ));
    Ok(())
}

/// Blocks every insert until the test lets it through.
struct GatedTable {
    gate: crossbeam_channel::Receiver<()>,
    inner: MemoryTable,
}

impl Table for GatedTable {
    fn insert(&mut self, record: Record) -> Result<(), NestError> {
        let _ = self.gate.recv();
        self.inner.insert(record)
    }

    fn update(&mut self, record: Record) -> Result<(), NestError> {
        self.inner.update(record)
    }

    fn get(&self, k: &str) -> Result<Option<Record>, NestError> {
        self.inner.get(k)
    }

    fn len(&self) -> Result<usize, NestError> {
        self.inner.len()
    }

    fn commit(&mut self) -> Result<(), NestError> {
        self.inner.commit()
    }
}

#[test]
fn producer_waits_while_the_queue_is_full() -> Result<(), Box<dyn std::error::Error>> {
    let (open, gate) = crossbeam_channel::unbounded();
    let table = GatedTable {
        gate,
        inner: MemoryTable::new(),
    };
    let sink = Sink::with_capacity(table, 1);
    let handle = sink.handle();
    let sent = Arc::new(AtomicUsize::new(0));

    let producer = {
        let sent = Arc::clone(&sent);
        thread::spawn(move || {
            for value in ["a", "b", "c", "d"] {
                if handle.sync(record_of(Kind::String, value, 0)).is_err() {
                    return;
                }
                sent.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    // one record held by the worker, one in the queue, the rest must wait
    thread::sleep(Duration::from_millis(200));
    assert!(sent.load(Ordering::SeqCst) < 4);

    for _ in 0..4 {
        open.send(())?;
    }
    producer.join().map_err(|_| "producer panicked")?;
    assert_eq!(sent.load(Ordering::SeqCst), 4);

    let (table, report) = sink.shutdown()?;
    assert_eq!(report.inserted, 4);
    assert_eq!(table.inner.len()?, 4);
    Ok(())
}

#[test]
fn sql_table_maps_duplicate_keys_to_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let mut table = SqlTable::in_memory("test")?;
    let record = record_of(Kind::Symbol, "y", 0);

    table.insert(record.clone())?;
    assert!(matches!(table.insert(record.clone()), Err(NestError::Conflict(k)) if k == record.k));
    assert!(matches!(
        table.update(record_of(Kind::Symbol, "z", 0)),
        Err(NestError::RecordNotFound(_))
    ));

    assert_eq!(upsert(&mut table, record_of(Kind::Symbol, "y", 4))?, Upsert::Updated);
    assert_eq!(table.len()?, 1);
    assert_eq!(table.get(&record.k)?.map(|r| r.refs), Some(4));
    assert_eq!(table.get("00000000")?, None);
    Ok(())
}

#[test]
fn sql_table_rejects_unsafe_names() {
    assert!(SqlTable::in_memory("nodes; DROP TABLE x").is_err());
    assert!(SqlTable::in_memory("9lives").is_err());
    assert!(SqlTable::in_memory("").is_err());
}

#[test]
fn sql_table_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let path = "test_table_reopen.db";
    cleanup(path);

    {
        let mut table = SqlTable::open(path, "test")?;
        upsert(&mut table, record_of(Kind::String, "x", 0))?;
        upsert(&mut table, record_of(Kind::String, "x", 2))?;
        upsert(&mut table, record_of(Kind::Url, "https://example.org", 0))?;
        upsert(&mut table, record_of(Kind::Url, "http://%_wild", 0))?;
        table.commit()?;
    }

    let reopened = SqlTable::open(path, "test")?;
    assert_eq!(reopened.len()?, 3);
    let k = Gid::of(Kind::String, "x").to_string();
    let x = reopened.get(&k)?.ok_or("row missing")?;
    assert_eq!(x.refs, 2);
    assert_eq!(x.v.refs, 2);
    assert_eq!(x.v.gid, k);
    assert_eq!(reopened.by_type("url")?.len(), 2);
    assert_eq!(reopened.by_val_prefix("https://")?.len(), 1);
    assert_eq!(reopened.by_val_prefix("http://%")?.len(), 1);

    cleanup(path);
    Ok(())
}

#[test]
fn uncommitted_writes_are_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let path = "test_table_rollback.db";
    cleanup(path);

    {
        let mut table = SqlTable::open(path, "test")?;
        table.insert(record_of(Kind::String, "kept", 0))?;
        table.commit()?;
        table.insert(record_of(Kind::String, "lost", 0))?;
    }

    let reopened = SqlTable::open(path, "test")?;
    assert_eq!(reopened.len()?, 1);

    cleanup(path);
    Ok(())
}

#[test]
fn program_state_lands_in_the_datastore() -> Result<(), Box<dyn std::error::Error>> {
    let path = "test_program_state.db";
    cleanup(path);

    let sink = Sink::spawn(SqlTable::open(path, "nestvm")?);
    let mut rt = Runtime::with_sink("nestvm", sink.handle());
    rt.run("greeting = 'hi'\nowner = me@mail.org\n")?;
    rt.shutdown();
    let (table, report) = sink.shutdown()?;
    assert_eq!(report.failed, 0);
    drop(table);

    let stored = SqlTable::open(path, "nestvm")?;
    let root = stored
        .get(&Gid::of(Kind::Vm, "nestvm").to_string())?
        .ok_or("root not persisted")?;
    assert_eq!(
        root.v.slot.get("owner"),
        Some(&Gid::of(Kind::Email, "me@mail.org").to_string())
    );
    assert_eq!(stored.by_type("email")?.len(), 1);

    cleanup(path);
    Ok(())
}

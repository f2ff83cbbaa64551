//! Output sink for finished partitions
//!
//! Persisting partitions (one file each, later unified) belongs to the
//! caller. The engine hands partitions to a sink only after the whole run
//! has succeeded.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use kgmat_rml::TripleSet;
use parking_lot::Mutex;

use crate::error::Result;

/// Receiver of per-partition output.
#[async_trait]
pub trait TripleSink: Debug + Send + Sync {
    /// Accept the statements of one finished partition.
    async fn write_partition(&self, label: &str, triples: &TripleSet) -> Result<()>;
}

/// Sink that keeps every partition in memory, keyed by label.
#[derive(Debug, Default)]
pub struct MemorySink {
    partitions: Mutex<BTreeMap<String, TripleSet>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels received so far, sorted
    pub fn labels(&self) -> Vec<String> {
        self.partitions.lock().keys().cloned().collect()
    }

    /// Copy of one partition's statements
    pub fn partition(&self, label: &str) -> Option<TripleSet> {
        self.partitions.lock().get(label).cloned()
    }

    /// Union of everything received
    pub fn unified(&self) -> TripleSet {
        self.partitions
            .lock()
            .values()
            .cloned()
            .fold(TripleSet::new(), TripleSet::union)
    }
}

#[async_trait]
impl TripleSink for MemorySink {
    async fn write_partition(&self, label: &str, triples: &TripleSet) -> Result<()> {
        self.partitions
            .lock()
            .entry(label.to_string())
            .or_default()
            .merge(triples.clone());
        Ok(())
    }
}

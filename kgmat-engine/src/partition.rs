//! Partition orchestration
//!
//! Rules are grouped by their upstream-assigned partition. Partitions run
//! sequentially when the pool size is 1, otherwise as tasks on a `JoinSet`
//! bounded by a semaphore. Every task owns its rules, its output set and an
//! `Arc` snapshot of the subject map index; nothing mutable is shared.
//!
//! The first failure aborts all remaining tasks and is returned. There is
//! no partial corpus: finished partitions are held back and reach the sink
//! only once every partition has succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kgmat_rml::{MappingRule, MappingRules, MaterializeResult, SubjectMapIndex, TripleSet};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::MaterializeConfig;
use crate::error::{EngineError, Result};
use crate::execute::materialize_rule;
use crate::sink::TripleSink;
use crate::source::DataSource;

/// Summary of one finished partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub partition_id: String,
    pub rules: usize,
    /// Distinct statements produced by this partition
    pub triples: usize,
    pub elapsed: Duration,
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct Materialization {
    /// Union of all partitions
    pub triples: TripleSet,
    /// One entry per partition, ordered by partition id
    pub partitions: Vec<PartitionReport>,
}

/// Runs mapping rules against a data source.
#[derive(Debug, Clone)]
pub struct Materializer {
    source: Arc<dyn DataSource>,
    config: MaterializeConfig,
    sink: Option<Arc<dyn TripleSink>>,
}

impl Materializer {
    pub fn new(source: Arc<dyn DataSource>, config: MaterializeConfig) -> Self {
        Self {
            source,
            config,
            sink: None,
        }
    }

    /// Hand every partition to `sink` once all partitions have succeeded.
    pub fn with_sink(mut self, sink: Arc<dyn TripleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &MaterializeConfig {
        &self.config
    }

    /// Materialize `rules` into one deduplicated statement set.
    ///
    /// Dropping the returned future aborts any partition tasks still running.
    pub async fn materialize(&self, rules: MappingRules) -> Result<Materialization> {
        self.config.validate()?;
        match self.config.run_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.run(rules))
                .await
                .map_err(|_| EngineError::TimedOut(limit))?,
            None => self.run(rules).await,
        }
    }

    async fn run(&self, rules: MappingRules) -> Result<Materialization> {
        let started = Instant::now();
        let index = Arc::new(SubjectMapIndex::from_rules(&rules));
        let rule_count = rules.len();
        let partitions = group_partitions(rules);
        let workers = self.config.number_of_processes;

        tracing::info!(
            partitions = partitions.len(),
            rules = rule_count,
            workers = workers,
            chunksize = self.config.chunksize,
            "starting materialization"
        );

        let mut finished = Vec::with_capacity(partitions.len());

        if workers <= 1 {
            for (partition_id, rules) in partitions {
                let span = tracing::debug_span!("partition", partition_id = %partition_id);
                let (triples, report) =
                    run_partition(partition_id, rules, &index, self.source.as_ref(), &self.config)
                        .instrument(span)
                        .await?;
                record_partition(&mut finished, triples, report);
            }
        } else {
            let semaphore = Arc::new(Semaphore::new(workers));
            let mut join_set: JoinSet<Result<(TripleSet, PartitionReport)>> = JoinSet::new();

            for (partition_id, rules) in partitions {
                let sem = Arc::clone(&semaphore);
                let index = Arc::clone(&index);
                let source = Arc::clone(&self.source);
                let config = self.config.clone();
                let span = tracing::debug_span!("partition", partition_id = %partition_id);

                join_set.spawn(async move {
                    let _permit = sem
                        .acquire()
                        .await
                        .map_err(|_| EngineError::Worker("worker pool closed".into()))?;
                    run_partition(partition_id, rules, &index, source.as_ref(), &config)
                        .instrument(span)
                        .await
                        .map_err(EngineError::from)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let outcome = joined
                    .map_err(|e| EngineError::Worker(format!("partition task failed: {}", e)))
                    .and_then(|r| r);
                match outcome {
                    Ok((triples, report)) => record_partition(&mut finished, triples, report),
                    Err(e) => {
                        tracing::warn!(error = %e, "partition failed; aborting remaining partitions");
                        join_set.abort_all();
                        return Err(e);
                    }
                }
            }
        }

        let (corpus, reports) = self.publish(finished).await?;

        tracing::info!(
            partitions = reports.len(),
            triples = corpus.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "materialization complete"
        );

        Ok(Materialization {
            triples: corpus,
            partitions: reports,
        })
    }

    /// Hand every partition to the sink in partition id order, then union
    /// them into the corpus.
    async fn publish(
        &self,
        mut finished: Vec<(TripleSet, PartitionReport)>,
    ) -> Result<(TripleSet, Vec<PartitionReport>)> {
        finished.sort_by(|a, b| a.1.partition_id.cmp(&b.1.partition_id));

        if let Some(sink) = &self.sink {
            for (triples, report) in &finished {
                sink.write_partition(&report.partition_id, triples).await?;
            }
        }

        let mut corpus = TripleSet::new();
        let mut reports = Vec::with_capacity(finished.len());
        for (triples, report) in finished {
            corpus.merge(triples);
            reports.push(report);
        }
        Ok((corpus, reports))
    }
}

fn record_partition(
    finished: &mut Vec<(TripleSet, PartitionReport)>,
    triples: TripleSet,
    report: PartitionReport,
) {
    tracing::info!(
        partition_id = %report.partition_id,
        rules = report.rules,
        triples = report.triples,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "partition complete"
    );
    finished.push((triples, report));
}

/// Group rules by partition id, in partition id order.
pub fn group_partitions(rules: MappingRules) -> BTreeMap<String, Vec<MappingRule>> {
    let mut partitions: BTreeMap<String, Vec<MappingRule>> = BTreeMap::new();
    for rule in rules {
        partitions
            .entry(rule.partition_id.clone())
            .or_default()
            .push(rule);
    }
    partitions
}

/// Materialize `rules` and return only the statement set.
pub async fn materialize_set(
    rules: MappingRules,
    source: Arc<dyn DataSource>,
    config: MaterializeConfig,
) -> Result<TripleSet> {
    Ok(Materializer::new(source, config)
        .materialize(rules)
        .await?
        .triples)
}

async fn run_partition(
    partition_id: String,
    rules: Vec<MappingRule>,
    index: &SubjectMapIndex,
    source: &dyn DataSource,
    config: &MaterializeConfig,
) -> MaterializeResult<(TripleSet, PartitionReport)> {
    let started = Instant::now();
    let mut triples = TripleSet::new();

    for rule in &rules {
        let output = materialize_rule(rule, index, source, config)
            .instrument(tracing::debug_span!("rule", rule_id = %rule.rule_id))
            .await?;
        triples.merge(output.triples);
    }

    let report = PartitionReport {
        partition_id,
        rules: rules.len(),
        triples: triples.len(),
        elapsed: started.elapsed(),
    };
    Ok((triples, report))
}

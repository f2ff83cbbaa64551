//! End-to-end materialization tests.
//!
//! Rules are loaded from JSON records the way an upstream mapping parser
//! hands them over, and run against the in-memory source or a scripted
//! source that fails, stalls or panics on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kgmat_engine::{
    Connection, DataSource, EngineError, MaterializeConfig, Materializer, MemorySink,
    MemorySource,
};
use kgmat_rml::{MappingRules, MaterializeError, MaterializeResult, TripleSet};
use kgmat_tabular::{BatchSchema, Column, FieldInfo, FieldType, RowBatch};
use serde_json::{json, Value};

// =============================================================================
// Fixtures
// =============================================================================

fn rules(records: Value) -> MappingRules {
    MappingRules::from_json(&records.to_string()).expect("valid rule records")
}

fn config(workers: usize) -> MaterializeConfig {
    MaterializeConfig::default()
        .with_processes(workers)
        .with_chunksize(2)
}

fn people() -> RowBatch {
    RowBatch::from_string_rows(
        &["id", "name", "dept_id"],
        &[
            vec![Some("1"), Some("Ann"), Some("10")],
            vec![Some("2"), Some("Bob"), Some("20")],
            vec![Some("3"), Some("Cy"), None],
            vec![Some("4"), Some("Di"), Some("99")],
            vec![Some("5"), Some("Ed"), Some("10")],
        ],
    )
    .unwrap()
}

fn depts() -> RowBatch {
    RowBatch::from_string_rows(
        &["id", "label"],
        &[
            vec![Some("10"), Some("Sales")],
            vec![Some("20"), Some("Ops")],
            vec![Some("30"), Some("Legal")],
        ],
    )
    .unwrap()
}

fn company() -> MemorySource {
    MemorySource::new()
        .with_table("hr", "people", people())
        .with_table("hr", "depts", depts())
}

fn person_rule(rule_id: &str, partition_id: &str, predicate: &str, object: Value) -> Value {
    json!({
        "rule_id": rule_id,
        "triples_map_id": "#Person",
        "source_name": "hr",
        "table_name": "people",
        "partition_id": partition_id,
        "subject": {"template": "http://ex.org/person/{id}"},
        "predicate": {"constant": predicate},
        "object": object
    })
}

fn dept_rule(partition_id: &str) -> Value {
    json!({
        "rule_id": "dept-label",
        "triples_map_id": "#Dept",
        "source_name": "hr",
        "table_name": "depts",
        "partition_id": partition_id,
        "subject": {"template": "http://ex.org/dept/{id}"},
        "predicate": {"constant": "http://www.w3.org/2000/01/rdf-schema#label"},
        "object": {"reference": "label"}
    })
}

fn works_in_rule(partition_id: &str) -> Value {
    json!({
        "rule_id": "works-in",
        "triples_map_id": "#Person",
        "source_name": "hr",
        "table_name": "people",
        "partition_id": partition_id,
        "subject": {"template": "http://ex.org/person/{id}"},
        "predicate": {"constant": "http://ex.org/worksIn"},
        "parent_triples_map": "#Dept",
        "join_conditions": [{"child_column": "dept_id", "parent_column": "id"}]
    })
}

fn company_rules() -> MappingRules {
    rules(json!([
        person_rule("name", "p0", "http://ex.org/name", json!({"reference": "name", "language": "en"})),
        person_rule("type", "p1", "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
            json!({"constant": "http://ex.org/Person"})),
        works_in_rule("p2"),
        dept_rule("p3"),
    ]))
}

async fn run(source: MemorySource, rules: MappingRules, config: MaterializeConfig) -> TripleSet {
    Materializer::new(Arc::new(source), config)
        .materialize(rules)
        .await
        .expect("materialization succeeds")
        .triples
}

// =============================================================================
// Scripted source
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Fail,
    Stall,
    Panic,
}

/// Delegates to a memory source except for sources with scripted behavior.
#[derive(Debug)]
struct ScriptedSource {
    inner: MemorySource,
    behaviors: HashMap<String, Behavior>,
}

impl ScriptedSource {
    fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            behaviors: HashMap::new(),
        }
    }

    fn with(mut self, source_name: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(source_name.to_string(), behavior);
        self
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn open(&self, source_name: &str) -> MaterializeResult<Box<dyn Connection>> {
        match self.behaviors.get(source_name).copied() {
            Some(Behavior::Fail) => Err(MaterializeError::DataSource(format!(
                "connection to '{}' refused",
                source_name
            ))),
            Some(Behavior::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(MaterializeError::DataSource("stalled".into()))
            }
            Some(Behavior::Panic) => panic!("driver for '{}' crashed", source_name),
            None => self.inner.open(source_name).await,
        }
    }
}

fn rule_on_source(rule_id: &str, partition_id: &str, source_name: &str) -> Value {
    json!({
        "rule_id": rule_id,
        "triples_map_id": format!("#{}", rule_id),
        "source_name": source_name,
        "table_name": "people",
        "partition_id": partition_id,
        "subject": {"template": "http://ex.org/person/{id}"},
        "predicate": {"constant": "http://ex.org/name"},
        "object": {"reference": "name"}
    })
}

// =============================================================================
// Rendering properties
// =============================================================================

#[tokio::test]
async fn end_to_end_two_rows() {
    let source = MemorySource::new().with_table(
        "db",
        "people",
        RowBatch::from_string_rows(
            &["id", "name"],
            &[vec![Some("1"), Some("Ann")], vec![Some("2"), Some("Bob")]],
        )
        .unwrap(),
    );
    let rules = rules(json!([{
        "rule_id": "knows",
        "triples_map_id": "#TM",
        "source_name": "db",
        "table_name": "people",
        "partition_id": "0",
        "subject": {"template": "http://ex.org/{id}", "term_type": "http://www.w3.org/ns/r2rml#IRI"},
        "predicate": {"constant": "http://ex.org/knows", "term_type": "http://www.w3.org/ns/r2rml#IRI"},
        "object": {"reference": "name", "term_type": "http://www.w3.org/ns/r2rml#Literal"}
    }]));

    let triples = run(source, rules, config(1)).await;

    let expected: TripleSet = [
        "<http://ex.org/1> <http://ex.org/knows> \"Ann\" .".to_string(),
        "<http://ex.org/2> <http://ex.org/knows> \"Bob\" .".to_string(),
    ]
    .into_iter()
    .collect();
    assert_eq!(triples, expected);
}

#[tokio::test]
async fn constant_rule_yields_one_triple_for_any_row_count() {
    for rows in [1usize, 2, 7] {
        let ids: Vec<String> = (0..rows).map(|i| i.to_string()).collect();
        let table = RowBatch::from_string_rows(
            &["id"],
            &ids.iter().map(|id| vec![Some(id.as_str())]).collect::<Vec<_>>(),
        )
        .unwrap();
        let source = MemorySource::new().with_table("db", "t", table);
        let rules = rules(json!([{
            "rule_id": "c",
            "triples_map_id": "#C",
            "source_name": "db",
            "table_name": "t",
            "partition_id": "0",
            "subject": {"constant": "http://ex.org/dataset"},
            "predicate": {"constant": "http://ex.org/publisher"},
            "object": {"constant": "ACME", "datatype": "http://www.w3.org/2001/XMLSchema#string"}
        }]));

        let triples = run(source, rules, config(1)).await;
        assert_eq!(triples.len(), 1, "rows = {rows}");
        assert!(triples.contains(
            "<http://ex.org/dataset> <http://ex.org/publisher> \"ACME\"^^<http://www.w3.org/2001/XMLSchema#string> ."
        ));
    }
}

#[tokio::test]
async fn template_iri_encodes_values_but_not_pattern_text() {
    let table = RowBatch::from_string_rows(
        &["city", "home"],
        &[vec![Some("São Paulo/SP"), Some("http://example.com/a b")]],
    )
    .unwrap();
    let source = MemorySource::new().with_table("db", "cities", table);
    let rules = rules(json!([{
        "rule_id": "city",
        "triples_map_id": "#City",
        "source_name": "db",
        "table_name": "cities",
        "partition_id": "0",
        "subject": {"template": "http://ex.org/city/{city}"},
        "predicate": {"constant": "http://xmlns.com/foaf/0.1/homepage"},
        "object": {"reference": "home", "term_type": "http://www.w3.org/ns/r2rml#IRI"}
    }]));

    let triples = run(source, rules, config(1)).await;
    assert_eq!(
        triples.into_sorted_vec(),
        vec![
            "<http://ex.org/city/S%C3%A3o%20Paulo%2FSP> <http://xmlns.com/foaf/0.1/homepage> <http://example.com/a%20b> ."
        ]
    );
}

#[tokio::test]
async fn literal_language_and_datatype_are_exclusive() {
    let both = json!([person_rule(
        "bad",
        "0",
        "http://ex.org/name",
        json!({"reference": "name", "language": "en", "datatype": "http://www.w3.org/2001/XMLSchema#string"})
    )]);
    assert!(matches!(
        MappingRules::from_json(&both.to_string()),
        Err(MaterializeError::Configuration(_))
    ));

    let triples = run(company(), company_rules(), config(1)).await;
    assert!(triples.contains("<http://ex.org/person/1> <http://ex.org/name> \"Ann\"@en ."));
}

#[tokio::test]
async fn named_graph_renders_quads() {
    let rules = rules(json!([{
        "rule_id": "g",
        "triples_map_id": "#Person",
        "source_name": "hr",
        "table_name": "people",
        "partition_id": "0",
        "subject": {"template": "http://ex.org/person/{id}"},
        "predicate": {"constant": "http://ex.org/name"},
        "object": {"reference": "name"},
        "graph": {"template": "http://ex.org/graph/{dept_id}"}
    }]));

    let err = Materializer::new(Arc::new(company()), config(1))
        .materialize(rules.clone())
        .await
        .unwrap_err();
    // Cy has no department, so the graph IRI cannot be built.
    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::Encoding(_))
    ));

    let source = MemorySource::new().with_table(
        "hr",
        "people",
        RowBatch::from_string_rows(
            &["id", "name", "dept_id"],
            &[vec![Some("1"), Some("Ann"), Some("10")]],
        )
        .unwrap(),
    );
    let triples = run(source, rules, config(1)).await;
    assert_eq!(
        triples.to_nquads(),
        "<http://ex.org/person/1> <http://ex.org/name> \"Ann\" <http://ex.org/graph/10> .\n"
    );
}

// =============================================================================
// Joins
// =============================================================================

#[tokio::test]
async fn join_yields_one_triple_per_matching_pair() {
    let rules = rules(json!([works_in_rule("0"), dept_rule("0")]));
    let triples = run(company(), rules, config(1)).await;

    let works_in: Vec<String> = triples
        .into_sorted_vec()
        .into_iter()
        .filter(|t| t.contains("worksIn"))
        .collect();
    // Cy (null dept) and Di (dept 99) have no match.
    assert_eq!(
        works_in,
        vec![
            "<http://ex.org/person/1> <http://ex.org/worksIn> <http://ex.org/dept/10> .",
            "<http://ex.org/person/2> <http://ex.org/worksIn> <http://ex.org/dept/20> .",
            "<http://ex.org/person/5> <http://ex.org/worksIn> <http://ex.org/dept/10> .",
        ]
    );
}

#[tokio::test]
async fn join_fans_out_over_duplicate_parents() {
    let depts = RowBatch::from_string_rows(
        &["id", "code"],
        &[
            vec![Some("10"), Some("S1")],
            vec![Some("10"), Some("S2")],
        ],
    )
    .unwrap();
    let source = MemorySource::new()
        .with_table("hr", "people", people())
        .with_table("hr", "depts", depts);
    let rules = rules(json!([
        works_in_rule("0"),
        {
            "rule_id": "dept-code",
            "triples_map_id": "#Dept",
            "source_name": "hr",
            "table_name": "depts",
            "partition_id": "0",
            "subject": {"template": "http://ex.org/dept/{code}"},
            "predicate": {"constant": "http://ex.org/code"},
            "object": {"reference": "code"}
        }
    ]));

    let triples = run(source, rules, config(1)).await;
    let works_in = triples.iter().filter(|t| t.contains("worksIn")).count();
    // Ann and Ed each match two parent rows.
    assert_eq!(works_in, 4);
}

#[tokio::test]
async fn composite_join_requires_every_condition() {
    let links = RowBatch::from_string_rows(
        &["id", "region", "code"],
        &[
            vec![Some("1"), Some("eu"), Some("x")],
            vec![Some("2"), Some("eu"), Some("y")],
            vec![Some("3"), Some("us"), Some("x")],
        ],
    )
    .unwrap();
    let targets = RowBatch::from_string_rows(
        &["name", "region", "code"],
        &[
            vec![Some("P"), Some("eu"), Some("x")],
            vec![Some("Q"), Some("ap"), Some("y")],
        ],
    )
    .unwrap();
    let source = MemorySource::new()
        .with_table("db", "links", links)
        .with_table("db", "targets", targets);
    let rules = rules(json!([
        {
            "rule_id": "rel",
            "triples_map_id": "#Link",
            "source_name": "db",
            "table_name": "links",
            "partition_id": "0",
            "subject": {"template": "http://ex.org/c/{id}"},
            "predicate": {"constant": "http://ex.org/rel"},
            "parent_triples_map": "#Target",
            "join_conditions": [
                {"child_column": "region", "parent_column": "region"},
                {"child_column": "code", "parent_column": "code"}
            ]
        },
        {
            "rule_id": "target-type",
            "triples_map_id": "#Target",
            "source_name": "db",
            "table_name": "targets",
            "partition_id": "1",
            "subject": {"template": "http://ex.org/p/{name}"},
            "predicate": {"constant": "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"},
            "object": {"constant": "http://ex.org/Target"}
        }
    ]));

    let triples = run(source, rules, config(2)).await;
    let rel: Vec<String> = triples
        .into_sorted_vec()
        .into_iter()
        .filter(|t| t.contains("/rel>"))
        .collect();
    // Rows 2 and 3 each match a parent on one key only.
    assert_eq!(
        rel,
        vec!["<http://ex.org/c/1> <http://ex.org/rel> <http://ex.org/p/P> ."]
    );
}

#[tokio::test]
async fn unknown_column_is_configuration_error() {
    let rules = rules(json!([{
        "rule_id": "bad-column",
        "triples_map_id": "#Person",
        "source_name": "hr",
        "table_name": "people",
        "partition_id": "0",
        "subject": {"template": "http://ex.org/person/{nope}"},
        "predicate": {"constant": "http://ex.org/name"},
        "object": {"reference": "name"}
    }]));
    let source = company();
    let stats = source.stats();

    let err = Materializer::new(Arc::new(source), config(1))
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::Materialize(MaterializeError::Configuration(m)) if m.contains("nope")),
        "unexpected error: {err}"
    );
    assert_eq!(stats.open_now(), 0);
}

#[tokio::test]
async fn unknown_parent_is_join_resolution_error() {
    let rules = rules(json!([works_in_rule("0")]));
    let err = Materializer::new(Arc::new(company()), config(2))
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::JoinResolution(_))
    ));
}

// =============================================================================
// Orchestration
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn result_is_independent_of_pool_and_chunk_size() {
    let baseline = run(company(), company_rules(), config(1)).await;
    assert_eq!(baseline.len(), 5 + 5 + 3 + 3);

    for workers in [2, 4, 8] {
        for chunksize in [1, 3, 100] {
            let triples = run(
                company(),
                company_rules(),
                config(workers).with_chunksize(chunksize),
            )
            .await;
            assert_eq!(triples, baseline, "workers={workers} chunksize={chunksize}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sink_receives_every_partition() {
    let source = company();
    let stats = source.stats();
    let sink = Arc::new(MemorySink::new());
    let result = Materializer::new(Arc::new(source), config(3))
        .with_sink(sink.clone())
        .materialize(company_rules())
        .await
        .unwrap();

    assert_eq!(sink.labels(), vec!["p0", "p1", "p2", "p3"]);
    assert_eq!(sink.unified(), result.triples);
    assert_eq!(
        result
            .partitions
            .iter()
            .map(|p| (p.partition_id.as_str(), p.rules, p.triples))
            .collect::<Vec<_>>(),
        vec![("p0", 1, 5), ("p1", 1, 5), ("p2", 1, 3), ("p3", 1, 3)]
    );

    // One connection per rule, all closed.
    assert_eq!(stats.opened(), 4);
    assert_eq!(stats.open_now(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_failure_aborts_the_run() {
    let source = ScriptedSource::new(company())
        .with("down", Behavior::Fail)
        .with("slow", Behavior::Stall);
    let rules = rules(json!([
        rule_on_source("ok", "a", "hr"),
        rule_on_source("broken", "b", "down"),
        rule_on_source("stuck", "c", "slow"),
    ]));

    let err = Materializer::new(Arc::new(source), config(3))
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::Materialize(MaterializeError::DataSource(m)) if m.contains("refused")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn sequential_run_stops_at_first_failure() {
    let source = ScriptedSource::new(company()).with("down", Behavior::Fail);
    let rules = rules(json!([
        rule_on_source("broken", "a", "down"),
        rule_on_source("ok", "b", "hr"),
    ]));
    let sink = Arc::new(MemorySink::new());

    let err = Materializer::new(Arc::new(source), config(1))
        .with_sink(sink.clone())
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Materialize(MaterializeError::DataSource(_))
    ));
    assert!(sink.labels().is_empty());
}

#[tokio::test]
async fn failed_run_writes_nothing_to_sink() {
    // The failing partition sorts after the successful ones.
    for workers in [1, 3] {
        let source = ScriptedSource::new(company()).with("down", Behavior::Fail);
        let rules = rules(json!([
            rule_on_source("ok", "a", "hr"),
            rule_on_source("also-ok", "b", "hr"),
            rule_on_source("broken", "z", "down"),
        ]));
        let sink = Arc::new(MemorySink::new());

        let result = Materializer::new(Arc::new(source), config(workers))
            .with_sink(sink.clone())
            .materialize(rules)
            .await;
        assert!(result.is_err(), "workers = {workers}");
        assert!(sink.labels().is_empty(), "workers = {workers}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_partition_is_worker_error() {
    let source = ScriptedSource::new(company()).with("crashy", Behavior::Panic);
    let rules = rules(json!([
        rule_on_source("ok", "a", "hr"),
        rule_on_source("boom", "b", "crashy"),
    ]));

    let err = Materializer::new(Arc::new(source), config(2))
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Worker(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn run_timeout_is_enforced() {
    let source = ScriptedSource::new(company()).with("slow", Behavior::Stall);
    let rules = rules(json!([
        rule_on_source("ok", "a", "hr"),
        rule_on_source("stuck", "b", "slow"),
    ]));
    let limit = Duration::from_secs(1);

    let err = Materializer::new(Arc::new(source), config(2).with_run_timeout(limit))
        .materialize(rules)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TimedOut(d) if d == limit));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_running() {
    let source = company();
    let stats = source.stats();
    let err = Materializer::new(Arc::new(source), config(1).with_chunksize(0))
        .materialize(company_rules())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert_eq!(stats.opened(), 0);
}

#[tokio::test]
async fn coerce_float_applies_to_decimal_columns() {
    let schema = Arc::new(BatchSchema::new(vec![
        FieldInfo::new("sku", FieldType::String),
        FieldInfo::new("price", FieldType::Decimal { scale: 2 }),
    ]));
    let products = RowBatch::new(
        schema,
        vec![
            Column::String(vec![Some("A1".into())]),
            Column::Decimal {
                values: vec![Some(1250)],
                scale: 2,
            },
        ],
    )
    .unwrap();
    let rules = rules(json!([{
        "rule_id": "price",
        "triples_map_id": "#Product",
        "source_name": "shop",
        "table_name": "products",
        "partition_id": "0",
        "subject": {"template": "http://ex.org/product/{sku}"},
        "predicate": {"constant": "http://ex.org/price"},
        "object": {"reference": "price", "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}
    }]));

    let source = || MemorySource::new().with_table("shop", "products", products.clone());
    let exact = run(source(), rules.clone(), config(1)).await;
    assert!(exact.iter().any(|t| t.contains("\"12.50\"")));

    let coerced = run(source(), rules, config(1).with_coerce_float(true)).await;
    assert!(coerced.iter().any(|t| t.contains("\"12.5\"")));
}

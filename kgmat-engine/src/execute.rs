//! Per-rule execution
//!
//! Turns one mapping rule into a source query, drains the batch stream and
//! renders every batch into the rule's [`TripleSet`]. Each rule opens its
//! own connection and closes it when done, also on failure.

use std::collections::BTreeSet;

use futures::StreamExt;
use kgmat_rml::{
    render_join_batch, render_rule_batch, MappingRule, MaterializeError, MaterializeResult,
    ObjectMap, RefObjectMap, SubjectMapIndex, TripleSet,
};
use kgmat_tabular::RowBatch;

use crate::config::MaterializeConfig;
use crate::source::{
    Connection, DataSource, JoinQuery, ProjectionQuery, QueryKind, QueryRequest,
};

/// Outcome of one rule
#[derive(Debug)]
pub(crate) struct RuleOutput {
    pub triples: TripleSet,
    pub batches: usize,
    pub rows: usize,
}

/// Materialize a single rule, joining against its parent triples map when
/// the object is a reference.
pub(crate) async fn materialize_rule(
    rule: &MappingRule,
    index: &SubjectMapIndex,
    source: &dyn DataSource,
    config: &MaterializeConfig,
) -> MaterializeResult<RuleOutput> {
    let output = match &rule.object {
        ObjectMap::Term(_) => materialize_plain_rule(rule, source, config).await?,
        ObjectMap::Reference(rom) => {
            materialize_join_rule(rule, rom, index, source, config).await?
        }
    };

    tracing::debug!(
        rule_id = %rule.rule_id,
        triples_map = %rule.triples_map_id,
        batches = output.batches,
        rows = output.rows,
        triples = output.triples.len(),
        "rule materialized"
    );
    Ok(output)
}

async fn materialize_plain_rule(
    rule: &MappingRule,
    source: &dyn DataSource,
    config: &MaterializeConfig,
) -> MaterializeResult<RuleOutput> {
    let columns = to_owned_columns(rule.references());
    tracing::debug!(rule_id = %rule.rule_id, columns = ?columns, "projecting");

    let request = QueryRequest {
        kind: QueryKind::Project(ProjectionQuery {
            logical_table: rule.logical_table.clone(),
            columns,
        }),
        chunksize: config.chunksize,
        coerce_float: config.coerce_float,
    };

    run_query(&rule.source_name, source, request, |batch| {
        render_rule_batch(rule, batch)
    })
    .await
}

async fn materialize_join_rule(
    rule: &MappingRule,
    rom: &RefObjectMap,
    index: &SubjectMapIndex,
    source: &dyn DataSource,
    config: &MaterializeConfig,
) -> MaterializeResult<RuleOutput> {
    let parent = index.resolve(&rom.parent_triples_map)?;
    if !rom.has_conditions() {
        return Err(MaterializeError::Configuration(format!(
            "rule '{}': reference to '{}' has no join conditions",
            rule.rule_id, rom.parent_triples_map
        )));
    }
    if parent.source_name != rule.source_name {
        return Err(MaterializeError::DataSource(format!(
            "rule '{}': cannot join source '{}' with parent source '{}'",
            rule.rule_id, rule.source_name, parent.source_name
        )));
    }

    let child_columns = to_owned_columns(rule.references());
    let mut parent_columns: BTreeSet<&str> = parent.subject.references().into_iter().collect();
    parent_columns.extend(rom.parent_columns());
    let parent_columns = to_owned_columns(parent_columns);

    tracing::debug!(
        rule_id = %rule.rule_id,
        parent = %parent.triples_map_id,
        child_columns = ?child_columns,
        parent_columns = ?parent_columns,
        conditions = rom.join_conditions.len(),
        "joining with parent triples map"
    );

    let request = QueryRequest {
        kind: QueryKind::Join(JoinQuery {
            child_table: rule.logical_table.clone(),
            parent_table: parent.logical_table.clone(),
            child_columns,
            parent_columns,
            conditions: rom.join_conditions.clone(),
        }),
        chunksize: config.chunksize,
        coerce_float: config.coerce_float,
    };

    run_query(&rule.source_name, source, request, |batch| {
        render_join_batch(rule, parent, batch)
    })
    .await
}

/// Open a connection, stream the query through `render`, close the connection.
async fn run_query<F>(
    source_name: &str,
    source: &dyn DataSource,
    request: QueryRequest,
    render: F,
) -> MaterializeResult<RuleOutput>
where
    F: Fn(&RowBatch) -> MaterializeResult<Vec<String>>,
{
    let mut conn = source.open(source_name).await?;
    let drained = drain(conn.as_mut(), request, render).await;
    let closed = conn.close().await;

    let output = drained?;
    closed?;
    Ok(output)
}

async fn drain<F>(
    conn: &mut dyn Connection,
    request: QueryRequest,
    render: F,
) -> MaterializeResult<RuleOutput>
where
    F: Fn(&RowBatch) -> MaterializeResult<Vec<String>>,
{
    let mut stream = conn.query(request).await?;
    let mut output = RuleOutput {
        triples: TripleSet::new(),
        batches: 0,
        rows: 0,
    };

    while let Some(batch) = stream.next().await {
        let batch = batch?;
        output.batches += 1;
        output.rows += batch.num_rows;
        output.triples.extend(render(&batch)?);
    }

    Ok(output)
}

fn to_owned_columns(columns: BTreeSet<&str>) -> Vec<String> {
    columns.into_iter().map(str::to_string).collect()
}

//! In-memory data source
//!
//! Holds named sources, each a set of named tables, and answers projection
//! and join requests against them. Serves tests and callers that already
//! have their data as row batches.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use kgmat_rml::{LogicalTable, MaterializeError, MaterializeResult};
use kgmat_tabular::{CellValue, Column, ColumnRole, RowBatch, TabularError};

use super::{BatchStream, Connection, DataSource, JoinQuery, QueryKind, QueryRequest};

type Tables = HashMap<String, RowBatch>;

/// Open/close counters shared by all connections of a [`MemorySource`].
#[derive(Debug, Default)]
pub struct ConnectionStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl ConnectionStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed
    pub fn open_now(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// Data source backed by in-memory row batches.
///
/// Only `LogicalTable::Table` is supported; SQL queries are rejected.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    sources: HashMap<String, Arc<Tables>>,
    stats: Arc<ConnectionStats>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert_table`](Self::insert_table).
    pub fn with_table(
        mut self,
        source_name: impl Into<String>,
        table_name: impl Into<String>,
        batch: RowBatch,
    ) -> Self {
        self.insert_table(source_name, table_name, batch);
        self
    }

    /// Add or replace a table, creating the source if needed.
    pub fn insert_table(
        &mut self,
        source_name: impl Into<String>,
        table_name: impl Into<String>,
        batch: RowBatch,
    ) {
        let tables = self.sources.entry(source_name.into()).or_default();
        Arc::make_mut(tables).insert(table_name.into(), batch);
    }

    /// Connection counters
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn open(&self, source_name: &str) -> MaterializeResult<Box<dyn Connection>> {
        let tables = self.sources.get(source_name).ok_or_else(|| {
            MaterializeError::DataSource(format!("unknown source '{}'", source_name))
        })?;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            source_name: source_name.to_string(),
            tables: Arc::clone(tables),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MemoryConnection {
    source_name: String,
    tables: Arc<Tables>,
    stats: Arc<ConnectionStats>,
}

impl MemoryConnection {
    fn table(&self, logical_table: &LogicalTable) -> MaterializeResult<&RowBatch> {
        match logical_table {
            LogicalTable::Table(name) => self.tables.get(name).ok_or_else(|| {
                MaterializeError::DataSource(format!(
                    "table '{}' not found in source '{}'",
                    name, self.source_name
                ))
            }),
            LogicalTable::SqlQuery(_) => Err(MaterializeError::DataSource(format!(
                "source '{}' cannot run SQL queries",
                self.source_name
            ))),
        }
    }

    fn project(&self, batch: &RowBatch, columns: &[String]) -> MaterializeResult<RowBatch> {
        batch.project(columns).map_err(|e| match e {
            TabularError::ColumnNotFound(column) => MaterializeError::Configuration(format!(
                "column '{}' not found in source '{}'",
                column, self.source_name
            )),
            other => {
                MaterializeError::DataSource(format!("source '{}': {}", self.source_name, other))
            }
        })
    }

    fn join(&self, query: &JoinQuery) -> MaterializeResult<RowBatch> {
        if query.conditions.is_empty() {
            return Err(MaterializeError::DataSource(
                "join request without join conditions".to_string(),
            ));
        }
        let child = self.table(&query.child_table)?;
        let parent = self.table(&query.parent_table)?;

        let child_keys = key_columns(
            self,
            child,
            query.conditions.iter().map(|c| c.child_column.as_str()),
        )?;
        let parent_keys = key_columns(
            self,
            parent,
            query.conditions.iter().map(|c| c.parent_column.as_str()),
        )?;

        let mut lookup: HashMap<Vec<Cow<'_, str>>, Vec<usize>> = HashMap::new();
        for row in parent.row_indices() {
            if let Some(key) = join_key(&parent_keys, row)? {
                lookup.entry(key).or_default().push(row);
            }
        }

        let mut child_rows = Vec::new();
        let mut parent_rows = Vec::new();
        for row in child.row_indices() {
            let Some(key) = join_key(&child_keys, row)? else {
                continue;
            };
            if let Some(matches) = lookup.get(&key) {
                for &parent_row in matches {
                    child_rows.push(row);
                    parent_rows.push(parent_row);
                }
            }
        }

        let child_side = self
            .project(child, &query.child_columns)?
            .filter_by_indices(&child_rows)
            .with_prefix(ColumnRole::CHILD_PREFIX);
        let parent_side = self
            .project(parent, &query.parent_columns)?
            .filter_by_indices(&parent_rows)
            .with_prefix(ColumnRole::PARENT_PREFIX);

        child_side
            .hconcat(parent_side)
            .map_err(|e| MaterializeError::DataSource(e.to_string()))
    }
}

fn key_columns<'b, 'n>(
    conn: &MemoryConnection,
    batch: &'b RowBatch,
    names: impl Iterator<Item = &'n str>,
) -> MaterializeResult<Vec<&'b Column>> {
    names
        .map(|name| {
            batch.column_by_name(name).ok_or_else(|| {
                MaterializeError::Configuration(format!(
                    "join column '{}' not found in source '{}'",
                    name, conn.source_name
                ))
            })
        })
        .collect()
}

/// Composite key of `row`, or `None` if any part is null.
fn join_key<'b>(
    columns: &[&'b Column],
    row: usize,
) -> MaterializeResult<Option<Vec<Cow<'b, str>>>> {
    let mut key = Vec::with_capacity(columns.len());
    for &column in columns {
        match column.cell_as_string(row)? {
            CellValue::Null => return Ok(None),
            CellValue::Value(v) => key.push(v),
        }
    }
    Ok(Some(key))
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&mut self, request: QueryRequest) -> MaterializeResult<BatchStream> {
        let result = match &request.kind {
            QueryKind::Project(query) => {
                let table = self.table(&query.logical_table)?;
                self.project(table, &query.columns)?
            }
            QueryKind::Join(query) => self.join(query)?,
        };
        let result = if request.coerce_float {
            result.decimals_to_float()
        } else {
            result
        };

        let batches: Vec<MaterializeResult<RowBatch>> =
            result.chunks(request.chunksize).map(Ok).collect();
        Ok(stream::iter(batches).boxed())
    }

    async fn close(self: Box<Self>) -> MaterializeResult<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ProjectionQuery;
    use futures::TryStreamExt;
    use kgmat_rml::JoinCondition;
    use kgmat_tabular::{BatchSchema, FieldInfo, FieldType};

    fn source() -> MemorySource {
        let employees = RowBatch::from_string_rows(
            &["id", "name", "dept_id"],
            &[
                vec![Some("1"), Some("Ann"), Some("10")],
                vec![Some("2"), Some("Bob"), Some("20")],
                vec![Some("3"), Some("Cy"), None],
                vec![Some("4"), Some("Di"), Some("99")],
            ],
        )
        .unwrap();
        let depts = RowBatch::from_string_rows(
            &["id", "label"],
            &[
                vec![Some("10"), Some("Sales")],
                vec![Some("20"), Some("Ops")],
                vec![Some("20"), Some("Ops East")],
            ],
        )
        .unwrap();
        MemorySource::new()
            .with_table("db", "employees", employees)
            .with_table("db", "depts", depts)
    }

    fn project(table: &str, columns: &[&str], chunksize: usize) -> QueryRequest {
        QueryRequest {
            kind: QueryKind::Project(ProjectionQuery {
                logical_table: LogicalTable::Table(table.into()),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            }),
            chunksize,
            coerce_float: false,
        }
    }

    async fn collect(conn: &mut Box<dyn Connection>, request: QueryRequest) -> Vec<RowBatch> {
        conn.query(request).await.unwrap().try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn test_projection_chunked() {
        let source = source();
        let mut conn = source.open("db").await.unwrap();
        let batches = collect(&mut conn, project("employees", &["id"], 3)).await;
        assert_eq!(
            batches.iter().map(|b| b.num_rows).collect::<Vec<_>>(),
            vec![3, 1]
        );
        assert_eq!(batches[0].schema.num_fields(), 1);
        conn.close().await.unwrap();

        let stats = source.stats();
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.open_now(), 0);
    }

    #[tokio::test]
    async fn test_unknown_source_table_and_column() {
        let source = source();
        assert!(matches!(
            source.open("nope").await,
            Err(MaterializeError::DataSource(_))
        ));

        let mut conn = source.open("db").await.unwrap();
        assert!(matches!(
            conn.query(project("missing", &["id"], 10)).await,
            Err(MaterializeError::DataSource(_))
        ));
        assert!(matches!(
            conn.query(project("employees", &["salary"], 10)).await,
            Err(MaterializeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_join_column_is_configuration_error() {
        let mut conn = source().open("db").await.unwrap();
        let request = QueryRequest {
            kind: QueryKind::Join(JoinQuery {
                child_table: LogicalTable::Table("employees".into()),
                parent_table: LogicalTable::Table("depts".into()),
                child_columns: vec!["id".into()],
                parent_columns: vec!["label".into()],
                conditions: vec![JoinCondition::new("division_id", "id")],
            }),
            chunksize: 100,
            coerce_float: false,
        };
        assert!(matches!(
            conn.query(request).await,
            Err(MaterializeError::Configuration(m)) if m.contains("division_id")
        ));
    }

    #[tokio::test]
    async fn test_sql_query_rejected() {
        let mut conn = source().open("db").await.unwrap();
        let request = QueryRequest {
            kind: QueryKind::Project(ProjectionQuery {
                logical_table: LogicalTable::SqlQuery("SELECT 1".into()),
                columns: vec![],
            }),
            chunksize: 10,
            coerce_float: false,
        };
        let err = conn.query(request).await.err().unwrap();
        assert!(err.to_string().contains("SQL"));
    }

    #[tokio::test]
    async fn test_inner_join() {
        let mut conn = source().open("db").await.unwrap();
        let request = QueryRequest {
            kind: QueryKind::Join(JoinQuery {
                child_table: LogicalTable::Table("employees".into()),
                parent_table: LogicalTable::Table("depts".into()),
                child_columns: vec!["dept_id".into(), "id".into()],
                parent_columns: vec!["label".into()],
                conditions: vec![JoinCondition::new("dept_id", "id")],
            }),
            chunksize: 100,
            coerce_float: false,
        };
        let batches = collect(&mut conn, request).await;
        assert_eq!(batches.len(), 1);
        let joined = &batches[0];

        // Ann matches Sales, Bob matches both Ops rows, Cy (null) and Di (99) drop out.
        assert_eq!(joined.num_rows, 3);
        let ids: Vec<_> = (0..3)
            .map(|r| joined.column_for(ColumnRole::Child, "id").unwrap().get_string(r))
            .collect();
        assert_eq!(ids, vec![Some("1"), Some("2"), Some("2")]);
        let labels: Vec<_> = (0..3)
            .map(|r| joined.column_for(ColumnRole::Parent, "label").unwrap().get_string(r))
            .collect();
        assert_eq!(labels, vec![Some("Sales"), Some("Ops"), Some("Ops East")]);
    }

    #[tokio::test]
    async fn test_coerce_float() {
        let schema = Arc::new(BatchSchema::new(vec![FieldInfo::new(
            "price",
            FieldType::Decimal { scale: 1 },
        )]));
        let prices = RowBatch::new(
            schema,
            vec![Column::Decimal {
                values: vec![Some(25)],
                scale: 1,
            }],
        )
        .unwrap();
        let source = MemorySource::new().with_table("db", "prices", prices);
        let mut conn = source.open("db").await.unwrap();

        let mut request = project("prices", &["price"], 10);
        request.coerce_float = true;
        let batches = collect(&mut conn, request).await;
        let price = batches[0].column_by_name("price").unwrap();
        assert_eq!(price.field_type(), FieldType::Float64);
        assert_eq!(price.cell_as_string(0).unwrap().as_str(), Some("2.5"));
    }
}

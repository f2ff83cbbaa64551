//! Columnar batch format for query results.
//!
//! A `RowBatch` is one bounded chunk of a relational query result. Data is
//! stored in typed column vectors with schema information; every cell is
//! nullable. Adapters produce batches, materializers read them by column name
//! and never mutate them.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};

use crate::error::{Result, TabularError};
use crate::role::ColumnRole;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Tabular field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Int64,
    Float64,
    Decimal { scale: i8 },
    String,
    Bytes,
    Date,
    Timestamp,
}

/// Field information for a column in a batch.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Column name, canonical for lookups.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
    /// Whether the field allows nulls.
    pub nullable: bool,
}

impl FieldInfo {
    /// Create a nullable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }
}

/// Schema for a row batch.
#[derive(Debug, Clone)]
pub struct BatchSchema {
    /// Field definitions in column order.
    pub fields: Vec<FieldInfo>,
    name_to_index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Create a new batch schema from field definitions.
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let name_to_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self {
            fields,
            name_to_index,
        }
    }

    /// Get field index by name.
    #[inline]
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get field info by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.index_by_name(name).map(|i| &self.fields[i])
    }

    /// Number of fields in the schema.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Column names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Copy of this schema with every field name prefixed.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::new(
            self.fields
                .iter()
                .map(|f| FieldInfo {
                    name: format!("{}{}", prefix, f.name),
                    ..f.clone()
                })
                .collect(),
        )
    }
}

/// String form of a single cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue<'a> {
    Null,
    Value(Cow<'a, str>),
}

impl<'a> CellValue<'a> {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Null => None,
            CellValue::Value(v) => Some(v),
        }
    }

    pub fn into_option(self) -> Option<Cow<'a, str>> {
        match self {
            CellValue::Null => None,
            CellValue::Value(v) => Some(v),
        }
    }
}

/// Column storage - typed arrays with optional values (nullable).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    /// Decimal: unscaled value with a fixed scale
    Decimal {
        values: Vec<Option<i128>>,
        scale: i8,
    },
    String(Vec<Option<String>>),
    Bytes(Vec<Option<Vec<u8>>>),
    /// Date: days since 1970-01-01
    Date(Vec<Option<i32>>),
    /// Timestamp: microseconds since epoch (UTC)
    Timestamp(Vec<Option<i64>>),
}

impl Column {
    /// Create an empty column of the given type.
    pub fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean(Vec::new()),
            FieldType::Int64 => Self::Int64(Vec::new()),
            FieldType::Float64 => Self::Float64(Vec::new()),
            FieldType::Decimal { scale } => Self::Decimal {
                values: Vec::new(),
                scale,
            },
            FieldType::String => Self::String(Vec::new()),
            FieldType::Bytes => Self::Bytes(Vec::new()),
            FieldType::Date => Self::Date(Vec::new()),
            FieldType::Timestamp => Self::Timestamp(Vec::new()),
        }
    }

    /// Build a string column from borrowed cells.
    pub fn strings<'a>(cells: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self::String(cells.into_iter().map(|c| c.map(str::to_string)).collect())
    }

    /// Get the number of rows in this column.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Decimal { values, .. } => values.len(),
            Self::String(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Date(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    /// Check if the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if value at index is null (out-of-range counts as null).
    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Self::Boolean(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Int64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Float64(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Decimal { values, .. } => values.get(idx).map_or(true, |v| v.is_none()),
            Self::String(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Bytes(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Date(v) => v.get(idx).map_or(true, |v| v.is_none()),
            Self::Timestamp(v) => v.get(idx).map_or(true, |v| v.is_none()),
        }
    }

    /// Get the field type of this column.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Int64(_) => FieldType::Int64,
            Self::Float64(_) => FieldType::Float64,
            Self::Decimal { scale, .. } => FieldType::Decimal { scale: *scale },
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Date(_) => FieldType::Date,
            Self::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Get string value at index (returns None if wrong type or null).
    #[inline]
    pub fn get_string(&self, idx: usize) -> Option<&str> {
        match self {
            Self::String(v) => v.get(idx).and_then(|v| v.as_deref()),
            _ => None,
        }
    }

    /// Render the cell at `idx` as the string used in RDF terms.
    ///
    /// Numbers use their plain decimal form, dates and timestamps ISO 8601,
    /// bytes lowercase hex. Decimals whose scale overflows 128 bits and dates
    /// or timestamps outside the calendar range fail.
    pub fn cell_as_string(&self, idx: usize) -> Result<CellValue<'_>> {
        let value = match self {
            Self::Boolean(v) => v
                .get(idx)
                .copied()
                .flatten()
                .map(|b| Cow::Owned(b.to_string())),
            Self::Int64(v) => v
                .get(idx)
                .copied()
                .flatten()
                .map(|n| Cow::Owned(n.to_string())),
            Self::Float64(v) => v
                .get(idx)
                .copied()
                .flatten()
                .map(|n| Cow::Owned(n.to_string())),
            Self::Decimal { values, scale } => match values.get(idx).copied().flatten() {
                Some(unscaled) => Some(Cow::Owned(format_decimal(unscaled, *scale).ok_or_else(|| {
                    TabularError::NotCoercible {
                        row: idx,
                        reason: format!("decimal {} with scale {} is out of range", unscaled, scale),
                    }
                })?)),
                None => None,
            },
            Self::String(v) => v.get(idx).and_then(|v| v.as_deref()).map(Cow::Borrowed),
            Self::Bytes(v) => v
                .get(idx)
                .and_then(|v| v.as_deref())
                .map(|b| Cow::Owned(hex::encode(b))),
            Self::Date(v) => match v.get(idx).copied().flatten() {
                Some(days) => Some(Cow::Owned(format_date(days).ok_or_else(|| {
                    TabularError::NotCoercible {
                        row: idx,
                        reason: format!("date {} days from epoch is out of range", days),
                    }
                })?)),
                None => None,
            },
            Self::Timestamp(v) => match v.get(idx).copied().flatten() {
                Some(micros) => Some(Cow::Owned(format_timestamp(micros).ok_or_else(|| {
                    TabularError::NotCoercible {
                        row: idx,
                        reason: format!("timestamp {} us from epoch is out of range", micros),
                    }
                })?)),
                None => None,
            },
        };

        Ok(value.map_or(CellValue::Null, CellValue::Value))
    }

    /// Filter column by row indices, returning a new column with only those rows.
    ///
    /// Indices may repeat; each occurrence produces one output row.
    pub fn filter_by_indices(&self, indices: &[usize]) -> Self {
        match self {
            Self::Boolean(v) => Self::Boolean(indices.iter().map(|&i| v[i]).collect()),
            Self::Int64(v) => Self::Int64(indices.iter().map(|&i| v[i]).collect()),
            Self::Float64(v) => Self::Float64(indices.iter().map(|&i| v[i]).collect()),
            Self::Decimal { values, scale } => Self::Decimal {
                values: indices.iter().map(|&i| values[i]).collect(),
                scale: *scale,
            },
            Self::String(v) => Self::String(indices.iter().map(|&i| v[i].clone()).collect()),
            Self::Bytes(v) => Self::Bytes(indices.iter().map(|&i| v[i].clone()).collect()),
            Self::Date(v) => Self::Date(indices.iter().map(|&i| v[i]).collect()),
            Self::Timestamp(v) => Self::Timestamp(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    /// Contiguous row range `[offset, offset + len)`, clamped to the column length.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let start = offset.min(self.len());
        let end = offset.saturating_add(len).min(self.len());
        match self {
            Self::Boolean(v) => Self::Boolean(v[start..end].to_vec()),
            Self::Int64(v) => Self::Int64(v[start..end].to_vec()),
            Self::Float64(v) => Self::Float64(v[start..end].to_vec()),
            Self::Decimal { values, scale } => Self::Decimal {
                values: values[start..end].to_vec(),
                scale: *scale,
            },
            Self::String(v) => Self::String(v[start..end].to_vec()),
            Self::Bytes(v) => Self::Bytes(v[start..end].to_vec()),
            Self::Date(v) => Self::Date(v[start..end].to_vec()),
            Self::Timestamp(v) => Self::Timestamp(v[start..end].to_vec()),
        }
    }

    /// Decimal columns converted to `Float64`; other columns unchanged.
    pub fn decimals_to_float(self) -> Self {
        match self {
            Self::Decimal { values, scale } => {
                let factor = 10f64.powi(scale as i32);
                Self::Float64(
                    values
                        .into_iter()
                        .map(|v| v.map(|n| n as f64 / factor))
                        .collect(),
                )
            }
            other => other,
        }
    }
}

/// Columnar row batch.
#[derive(Debug, Clone)]
pub struct RowBatch {
    /// Schema for this batch.
    pub schema: Arc<BatchSchema>,
    /// Column data in schema order.
    pub columns: Vec<Column>,
    /// Number of rows in the batch.
    pub num_rows: usize,
}

impl RowBatch {
    /// Create a new row batch.
    pub fn new(schema: Arc<BatchSchema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(TabularError::Schema(format!(
                "Column count mismatch: schema has {} fields, got {} columns",
                schema.num_fields(),
                columns.len()
            )));
        }

        let num_rows = columns.first().map_or(0, |c| c.len());

        for (i, col) in columns.iter().enumerate() {
            if col.len() != num_rows {
                return Err(TabularError::Schema(format!(
                    "Row count mismatch: column {} has {} rows, expected {}",
                    i,
                    col.len(),
                    num_rows
                )));
            }
        }

        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Create an empty batch with the given schema.
    pub fn empty(schema: Arc<BatchSchema>) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::empty(f.field_type))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Build a batch of string columns from row-major cells.
    pub fn from_string_rows(names: &[&str], rows: &[Vec<Option<&str>>]) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != names.len()) {
            return Err(TabularError::Schema(format!(
                "Row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                names.len()
            )));
        }

        let schema = Arc::new(BatchSchema::new(
            names
                .iter()
                .map(|n| FieldInfo::new(*n, FieldType::String))
                .collect(),
        ));
        let columns = (0..names.len())
            .map(|c| Column::strings(rows.iter().map(|r| r[c])))
            .collect();
        Self::new(schema, columns)
    }

    /// Get column by name.
    #[inline]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.schema.index_by_name(name).map(|i| &self.columns[i])
    }

    /// Get column by name, failing if it is absent.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column_by_name(name)
            .ok_or_else(|| TabularError::ColumnNotFound(name.to_string()))
    }

    /// Get the column holding logical column `name` on the given side.
    pub fn column_for(&self, role: ColumnRole, name: &str) -> Result<&Column> {
        self.require_column(&role.qualify(name))
    }

    /// Get column by index.
    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Check if the batch is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Filter batch by row indices, returning a new batch with only those rows.
    pub fn filter_by_indices(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| c.filter_by_indices(indices))
            .collect();
        Self {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows: indices.len(),
        }
    }

    /// Project to a subset of columns by name, in the given order.
    pub fn project<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut new_fields = Vec::with_capacity(names.len());
        let mut new_columns = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            let idx = self
                .schema
                .index_by_name(name)
                .ok_or_else(|| TabularError::ColumnNotFound(name.to_string()))?;

            new_fields.push(self.schema.fields[idx].clone());
            new_columns.push(self.columns[idx].clone());
        }

        Ok(Self {
            schema: Arc::new(BatchSchema::new(new_fields)),
            columns: new_columns,
            num_rows: self.num_rows,
        })
    }

    /// Rows `[offset, offset + len)`, clamped to the batch.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let columns: Vec<Column> = self.columns.iter().map(|c| c.slice(offset, len)).collect();
        let num_rows = self.num_rows.saturating_sub(offset).min(len);
        Self {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows,
        }
    }

    /// Split into consecutive batches of at most `chunk_size` rows.
    ///
    /// An empty batch yields no chunks.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = RowBatch> + '_ {
        let step = chunk_size.max(1);
        (0..self.num_rows)
            .step_by(step)
            .map(move |offset| self.slice(offset, step))
    }

    /// Same data with every column name prefixed.
    pub fn with_prefix(self, prefix: &str) -> Self {
        Self {
            schema: Arc::new(self.schema.with_prefix(prefix)),
            columns: self.columns,
            num_rows: self.num_rows,
        }
    }

    /// Place the columns of `other` to the right of this batch's columns.
    pub fn hconcat(self, other: RowBatch) -> Result<Self> {
        if self.num_rows != other.num_rows {
            return Err(TabularError::Schema(format!(
                "Row count mismatch: left has {} rows, right has {}",
                self.num_rows, other.num_rows
            )));
        }
        if let Some(dup) = other
            .schema
            .names()
            .find(|n| self.schema.index_by_name(n).is_some())
        {
            return Err(TabularError::Schema(format!(
                "Duplicate column name: {}",
                dup
            )));
        }

        let mut fields = self.schema.fields.clone();
        fields.extend(other.schema.fields.iter().cloned());
        let mut columns = self.columns;
        columns.extend(other.columns);

        Ok(Self {
            schema: Arc::new(BatchSchema::new(fields)),
            columns,
            num_rows: self.num_rows,
        })
    }

    /// Convert every decimal column to `Float64`.
    pub fn decimals_to_float(self) -> Self {
        let fields = self
            .schema
            .fields
            .iter()
            .map(|f| match f.field_type {
                FieldType::Decimal { .. } => FieldInfo {
                    field_type: FieldType::Float64,
                    ..f.clone()
                },
                _ => f.clone(),
            })
            .collect();
        Self {
            schema: Arc::new(BatchSchema::new(fields)),
            columns: self
                .columns
                .into_iter()
                .map(Column::decimals_to_float)
                .collect(),
            num_rows: self.num_rows,
        }
    }

    /// Iterator over row indices.
    pub fn row_indices(&self) -> impl Iterator<Item = usize> {
        0..self.num_rows
    }
}

/// Exact decimal text, or `None` when the value does not fit in 128 bits.
fn format_decimal(unscaled: i128, scale: i8) -> Option<String> {
    if scale <= 0 {
        let multiplier = 10i128.checked_pow(scale.unsigned_abs() as u32)?;
        Some(unscaled.checked_mul(multiplier)?.to_string())
    } else {
        let divisor = 10u128.checked_pow(scale as u32)?;
        let sign = if unscaled < 0 { "-" } else { "" };
        let magnitude = unscaled.unsigned_abs();
        Some(format!(
            "{}{}.{:0>width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = scale as usize
        ))
    }
}

fn format_date(days: i32) -> Option<String> {
    let date = NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn format_timestamp(micros: i64) -> Option<String> {
    let ts = DateTime::from_timestamp_micros(micros)?;
    Some(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

//! Row cursors returned by queries.
//!
//! A query yields either a [`PartitionedRows`] cursor over a bounded result
//! set or a [`StreamingRows`] cursor over a socket push stream. [`Rows`]
//! wraps both behind the [`RowCursor`] interface.

use crate::error::Result;
use crate::types::{ColumnType, Value};
use async_trait::async_trait;

use super::results::PartitionedRows;
use super::streaming::StreamingRows;

/// Forward-only cursor over decoded rows.
#[async_trait]
pub trait RowCursor: Send {
    /// Column names, in column order.
    fn columns(&self) -> Vec<String>;

    /// Describe column `index`, or `None` if out of range.
    fn column_type(&self, index: usize) -> Option<ColumnType>;

    /// Decode the next row into `dest`.
    ///
    /// Returns `Ok(false)` at the end of the rows.
    ///
    /// # Errors
    ///
    /// Returns a client error if `dest` is not exactly as wide as the row or
    /// the cursor is closed, and a protocol error if a cell cannot be
    /// decoded.
    async fn next(&mut self, dest: &mut [Value]) -> Result<bool>;

    /// Release the cursor. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Rows returned by a query.
#[derive(Debug)]
pub enum Rows {
    /// Bounded result set fetched partition by partition
    Partitioned(PartitionedRows),
    /// Continuous push stream
    Streaming(StreamingRows),
}

impl Rows {
    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns().len()
    }

    /// Describe every column.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.column_count())
            .filter_map(|i| self.column_type(i))
            .collect()
    }

    /// Fetch the next row as an owned vector.
    ///
    /// Returns `None` at the end of the rows.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let mut row = vec![Value::Null; self.column_count()];
        if self.next(&mut row).await? {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Check if this is a streaming cursor.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Rows::Streaming(_))
    }
}

#[async_trait]
impl RowCursor for Rows {
    fn columns(&self) -> Vec<String> {
        match self {
            Rows::Partitioned(rows) => rows.columns(),
            Rows::Streaming(rows) => rows.columns(),
        }
    }

    fn column_type(&self, index: usize) -> Option<ColumnType> {
        match self {
            Rows::Partitioned(rows) => rows.column_type(index),
            Rows::Streaming(rows) => rows.column_type(index),
        }
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        match self {
            Rows::Partitioned(rows) => rows.next(dest).await,
            Rows::Streaming(rows) => rows.next(dest).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Rows::Partitioned(rows) => rows.close().await,
            Rows::Streaming(rows) => rows.close().await,
        }
    }
}

impl From<PartitionedRows> for Rows {
    fn from(rows: PartitionedRows) -> Self {
        Rows::Partitioned(rows)
    }
}

impl From<StreamingRows> for Rows {
    fn from(rows: StreamingRows) -> Self {
        Rows::Streaming(rows)
    }
}

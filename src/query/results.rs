//! Cursor over bounded, partitioned result sets.
//!
//! The first partition arrives with the statement response. Later
//! partitions are fetched on demand when iteration crosses a partition
//! boundary.

use crate::error::{ConversionError, DeltaStreamError, Result};
use crate::transport::messages::{PartitionInfo, ResultSet, ResultSetColumn};
use crate::types::{decode, ColumnType, Value, WireFormat};
use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::rows::RowCursor;
use super::statement::StatementExecutor;

/// Cursor over a bounded result set.
pub struct PartitionedRows {
    executor: StatementExecutor,
    cancel: CancellationToken,
    statement_id: Uuid,
    columns: Vec<ResultSetColumn>,
    partitions: Vec<PartitionInfo>,
    /// Partition currently held in `current`
    partition_index: usize,
    current: ResultSet,
    /// Global index of the last returned row, -1 before the first
    row_index: i64,
    hints_enabled: bool,
    closed: bool,
}

impl PartitionedRows {
    /// Create a cursor positioned before the first row of `first`, which
    /// must hold partition 0.
    ///
    /// # Arguments
    /// * `executor` - Executor used to fetch later partitions
    /// * `cancel` - Token that aborts partition fetches
    /// * `first` - Result set holding partition 0
    /// * `hints_enabled` - Whether display hints are reported
    pub fn new(
        executor: StatementExecutor,
        cancel: CancellationToken,
        first: ResultSet,
        hints_enabled: bool,
    ) -> Self {
        Self {
            executor,
            cancel,
            statement_id: first.statement_id,
            columns: first.metadata.columns.clone(),
            partitions: first.metadata.partition_info.clone(),
            partition_index: 0,
            current: first,
            row_index: -1,
            hints_enabled,
            closed: false,
        }
    }

    /// Statement the rows belong to.
    pub fn statement_id(&self) -> Uuid {
        self.statement_id
    }

    /// Total number of rows across all partitions.
    pub fn total_rows(&self) -> i64 {
        self.partitions.iter().map(|p| i64::from(p.row_count)).sum()
    }

    /// Locate a global row index as `(row within partition, partition)`.
    fn locate(&self, mut row: i64) -> Option<(usize, usize)> {
        for (partition, info) in self.partitions.iter().enumerate() {
            let count = i64::from(info.row_count);
            if row < count {
                return Some((row as usize, partition));
            }
            row -= count;
        }
        None
    }
}

#[async_trait]
impl RowCursor for PartitionedRows {
    fn columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| {
            ColumnType::new(
                c.name.clone(),
                &c.type_name,
                c.nullable,
                self.hints_enabled,
                WireFormat::Paged,
            )
        })
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        if self.closed {
            return Err(DeltaStreamError::Client("rows are closed".to_string()));
        }

        let Some((row, partition)) = self.locate(self.row_index + 1) else {
            return Ok(false);
        };

        if partition != self.partition_index {
            debug!(statement_id = %self.statement_id, partition, "fetching partition");
            let result = self
                .executor
                .get_statement(&self.cancel, self.statement_id, partition as i32)
                .await?;
            self.current = result;
            self.partition_index = partition;
        }
        self.row_index += 1;

        let cells = self.current.rows().get(row).ok_or_else(|| {
            DeltaStreamError::Protocol(format!(
                "partition {} has no row {}",
                partition, row
            ))
        })?;

        if cells.len() != dest.len() {
            return Err(ConversionError::ColumnCountMismatch {
                expected: cells.len(),
                actual: dest.len(),
            }
            .into());
        }

        for (idx, (cell, slot)) in cells.iter().zip(dest.iter_mut()).enumerate() {
            let column = self.columns.get(idx).ok_or_else(|| {
                DeltaStreamError::Protocol(format!("no metadata for column {}", idx))
            })?;
            *slot = decode(cell.as_deref(), &column.type_name, WireFormat::Paged)?;
        }

        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl fmt::Debug for PartitionedRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedRows")
            .field("statement_id", &self.statement_id)
            .field("columns", &self.columns.len())
            .field("partitions", &self.partitions.len())
            .field("partition_index", &self.partition_index)
            .field("row_index", &self.row_index)
            .field("closed", &self.closed)
            .finish()
    }
}

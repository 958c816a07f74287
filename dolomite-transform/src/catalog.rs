//! Table metadata read by access path enumeration and range building.

use std::sync::Arc;

use crate::expr::Column;

pub type TableRef = Arc<TableInfo>;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableInfo {
    name: String,
    columns: Vec<Column>,
    /// Row identifier column, if the table is clustered on one.
    handle: Option<Column>,
    indices: Vec<IndexInfo>,
}

/// A secondary index.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct IndexInfo {
    name: String,
    columns: Vec<Column>,
    /// Prefix length of each index column. `None` means the full value is indexed.
    col_lens: Vec<Option<usize>>,
}

impl TableInfo {
    pub fn new<S: Into<String>>(name: S, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            handle: None,
            indices: vec![],
        }
    }

    pub fn with_handle(mut self, handle: Column) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indices.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn handle(&self) -> Option<&Column> {
        self.handle.as_ref()
    }

    pub fn indices(&self) -> &[IndexInfo] {
        &self.indices
    }
}

impl IndexInfo {
    /// Creates an index covering the full value of every column.
    pub fn new<S: Into<String>>(name: S, columns: Vec<Column>) -> Self {
        let col_lens = vec![None; columns.len()];
        Self {
            name: name.into(),
            columns,
            col_lens,
        }
    }

    /// Indexes only the first `len` characters of column `idx`.
    pub fn with_prefix_len(mut self, idx: usize, len: usize) -> Self {
        if let Some(col_len) = self.col_lens.get_mut(idx) {
            *col_len = Some(len);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn col_lens(&self) -> &[Option<usize>] {
        &self.col_lens
    }

    /// Whether reading this index alone yields every column of `table`.
    pub fn is_covering(&self, table: &TableInfo) -> bool {
        table.columns.iter().all(|c| {
            table.handle.as_ref().map(|h| h.id()) == Some(c.id())
                || self
                    .columns
                    .iter()
                    .zip(self.col_lens.iter())
                    .any(|(idx_col, len)| idx_col.id() == c.id() && len.is_none())
        })
    }
}

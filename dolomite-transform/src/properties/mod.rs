//! Properties of relation operators.
//!
//! Logical properties are things shared by all logically equivalent plans in a group, such as
//! the output schema. The engine tier of a group decides which process evaluates it, and
//! therefore which rules may match it.

use std::fmt::{Display, Formatter};

use enumset::{EnumSet, EnumSetType};
use itertools::Itertools;
use strum_macros::AsRefStr;

use crate::expr::{Column, ColumnId};

/// Ordered output columns of an operator.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `column` by identity.
    pub fn index_of(&self, column: &Column) -> Option<usize> {
        self.index_of_id(column.id())
    }

    pub fn index_of_id(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == id)
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.index_of(column).is_some()
    }

    /// Concatenates two schemas, e.g. output of an inner join.
    pub fn join(&self, other: &Schema) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .chain(other.columns.iter())
                .cloned()
                .collect(),
        )
    }

    /// Columns of `self` not in `other`.
    pub fn difference(&self, other: &[Column]) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .filter(|c| !other.iter().any(|o| o.id() == c.id()))
                .cloned()
                .collect(),
        )
    }

    pub fn push(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn remove(&mut self, idx: usize) -> Column {
        self.columns.remove(idx)
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.columns.iter().join(", "))
    }
}

#[derive(Clone, Default, PartialEq, Debug, Hash, Eq)]
pub struct LogicalProperty {
    schema: Schema,
}

impl LogicalProperty {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Where a group is evaluated.
#[derive(EnumSetType, Debug, AsRefStr)]
pub enum EngineTier {
    /// The query-engine process.
    Coordinator,
    /// Data nodes. Only a restricted expression language is available here.
    Storage,
}

impl EngineTier {
    pub fn coordinator_only() -> EnumSet<EngineTier> {
        EnumSet::only(EngineTier::Coordinator)
    }

    pub fn storage_only() -> EnumSet<EngineTier> {
        EnumSet::only(EngineTier::Storage)
    }

    pub fn all() -> EnumSet<EngineTier> {
        EnumSet::all()
    }
}

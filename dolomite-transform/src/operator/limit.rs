use std::fmt::Formatter;

use crate::error::OptResult;
use crate::operator::{single_input, ByItem, DisplayFields, ListFmt, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Skips `offset` rows, then returns at most `count` rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    offset: u64,
    count: u64,
}

impl Limit {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl OperatorTrait for Limit {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(single_input(inputs)?.clone())
    }
}

impl DisplayFields for Limit {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("offset", &self.offset)
            .field("count", &self.count)
            .finish()
    }
}

/// A limit over sorted input, i.e. the first `offset + count` rows by `by_items` with the
/// first `offset` skipped.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TopN {
    by_items: Vec<ByItem>,
    offset: u64,
    count: u64,
}

impl TopN {
    pub fn new(by_items: Vec<ByItem>, offset: u64, count: u64) -> Self {
        Self {
            by_items,
            offset,
            count,
        }
    }

    pub fn by_items(&self) -> &[ByItem] {
        &self.by_items
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl OperatorTrait for TopN {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _ctx: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        Ok(single_input(inputs)?.clone())
    }
}

impl DisplayFields for TopN {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("by_items", &ListFmt(&self.by_items))
            .field("offset", &self.offset)
            .field("count", &self.count)
            .finish()
    }
}

//! ## Background
//!
//! A Cascades style optimizer keeps every logically equivalent alternative of a sub plan in one
//! group of a memo, so that rewrites never destroy information a later cost comparison may need.
//! Rewrites are expressed as transformation rules: each rule declares a pattern over operators,
//! and for every binding of the pattern in memo it proposes new equivalent expressions. [1]
//!
//! This crate contains the logical rewrite step of such an optimizer for a two tier engine, where
//! a storage tier scans and pre-processes rows, and a coordinator tier gathers and finishes them.
//! It covers predicate push down, access path enumeration, two phase aggregation and a few plan
//! shape rewrites. Searching for the cheapest plan, and choosing in which order groups are
//! explored, belongs to callers.
//!
//! ## Design
//!
//! * [`cascades`] Memo, pattern binding and single step rule application.
//! * [`rules`] Rule definitions, the rule catalog and rule implementations.
//! * [`operator`] Logical relational operators.
//! * [`expr`] Scalar expressions and the pure functions rules use to rewrite them.
//! * [`ranger`] Key ranges built from predicates for table and index scans.
//! * [`catalog`] Tables and indices known to scans.
//! * [`properties`] Logical properties and engine tiers.
//! * [`plan`] Plan trees used to build memo.
//! * [`optimizer`] Configuration and per session context.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 2. Columnbia Project, https://github.com/yongwen/columbia

#[macro_use]
extern crate lazy_static;

pub mod cascades;
pub mod catalog;
pub mod error;
pub mod expr;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;
pub mod ranger;
pub mod rules;
pub mod utils;

#[cfg(test)]
mod test_utils;

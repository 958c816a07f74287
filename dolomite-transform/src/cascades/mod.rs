//! Cascades style memo and the machinery applying rules to it.
//!
//! [`Memo`] stores groups of logically equivalent expressions, [`Binding`] enumerates the ways
//! a rule pattern matches memo, and [`Explorer`] applies rules to one group expression at a
//! time. Deciding which expressions to explore, and when to stop, is left to callers.

mod memo;
pub use memo::*;
mod binding;
pub use binding::*;
mod explorer;
pub use explorer::*;

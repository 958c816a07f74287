use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use thiserror::Error;

pub type OptResult<T> = anyhow::Result<T>;

/// Failures of key range construction.
///
/// These are data errors: a rule depending on range building surfaces them to the caller
/// unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("can't convert {value:?} to {target} while building ranges")]
    IncompatibleType { value: ScalarValue, target: DataType },
    #[error("index has {columns} columns but {lens} column lengths")]
    ColumnLengthMismatch { columns: usize, lens: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule {0:?}")]
    UnknownRule(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("malformed optimizer config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

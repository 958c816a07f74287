use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use arrow_schema::DataType;
use serde::Deserialize;

use crate::error::{ConfigError, OptResult};
use crate::expr::{BuiltinFunc, Column, ColumnId};
use crate::rules::RuleId;

/// Tunables of the rewrite rules.
///
/// ```yaml
/// disabled_rules: [PushSelDownJoin]
/// storage_pushdown_blacklist: [concat]
/// enable_aggregation_split: false
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Rules removed from the catalog, by [`RuleId`] name.
    pub disabled_rules: Vec<String>,
    /// Functions the storage tier must not evaluate, by [`BuiltinFunc`] name.
    pub storage_pushdown_blacklist: Vec<String>,
    pub enable_aggregation_split: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            disabled_rules: vec![],
            storage_pushdown_blacklist: vec![],
            enable_aggregation_split: true,
        }
    }
}

impl OptimizerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig = serde_yaml::from_str(yaml)?;
        config.disabled_rule_ids()?;
        config.blacklisted_funcs()?;
        Ok(config)
    }

    pub fn disabled_rule_ids(&self) -> Result<Vec<RuleId>, ConfigError> {
        self.disabled_rules
            .iter()
            .map(|name| {
                RuleId::from_str(name).map_err(|_| ConfigError::UnknownRule(name.clone()))
            })
            .collect()
    }

    pub fn blacklisted_funcs(&self) -> Result<Vec<BuiltinFunc>, ConfigError> {
        self.storage_pushdown_blacklist
            .iter()
            .map(|name| {
                BuiltinFunc::from_str(name)
                    .map_err(|_| ConfigError::UnknownFunction(name.clone()))
            })
            .collect()
    }
}

/// Context for optimization, shared by every rule application.
///
/// Carries the configuration and allocates ids of columns created by rules.
pub struct OptimizerContext {
    config: OptimizerConfig,
    storage_blacklist: Vec<BuiltinFunc>,
    next_column_id: AtomicU64,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            config: OptimizerConfig::default(),
            storage_blacklist: vec![],
            next_column_id: AtomicU64::new(1),
        }
    }
}

impl OptimizerContext {
    pub fn new(config: OptimizerConfig) -> OptResult<Self> {
        let storage_blacklist = config.blacklisted_funcs()?;
        Ok(Self {
            config,
            storage_blacklist,
            next_column_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn is_storage_blacklisted(&self, func: BuiltinFunc) -> bool {
        self.storage_blacklist.contains(&func)
    }

    pub fn next_column_id(&self) -> ColumnId {
        ColumnId(self.next_column_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a column never seen before.
    pub fn new_column<S: Into<String>>(&self, name: S, data_type: DataType) -> Column {
        Column::new(self.next_column_id(), name, data_type)
    }
}

use std::sync::Arc;

use arrow_schema::Schema;

use crate::cascades::{Binding, GroupId, Memo};
use crate::catalog::{IndexInfo, TableInfo, TableRef};
use crate::optimizer::OptimizerContext;
use crate::rules::{OptExpression, Rule, RuleImpl, RuleResult};

const T1_SCHEMA_JSON: &str = r#"{
                "fields": [
                    {
                        "name": "c1",
                        "nullable": false,
                        "data_type": "Int64",
                        "dict_id": 0,
                        "dict_is_ordered": false,
                        "metadata": {}
                    },
                    {
                        "name": "c2",
                        "nullable": false,
                        "data_type": "Int64",
                        "dict_id": 0,
                        "dict_is_ordered": false,
                        "metadata": {}
                    },
                    {
                        "name": "c3",
                        "nullable": true,
                        "data_type": "Utf8",
                        "dict_id": 0,
                        "dict_is_ordered": false,
                        "metadata": {}
                    }
                ],
                "metadata": {}
            }"#;

const T2_SCHEMA_JSON: &str = r#"{
                "fields": [
                    {
                        "name": "d1",
                        "nullable": false,
                        "data_type": "Int64",
                        "dict_id": 0,
                        "dict_is_ordered": false,
                        "metadata": {}
                    },
                    {
                        "name": "d2",
                        "nullable": false,
                        "data_type": "Int64",
                        "dict_id": 0,
                        "dict_is_ordered": false,
                        "metadata": {}
                    }
                ],
                "metadata": {}
            }"#;

/// Creates a table with columns from an arrow schema in json.
pub fn table_from_schema(ctx: &OptimizerContext, name: &str, json: &str) -> TableInfo {
    let schema: Schema = serde_json::from_str(json).unwrap();
    let columns = schema
        .fields()
        .iter()
        .map(|field| ctx.new_column(field.name().clone(), field.data_type().clone()))
        .collect();
    TableInfo::new(name, columns)
}

/// `t1(c1, c2, c3)` clustered on `c1`, with indices `idx_c2(c2)` and `idx_c2_c3(c2, c3)`.
pub fn table_t1(ctx: &OptimizerContext) -> TableRef {
    let table = table_from_schema(ctx, "t1", T1_SCHEMA_JSON);
    let columns = table.columns().to_vec();
    Arc::new(
        table
            .with_handle(columns[0].clone())
            .with_index(IndexInfo::new("idx_c2", vec![columns[1].clone()]))
            .with_index(IndexInfo::new(
                "idx_c2_c3",
                vec![columns[1].clone(), columns[2].clone()],
            )),
    )
}

/// `t2(d1, d2)` without handle or indices.
pub fn table_t2(ctx: &OptimizerContext) -> TableRef {
    Arc::new(table_from_schema(ctx, "t2", T2_SCHEMA_JSON))
}

/// First binding of `rule` rooted at an expression of `group_id`.
pub fn bind_rule(rule: &RuleImpl, memo: &Memo, group_id: GroupId) -> OptExpression {
    Binding::of_group(group_id, rule.pattern(), memo)
        .into_iter()
        .next()
        .unwrap()
}

/// Applies `rule` to its first binding at root group of `memo`.
pub fn apply_at_root(rule: &RuleImpl, memo: &Memo, ctx: &OptimizerContext) -> RuleResult {
    apply_at(rule, memo, ctx, memo.root_group_id())
}

pub fn apply_at(
    rule: &RuleImpl,
    memo: &Memo,
    ctx: &OptimizerContext,
    group_id: GroupId,
) -> RuleResult {
    let input = bind_rule(rule, memo, group_id);
    assert!(rule.matches(&input, memo, ctx));
    let mut result = RuleResult::new();
    rule.apply(input, memo, ctx, &mut result).unwrap();
    result
}

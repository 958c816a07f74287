use crate::error::OptResult;
use crate::plan::{Plan, PlanNode};
use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};
use std::borrow::Cow;
use std::default::Default;
use std::io::Write;

impl<'a> TreeItem for &'a PlanNode {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(&self.operator))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.inputs
                .iter()
                .map(|c| &**c)
                .collect::<Vec<&'a PlanNode>>(),
        )
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    write_tree_with(&&*plan.root, output, &config)
}

pub fn explain_to_string(plan: &Plan) -> OptResult<String> {
    let mut buf = Vec::new();
    explain(plan, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use crate::expr::{col, lit};
    use crate::operator::ByItem;
    use crate::optimizer::OptimizerContext;
    use crate::plan::explain::explain_to_string;
    use crate::plan::LogicalPlanBuilder;
    use crate::test_utils::table_t1;

    #[test]
    fn test_explain_logical_plan() {
        let ctx = OptimizerContext::default();
        let t1 = table_t1(&ctx);
        let c1 = t1.column("c1").unwrap().clone();
        let plan = LogicalPlanBuilder::new(&ctx)
            .scan(t1.clone())
            .selection(vec![col(&c1).gt(lit(5i64))])
            .sort(vec![ByItem::asc(col(&c1))])
            .limit(0, 10)
            .build()
            .unwrap();

        let expected_result = "\
LogicalLimit { offset: 0, count: 10 }
└─ LogicalSort { by_items: [c1#1 asc] }
   └─ LogicalSelection { conditions: [(c1#1 > 5)] }
      └─ LogicalDataSource { table: \"t1\" }
";

        let result = explain_to_string(&plan).unwrap();

        assert_eq!(expected_result, result);
    }
}

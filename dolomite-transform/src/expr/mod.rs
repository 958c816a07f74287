//! Scalar expressions evaluated by operators.
//!
//! Rules never evaluate expressions. They only inspect and rebuild them through the pure
//! functions in [`utils`], [`constant`], [`pushdown`] and [`aggregation`].

use std::fmt::{Display, Formatter};

use arrow_schema::DataType;
use datafusion_common::ScalarValue;
use datafusion_expr::Operator;
use strum_macros::{AsRefStr, EnumString};

pub mod aggregation;
pub mod constant;
pub mod pushdown;
mod utils;
pub use utils::*;

/// Unique id of a column. Two columns are the same column iff their ids are equal.
#[derive(Clone, Copy, Debug, derive_more::Display, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ColumnId(pub u64);

/// A column produced by some operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Column {
    id: ColumnId,
    name: String,
    data_type: DataType,
}

impl Column {
    pub fn new<S: Into<String>>(id: ColumnId, name: S, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Builtin scalar functions.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr, EnumString, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinFunc {
    Abs,
    Ceil,
    Floor,
    Lower,
    Upper,
    Length,
    Concat,
    Substring,
    Coalesce,
    IfNull,
    Rand,
    Sleep,
    Uuid,
    /// Reads a session variable, e.g. `@a`.
    GetVar,
    /// Assigns a session variable, e.g. `@a := expr`.
    SetVar,
}

impl BuiltinFunc {
    /// Functions whose result depends on more than their arguments.
    pub fn is_deterministic(&self) -> bool {
        !matches!(
            self,
            BuiltinFunc::Rand
                | BuiltinFunc::Sleep
                | BuiltinFunc::Uuid
                | BuiltinFunc::GetVar
                | BuiltinFunc::SetVar
        )
    }

    /// Functions whose evaluation is observable outside of the result value.
    pub fn has_mutable_effect(&self) -> bool {
        matches!(
            self,
            BuiltinFunc::Rand | BuiltinFunc::Sleep | BuiltinFunc::Uuid | BuiltinFunc::SetVar
        )
    }

    fn return_type(&self, args: &[ScalarExpr]) -> DataType {
        let first_arg_type = || {
            args.first()
                .map(|arg| arg.data_type())
                .unwrap_or(DataType::Null)
        };
        match self {
            BuiltinFunc::Abs
            | BuiltinFunc::Ceil
            | BuiltinFunc::Floor
            | BuiltinFunc::Coalesce
            | BuiltinFunc::IfNull => first_arg_type(),
            BuiltinFunc::Lower
            | BuiltinFunc::Upper
            | BuiltinFunc::Concat
            | BuiltinFunc::Substring
            | BuiltinFunc::Uuid
            | BuiltinFunc::GetVar => DataType::Utf8,
            BuiltinFunc::Length | BuiltinFunc::Sleep => DataType::Int64,
            BuiltinFunc::Rand => DataType::Float64,
            BuiltinFunc::SetVar => args
                .get(1)
                .map(|arg| arg.data_type())
                .unwrap_or(DataType::Null),
        }
    }
}

/// A scalar expression tree.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum ScalarExpr {
    Column(Column),
    Literal(ScalarValue),
    BinaryExpr {
        left: Box<ScalarExpr>,
        op: Operator,
        right: Box<ScalarExpr>,
    },
    Not(Box<ScalarExpr>),
    IsNull(Box<ScalarExpr>),
    ScalarFunction {
        func: BuiltinFunc,
        args: Vec<ScalarExpr>,
    },
}

pub fn col(column: &Column) -> ScalarExpr {
    ScalarExpr::Column(column.clone())
}

pub fn lit<T: Into<ScalarValue>>(value: T) -> ScalarExpr {
    ScalarExpr::Literal(value.into())
}

pub fn binary_expr(left: ScalarExpr, op: Operator, right: ScalarExpr) -> ScalarExpr {
    ScalarExpr::BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

pub fn func(func: BuiltinFunc, args: Vec<ScalarExpr>) -> ScalarExpr {
    ScalarExpr::ScalarFunction { func, args }
}

/// `@name`
pub fn get_var<S: Into<String>>(name: S) -> ScalarExpr {
    func(BuiltinFunc::GetVar, vec![lit(ScalarValue::Utf8(Some(name.into())))])
}

/// `@name := value`
pub fn set_var<S: Into<String>>(name: S, value: ScalarExpr) -> ScalarExpr {
    func(BuiltinFunc::SetVar, vec![lit(ScalarValue::Utf8(Some(name.into()))), value])
}

impl ScalarExpr {
    pub fn eq(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::Eq, other)
    }

    pub fn not_eq(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::NotEq, other)
    }

    pub fn lt(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::Lt, other)
    }

    pub fn lt_eq(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::LtEq, other)
    }

    pub fn gt(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::Gt, other)
    }

    pub fn gt_eq(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::GtEq, other)
    }

    pub fn and(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::And, other)
    }

    pub fn or(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::Or, other)
    }

    pub fn plus(self, other: ScalarExpr) -> ScalarExpr {
        binary_expr(self, Operator::Plus, other)
    }

    pub fn is_null(self) -> ScalarExpr {
        ScalarExpr::IsNull(Box::new(self))
    }

    pub fn negate(self) -> ScalarExpr {
        ScalarExpr::Not(Box::new(self))
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self {
            ScalarExpr::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&ScalarValue> {
        match self {
            ScalarExpr::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ScalarExpr::Literal(_))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarExpr::Column(c) => c.data_type().clone(),
            ScalarExpr::Literal(v) => v.get_datatype(),
            ScalarExpr::BinaryExpr { left, op, .. } => match op {
                Operator::Plus
                | Operator::Minus
                | Operator::Multiply
                | Operator::Divide
                | Operator::Modulo => left.data_type(),
                _ => DataType::Boolean,
            },
            ScalarExpr::Not(_) | ScalarExpr::IsNull(_) => DataType::Boolean,
            ScalarExpr::ScalarFunction { func, args } => func.return_type(args),
        }
    }

    /// Visits every node of the tree in pre-order, stopping early when `f` returns false.
    pub fn visit<F: FnMut(&ScalarExpr) -> bool>(&self, f: &mut F) -> bool {
        if !f(self) {
            return false;
        }
        match self {
            ScalarExpr::Column(_) | ScalarExpr::Literal(_) => true,
            ScalarExpr::BinaryExpr { left, right, .. } => left.visit(f) && right.visit(f),
            ScalarExpr::Not(e) | ScalarExpr::IsNull(e) => e.visit(f),
            ScalarExpr::ScalarFunction { args, .. } => args.iter().all(|arg| arg.visit(f)),
        }
    }

    /// Rebuilds the tree bottom up, replacing each node with `f(node)`.
    pub fn transform_up<F: FnMut(ScalarExpr) -> ScalarExpr>(self, f: &mut F) -> ScalarExpr {
        let rebuilt = match self {
            ScalarExpr::BinaryExpr { left, op, right } => ScalarExpr::BinaryExpr {
                left: Box::new(left.transform_up(f)),
                op,
                right: Box::new(right.transform_up(f)),
            },
            ScalarExpr::Not(e) => ScalarExpr::Not(Box::new(e.transform_up(f))),
            ScalarExpr::IsNull(e) => ScalarExpr::IsNull(Box::new(e.transform_up(f))),
            ScalarExpr::ScalarFunction { func, args } => ScalarExpr::ScalarFunction {
                func,
                args: args.into_iter().map(|arg| arg.transform_up(f)).collect(),
            },
            leaf => leaf,
        };
        f(rebuilt)
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Column(c) => write!(f, "{}", c),
            ScalarExpr::Literal(v) => write!(f, "{}", v),
            ScalarExpr::BinaryExpr { left, op, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            ScalarExpr::Not(e) => write!(f, "not({})", e),
            ScalarExpr::IsNull(e) => write!(f, "isnull({})", e),
            ScalarExpr::ScalarFunction { func, args } => {
                write!(f, "{}(", func)?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

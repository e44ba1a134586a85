//! Bound scalar expressions.
//!
//! Expressions are already bound by the time they reach the optimizer: every column carries the
//! relation alias that produces it, and subqueries are referenced by id into the owning
//! [`Plan`](crate::plan::Plan).

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use derive_more::{Display as DeriveDisplay, From};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use strum_macros::{Display as StrumDisplay, EnumString};

/// A (possibly qualified) column reference.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ColumnRef {
    relation: Option<String>,
    name: String,
}

impl ColumnRef {
    pub fn new<R: Into<String>, N: Into<String>>(relation: R, name: N) -> Self {
        Self {
            relation: Some(relation.into()),
            name: name.into(),
        }
    }

    /// Column produced by a computation, e.g. an aggregate or projection alias.
    pub fn unqualified<N: Into<String>>(name: N) -> Self {
        Self {
            relation: None,
            name: name.into(),
        }
    }

    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_relation<R: Into<String>>(&self, relation: R) -> Self {
        Self::new(relation, self.name.clone())
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.relation {
            Some(r) => write!(f, "{}.{}", r, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, From)]
pub enum ScalarValue {
    #[from(ignore)]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
}

impl ScalarValue {
    /// Numeric view used for histogram interpolation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(v.into_inner()),
            _ => None,
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(OrderedFloat(v))
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v),
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, StrumDisplay, EnumString)]
pub enum BinaryOperator {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<>")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtEq,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "like")]
    Like,
}

impl BinaryOperator {
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Gt | BinaryOperator::GtEq
        )
    }

    pub fn is_comparison(&self) -> bool {
        self.is_range() || matches!(self, BinaryOperator::Eq | BinaryOperator::NotEq)
    }

    /// Operator to use when both sides are swapped: `a < b` is `b > a`.
    pub fn commute(&self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::Eq => Some(BinaryOperator::Eq),
            BinaryOperator::NotEq => Some(BinaryOperator::NotEq),
            BinaryOperator::Lt => Some(BinaryOperator::Gt),
            BinaryOperator::LtEq => Some(BinaryOperator::GtEq),
            BinaryOperator::Gt => Some(BinaryOperator::Lt),
            BinaryOperator::GtEq => Some(BinaryOperator::LtEq),
            BinaryOperator::Plus => Some(BinaryOperator::Plus),
            BinaryOperator::Multiply => Some(BinaryOperator::Multiply),
            BinaryOperator::Minus | BinaryOperator::Divide | BinaryOperator::Like => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, DeriveDisplay, From)]
#[display(fmt = "$sq{}", _0)]
pub struct SubqueryId(pub u32);

#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Expr {
    Column(ColumnRef),
    Literal(ScalarValue),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    /// Scalar, `EXISTS` or `IN` subquery, the plan lives in [`Plan::subqueries`].
    ///
    /// [`Plan::subqueries`]: crate::plan::Plan::subqueries
    Subquery(SubqueryId),
}

pub fn col<R: Into<String>, N: Into<String>>(relation: R, name: N) -> Expr {
    Expr::Column(ColumnRef::new(relation, name))
}

pub fn lit<V: Into<ScalarValue>>(value: V) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::Eq, self, other)
    }

    pub fn not_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::NotEq, self, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::Lt, self, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::LtEq, self, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::Gt, self, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        Expr::binary(BinaryOperator::GtEq, self, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::conjunction(vec![self, other]).unwrap_or(Expr::Literal(ScalarValue::Boolean(true)))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(vec![self, other])
    }

    /// Builds a flattened conjunction, `None` for an empty list.
    pub fn conjunction<I: IntoIterator<Item = Expr>>(exprs: I) -> Option<Expr> {
        let mut conjuncts: Vec<Expr> = exprs.into_iter().flat_map(Expr::into_conjuncts).collect();
        match conjuncts.len() {
            0 => None,
            1 => conjuncts.pop(),
            _ => Some(Expr::And(conjuncts)),
        }
    }

    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(children) => children.iter().flat_map(|c| c.conjuncts()).collect(),
            other => vec![other],
        }
    }

    pub fn into_conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::And(children) => children.into_iter().flat_map(Expr::into_conjuncts).collect(),
            other => vec![other],
        }
    }

    /// Columns referenced directly by this expression, subquery bodies are not visited.
    pub fn columns(&self) -> BTreeSet<ColumnRef> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns(&self, columns: &mut BTreeSet<ColumnRef>) {
        match self {
            Expr::Column(c) => {
                columns.insert(c.clone());
            }
            Expr::Literal(_) | Expr::Subquery(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(columns);
                right.collect_columns(columns);
            }
            Expr::Not(e) => e.collect_columns(columns),
            Expr::And(es) | Expr::Or(es) | Expr::Function { args: es, .. } => {
                es.iter().for_each(|e| e.collect_columns(columns))
            }
            Expr::InList { expr, list } => {
                expr.collect_columns(columns);
                list.iter().for_each(|e| e.collect_columns(columns));
            }
        }
    }

    pub fn subqueries(&self) -> Vec<SubqueryId> {
        let mut ids = vec![];
        self.visit(&mut |e| {
            if let Expr::Subquery(id) = e {
                ids.push(*id);
            }
        });
        ids
    }

    /// Pre-order visit.
    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) => {}
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Not(e) => e.visit(f),
            Expr::And(es) | Expr::Or(es) | Expr::Function { args: es, .. } => {
                es.iter().for_each(|e| e.visit(f))
            }
            Expr::InList { expr, list } => {
                expr.visit(f);
                list.iter().for_each(|e| e.visit(f));
            }
        }
    }

    /// Rebuilds the expression bottom-up, replacing every node for which `f` returns `Some`.
    pub fn transform<F: Fn(&Expr) -> Option<Expr>>(&self, f: &F) -> Expr {
        if let Some(replaced) = f(self) {
            return replaced;
        }
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) => self.clone(),
            Expr::Binary { op, left, right } => {
                Expr::binary(*op, left.transform(f), right.transform(f))
            }
            Expr::Not(e) => Expr::Not(Box::new(e.transform(f))),
            Expr::And(es) => Expr::And(es.iter().map(|e| e.transform(f)).collect()),
            Expr::Or(es) => Expr::Or(es.iter().map(|e| e.transform(f)).collect()),
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|e| e.transform(f)).collect(),
            },
            Expr::InList { expr, list } => Expr::InList {
                expr: Box::new(expr.transform(f)),
                list: list.iter().map(|e| e.transform(f)).collect(),
            },
        }
    }

    /// `col = col`, in either order.
    pub fn as_column_equality(&self) -> Option<(&ColumnRef, &ColumnRef)> {
        match self {
            Expr::Binary {
                op: BinaryOperator::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(l), Expr::Column(r)) => Some((l, r)),
                _ => None,
            },
            _ => None,
        }
    }

    /// `col op literal`, normalized so the column is on the left.
    pub fn as_column_comparison(&self) -> Option<(&ColumnRef, BinaryOperator, &ScalarValue)> {
        match self {
            Expr::Binary { op, left, right } if op.is_comparison() || *op == BinaryOperator::Like => {
                match (left.as_ref(), right.as_ref()) {
                    (Expr::Column(c), Expr::Literal(v)) => Some((c, *op, v)),
                    (Expr::Literal(v), Expr::Column(c)) => op.commute().map(|op| (c, op, v)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Binary { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Not(e) => write!(f, "not ({})", e),
            Expr::And(es) => write!(f, "{}", es.iter().join(" and ")),
            Expr::Or(es) => write!(f, "({})", es.iter().join(" or ")),
            Expr::InList { expr, list } => write!(f, "{} in ({})", expr, list.iter().join(", ")),
            Expr::Function { name, args } => write!(f, "{}({})", name, args.iter().join(", ")),
            Expr::Subquery(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjunction_flattens() {
        let e = Expr::conjunction(vec![
            col("a", "x").eq(lit(1i64)),
            col("a", "y").eq(col("b", "y")).and(col("b", "z").gt(lit(3i64))),
        ])
        .unwrap();

        assert_eq!(3, e.conjuncts().len());
        assert!(Expr::conjunction(vec![]).is_none());
        assert_eq!(
            Some(col("a", "x")),
            Expr::conjunction(vec![col("a", "x")])
        );
    }

    #[test]
    fn test_columns() {
        let e = col("a", "x").eq(col("b", "y")).and(col("a", "x").lt(lit(5i64)));
        let columns: Vec<String> = e.columns().iter().map(|c| c.to_string()).collect();
        assert_eq!(vec!["a.x", "b.y"], columns);
    }

    #[test]
    fn test_column_comparison_commutes_literal() {
        let e = lit(10i64).lt(col("t", "a"));
        let (c, op, v) = e.as_column_comparison().unwrap();
        assert_eq!("t.a", c.to_string());
        assert_eq!(BinaryOperator::Gt, op);
        assert_eq!(&ScalarValue::Int64(10), v);
    }

    #[test]
    fn test_transform_replaces_columns() {
        let e = col("t", "a").eq(lit(1i64));
        let replaced = e.transform(&|e| match e {
            Expr::Column(c) if c.name() == "a" => Some(col("u", "b")),
            _ => None,
        });
        assert_eq!(col("u", "b").eq(lit(1i64)), replaced);
    }
}

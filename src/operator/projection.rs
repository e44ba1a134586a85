use std::fmt::{Display, Formatter};

use derive_more::Deref;
use itertools::Itertools;

use crate::cost::Cost;
use crate::expr::{ColumnRef, Expr};
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ProjectionItem {
    expr: Expr,
    alias: Option<String>,
}

impl ProjectionItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased<S: Into<String>>(expr: Expr, alias: S) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Column this item is visible as to the parent.
    pub fn output_column(&self) -> ColumnRef {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => ColumnRef::unqualified(alias.clone()),
            (None, Expr::Column(c)) => c.clone(),
            (None, e) => ColumnRef::unqualified(e.to_string()),
        }
    }
}

impl Display for ProjectionItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} as {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Projection {
    items: Vec<ProjectionItem>,
}

impl Projection {
    pub fn new(items: Vec<ProjectionItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ProjectionItem] {
        &self.items
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.items.iter().join(", "))
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalProjection {
    projection: Projection,
}

impl PhysicalProjection {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }
}

impl PhysicalOperatorTrait for PhysicalProjection {
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        vec![DerivePropResult {
            output_prop: context.required.clone(),
            input_required_props: vec![context.required.clone()],
        }]
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.input_rows(0))
    }
}

/// Projection with a set returning function, every input row yields several output rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ProjectSet {
    function: Expr,
    alias: String,
}

impl ProjectSet {
    pub fn new<S: Into<String>>(function: Expr, alias: S) -> Self {
        Self {
            function,
            alias: alias.into(),
        }
    }

    pub fn function(&self) -> &Expr {
        &self.function
    }

    pub fn output_column(&self) -> ColumnRef {
        ColumnRef::unqualified(self.alias.clone())
    }
}

impl Display for ProjectSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} as {}", self.function, self.alias)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalProjectSet {
    project_set: ProjectSet,
}

impl PhysicalProjectSet {
    pub fn new(project_set: ProjectSet) -> Self {
        Self { project_set }
    }
}

impl PhysicalOperatorTrait for PhysicalProjectSet {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}

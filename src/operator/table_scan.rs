use std::fmt::{Display, Formatter};

use derive_more::Deref;

use crate::catalog::IndexDef;
use crate::cost::Cost;
use crate::expr::{ColumnRef, Expr};
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};
use crate::properties::{PhysicalPropertySet, SortKey, SortOrder};
use crate::stat::DEFAULT_TABLE_ROWS;

/// Base table access, optionally with a filter pushed into the scan.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    table_name: String,
    alias: Option<String>,
    filter: Option<Expr>,
}

impl TableScan {
    pub fn new<S: Into<String>>(table_name: S) -> Self {
        Self {
            table_name: table_name.into(),
            alias: None,
            filter: None,
        }
    }

    pub fn with_alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn table(&self) -> &str {
        &self.table_name
    }

    /// Name qualifying the output columns.
    pub fn relation(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }
}

impl Display for TableScan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table_name)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " filter: {}", filter)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalTableScan {
    scan: TableScan,
}

impl PhysicalTableScan {
    pub fn new(scan: TableScan) -> Self {
        Self { scan }
    }
}

impl PhysicalOperatorTrait for PhysicalTableScan {
    fn cost(&self, context: &CostContext) -> Cost {
        let rows = context
            .catalog
            .row_count(self.scan.table())
            .unwrap_or(DEFAULT_TABLE_ROWS);
        Cost::from(rows.max(1.0))
    }
}

/// Index range or point lookup replacing a filtered scan.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct IndexSeek {
    #[deref]
    scan: TableScan,
    index: IndexDef,
}

impl IndexSeek {
    pub fn new(scan: TableScan, index: IndexDef) -> Self {
        Self { scan, index }
    }

    pub fn index(&self) -> &IndexDef {
        &self.index
    }
}

impl PhysicalOperatorTrait for IndexSeek {
    /// Rows come back in index key order.
    fn derive_properties(&self, _context: DerivePropContext) -> Vec<DerivePropResult> {
        let order = self
            .index
            .leading_column()
            .map(|c| {
                SortOrder::new(vec![SortKey::asc(ColumnRef::new(self.scan.relation(), c))])
            })
            .unwrap_or_default();
        vec![DerivePropResult {
            output_prop: PhysicalPropertySet::default().with_order(order),
            input_required_props: vec![],
        }]
    }

    fn cost(&self, context: &CostContext) -> Cost {
        // Beyond roughly half the table a scan wins.
        Cost::from(context.output_rows * 1.99)
    }
}

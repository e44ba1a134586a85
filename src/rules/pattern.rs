use crate::operator::{LogicalOperatorKind, Operator};

/// Shape of the expressions a rule applies to.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Matches any input, bound as its group without looking inside.
    Group,
    /// Matches a logical operator of `kind`.
    ///
    /// With `children` set the operator must have exactly that many inputs, each matching its
    /// pattern. Without, every input is bound as its group.
    Logical {
        kind: LogicalOperatorKind,
        children: Option<Vec<Pattern>>,
    },
}

impl Pattern {
    pub fn leaf(kind: LogicalOperatorKind) -> Self {
        Pattern::Logical {
            kind,
            children: None,
        }
    }

    pub fn with_children(kind: LogicalOperatorKind, children: Vec<Pattern>) -> Self {
        Pattern::Logical {
            kind,
            children: Some(children),
        }
    }

    pub fn matches(&self, operator: &Operator) -> bool {
        match self {
            Pattern::Group => true,
            Pattern::Logical { kind, .. } => operator
                .as_logical()
                .map_or(false, |op| op.kind() == *kind),
        }
    }
}

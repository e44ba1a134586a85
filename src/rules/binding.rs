use itertools::Itertools;

use crate::optimizer::{OptExpr, Optimizer};
use crate::rules::{OptExprNode, OptExpression, Pattern};

/// All bindings of a pattern rooted at one expression.
///
/// Inputs matched by a nested pattern are tried against every alternative of their group, so an
/// expression yields one binding per combination of matching alternatives.
pub struct Binding<O: Optimizer> {
    bindings: std::vec::IntoIter<OptExpression<O>>,
}

impl<O: Optimizer> Binding<O> {
    pub fn new(expr_handle: O::ExprHandle, pattern: &Pattern, optimizer: &O) -> Self {
        Self {
            bindings: bind_expr(expr_handle, pattern, optimizer).into_iter(),
        }
    }
}

impl<O: Optimizer> Iterator for Binding<O> {
    type Item = OptExpression<O>;

    fn next(&mut self) -> Option<Self::Item> {
        self.bindings.next()
    }
}

fn bind_expr<O: Optimizer>(
    expr_handle: O::ExprHandle,
    pattern: &Pattern,
    optimizer: &O,
) -> Vec<OptExpression<O>> {
    let expr = optimizer.expr_at(expr_handle);
    if !pattern.matches(expr.operator()) {
        return vec![];
    }

    let inputs_len = expr.inputs_len(optimizer);
    let children = match pattern {
        Pattern::Group => None,
        Pattern::Logical { children, .. } => children.as_ref(),
    };

    let input_bindings: Vec<Vec<OptExpression<O>>> = match children {
        None => (0..inputs_len)
            .map(|idx| vec![OptExpression::with_group(expr.input_at(idx, optimizer))])
            .collect(),
        Some(children) if children.len() == inputs_len => children
            .iter()
            .enumerate()
            .map(|(idx, child)| bind_group(expr.input_at(idx, optimizer), child, optimizer))
            .collect(),
        Some(_) => return vec![],
    };

    if input_bindings.is_empty() {
        return vec![OptExpression::new(
            OptExprNode::ExprHandleNode(expr_handle),
            vec![],
        )];
    }

    input_bindings
        .into_iter()
        .multi_cartesian_product()
        .map(|inputs| OptExpression::new(OptExprNode::ExprHandleNode(expr_handle), inputs))
        .collect()
}

fn bind_group<O: Optimizer>(
    group_handle: O::GroupHandle,
    pattern: &Pattern,
    optimizer: &O,
) -> Vec<OptExpression<O>> {
    match pattern {
        Pattern::Group => vec![OptExpression::with_group(group_handle)],
        _ => optimizer
            .group_exprs(group_handle)
            .into_iter()
            .flat_map(|expr| bind_expr(expr, pattern, optimizer))
            .collect(),
    }
}
